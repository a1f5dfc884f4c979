pub mod drain;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod shutdown;
