pub mod lifecycle_log;
