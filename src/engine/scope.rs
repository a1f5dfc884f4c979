//! Scoped isolate access
//!
//! A [`Scope`] enters one level of isolate scope on construction and exits it
//! on drop. Each guard mutably borrows the level below it, so guards can only
//! be released in reverse acquisition order, on every exit path.

use super::IsolateScopes;
use std::ops::{Deref, DerefMut};

/// The scope levels used while an isolate is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Exclusive lock on the isolate
    Locker,
    /// The isolate is the current one for this thread
    Isolate,
    /// Engine object handles created inside are reclaimable
    Handle,
    /// The execution context is entered
    Context,
    /// No handles may be created directly in this frame
    Seal,
}

/// RAII guard for one scope level
pub struct Scope<'a, I: IsolateScopes + ?Sized> {
    isolate: &'a mut I,
    kind: ScopeKind,
}

impl<'a, I: IsolateScopes + ?Sized> Scope<'a, I> {
    pub fn new(isolate: &'a mut I, kind: ScopeKind) -> Self {
        isolate.enter_scope(kind);
        Self { isolate, kind }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }
}

impl<I: IsolateScopes + ?Sized> Deref for Scope<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.isolate
    }
}

impl<I: IsolateScopes + ?Sized> DerefMut for Scope<'_, I> {
    fn deref_mut(&mut self) -> &mut I {
        self.isolate
    }
}

impl<I: IsolateScopes + ?Sized> Drop for Scope<'_, I> {
    fn drop(&mut self) {
        self.isolate.exit_scope(self.kind);
    }
}
