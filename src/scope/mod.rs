//! Scope handling while a compiled template executes.
//!
//! [`ScopeStack`] is the plain nested-context stack. [`ScopeResolver`] wraps one
//! and layers injected data on top of it: overlay and underlay maps supplied by
//! the caller, iterator-position properties and global properties. Compiled
//! templates only ever talk to the resolver.

pub mod resolver;
pub mod stack;

#[cfg(test)]
mod resolver_tests;

pub use resolver::{InjectedValue, Layer, ScopeResolver};
pub use stack::ScopeStack;
