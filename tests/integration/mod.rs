//! Integration test suite for strata
//!
//! End-to-end tests that drive the public API against real template files in
//! temporary directories.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cache_behavior**: compile-once reuse, staleness, flushing, concurrent compiles
//! - **rendering**: includes, loops, cached blocks and debug comments
//! - **scope_precedence**: overlay, item, underlay, iterator and global lookup order

mod cache_behavior;
mod rendering;
mod scope_precedence;
