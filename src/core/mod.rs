//! Core types shared across strata.
//!
//! Currently this is the error vocabulary; see [`error`].

pub mod error;

pub use error::{ErrorContext, Result, StrataError, user_friendly_error};
