//! Shared types and business rules for the shop platform
//!
//! Everything in this crate is free of I/O so the rules the backend enforces
//! can be exercised directly from tests.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
