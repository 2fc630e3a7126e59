//! Thread state data types shared by the loader, the table and the reports.
//!
//! # Module Organization
//!
//! - [`models`]: raw rows as returned by the query engine and normalized intervals
//! - [`constants`]: state vocabulary, unit scales and report constants

pub mod constants;
pub mod models;

pub use models::*;
