//! # vessa-core
//!
//! Core crate for the Vessa security console client. Contains the
//! configuration schemas, typed identifiers, pagination types and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Vessa crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
