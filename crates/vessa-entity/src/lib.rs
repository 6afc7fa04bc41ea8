//! # vessa-entity
//!
//! Records exchanged with the Vessa gateway and the small value objects
//! built around them. Every record derives `Debug`, `Clone`, `Serialize`
//! and `Deserialize`; gateway timestamps are parsed leniently because the
//! backend emits both zoned and naive ISO 8601 strings.

mod macros;

pub mod api_key;
pub mod auth;
pub mod incident;
pub mod notification;
pub mod rate_limit;
pub mod timestamp;

use validator::Validate;
use vessa_core::{AppError, AppResult};

/// Run `validator` rules and map failures into a validation error.
pub fn validate<T: Validate>(value: &T) -> AppResult<()> {
    value
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid input: {e}")))
}
