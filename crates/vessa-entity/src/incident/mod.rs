//! Security incident records.

pub mod model;
pub mod severity;
pub mod status;

pub use model::{IncidentPage, IncidentQuery, IncidentRecord};
pub use severity::IncidentSeverity;
pub use status::IncidentStatus;
