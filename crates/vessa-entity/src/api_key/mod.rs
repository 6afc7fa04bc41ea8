//! API key records and their lifecycle.

pub mod model;
pub mod secret;
pub mod state;

pub use model::{ApiKeyRecord, NewApiKey};
pub use secret::SecretKey;
pub use state::{ApiKeyState, KeyAction};
