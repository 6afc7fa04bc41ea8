//! # vessa-sync
//!
//! Client-side state for the Vessa console: the session, the notification
//! store and the controller that refreshes it, the push listener that
//! brings refreshes forward, the API key lifecycle and the incident board,
//! wired together by [`Console`].

pub mod console;
pub mod controller;
pub mod incidents;
pub mod keys;
pub mod push;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use console::Console;
pub use controller::{RefreshController, RefreshStatus, Visibility};
pub use incidents::IncidentBoard;
pub use keys::{IssuedKey, KeyRing};
pub use push::PushListener;
pub use session::{ActiveKey, Session, SessionState};
pub use store::{
    FailedMark, LoadOutcome, MarkAllReadError, MarkOutcome, NotificationStore, StoreEvent,
};
