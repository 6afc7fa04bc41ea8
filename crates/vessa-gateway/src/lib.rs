//! # vessa-gateway
//!
//! The contract between the console and the remote Vessa gateway, and
//! its HTTP implementation.
//!
//! The sync layer depends only on the traits in [`traits`]; the
//! [`http::HttpGateway`] implements all of them over `reqwest` with a
//! per-request timeout, bearer authentication and typed error mapping.
//! [`push::PushClient`] receives pushed notifications over a WebSocket.

pub mod credentials;
pub mod http;
pub mod push;
pub mod traits;

pub use credentials::{NoCredentials, SessionCredentials};
pub use http::HttpGateway;
pub use push::PushClient;
pub use traits::{
    ApiKeyGateway, AuthGateway, IncidentGateway, NotificationGateway, NotificationPush, PushStream,
};
