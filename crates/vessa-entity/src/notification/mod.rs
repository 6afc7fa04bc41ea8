//! Notification records, preferences and the enums they carry.

pub mod model;
pub mod preference;
pub mod priority;
pub mod push;
pub mod status;

pub use model::{Finding, NotificationPage, NotificationQuery, NotificationRecord};
pub use preference::{
    NewPreference, NotificationChannel, NotificationPreference, PreferenceUpdate,
};
pub use priority::{AlertPriority, PreferencePriority};
pub use push::{PushAuth, PushFrame, PushedNotification};
pub use status::NotificationStatus;
