// Derived stores - pure reducers over dispatched events, read by consumers
pub mod notifications;
pub mod uploads;

pub use notifications::{NoopNotificationBackend, NotificationBackend, NotificationStore};
pub use uploads::{UploadProgressRecord, UploadProgressView, UploadStore};
