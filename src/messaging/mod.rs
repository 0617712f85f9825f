// Messaging module - typed events, subscription registry and inbound routing
pub mod bus;
pub mod event;
pub mod router;

pub use bus::{EventBus, EventHandler, Subscription};
pub use event::{
    EventKind, Notification, NotificationKind, PongEvent, ServerEvent, ServerFrame,
    UploadCompletedEvent, UploadErrorEvent, UploadProgressEvent, UploadStatus,
};
pub use router::MessageRouter;
