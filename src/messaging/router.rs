use super::bus::EventBus;
use super::event::{PongEvent, ServerEvent, ServerFrame};
use crate::client::ClientState;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;

/// Routes decoded inbound frames to the event bus and the connection state.
///
/// Frames with an unknown event name or a malformed payload are logged and
/// dropped; they never reach subscribers.
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
    bus: Arc<EventBus>,
}

impl MessageRouter {
    pub fn new(state: Arc<RwLock<ClientState>>, bus: Arc<EventBus>) -> Self {
        Self { state, bus }
    }

    /// Decode one inbound text frame and dispatch it.
    pub fn route(&self, text: &str) {
        let frame: ServerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("failed to parse inbound frame: {} - raw: {}", e, text);
                return;
            }
        };

        let event = match ServerEvent::decode(frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::warn!("dropping frame with unknown event name: {}", text);
                return;
            }
            Err(e) => {
                tracing::warn!("dropping frame with malformed payload: {}", e);
                return;
            }
        };

        {
            let mut state = self.state.write();
            if let Some(metadata) = state.metadata.as_mut() {
                metadata.total_messages_received += 1;
            }
        }

        if let ServerEvent::Pong(pong) = &event {
            self.handle_pong(pong);
        }

        self.bus.dispatch(&event);
    }

    /// Clears the pending heartbeat ref when the matching pong arrives.
    fn handle_pong(&self, pong: &PongEvent) {
        let Some(msg_ref) = &pong.r#ref else {
            tracing::debug!("received pong without ref");
            return;
        };

        let mut state = self.state.write();
        if state.pending_heartbeat_ref.as_deref() == Some(msg_ref.as_str()) {
            state.pending_heartbeat_ref = None;
            if let Some(metadata) = state.metadata.as_mut() {
                metadata.last_heartbeat = Some(SystemTime::now());
            }
            tracing::debug!("received heartbeat ack for ref {}", msg_ref);
        } else {
            tracing::debug!("received pong with unexpected ref {}", msg_ref);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::event::EventKind;
    use parking_lot::Mutex;

    fn router_with_bus() -> (MessageRouter, Arc<EventBus>, Arc<RwLock<ClientState>>) {
        let state = Arc::new(RwLock::new(ClientState::for_tests()));
        let bus = Arc::new(EventBus::new());
        let router = MessageRouter::new(Arc::clone(&state), Arc::clone(&bus));
        (router, bus, state)
    }

    #[test]
    fn test_route_dispatches_known_event() {
        let (router, bus, _state) = router_with_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            bus.on(
                EventKind::UploadProgress,
                Arc::new(move |event| {
                    if let ServerEvent::UploadProgress(p) = event {
                        seen.lock().push((p.upload_id.clone(), p.progress));
                    }
                }),
            );
        }

        router.route(r#"{"event":"upload.progress","payload":{"uploadId":"u1","progress":40}}"#);

        assert_eq!(*seen.lock(), vec![("u1".to_string(), 40)]);
    }

    #[test]
    fn test_route_drops_unknown_and_malformed_frames() {
        let (router, bus, _state) = router_with_bus();
        let count = Arc::new(Mutex::new(0));
        {
            let count = Arc::clone(&count);
            bus.on(
                EventKind::UploadProgress,
                Arc::new(move |_| *count.lock() += 1),
            );
        }

        router.route("not json at all");
        router.route(r#"{"event":"presence.join","payload":{}}"#);
        router.route(r#"{"event":"upload.progress","payload":{"progress":"nope"}}"#);

        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_matching_pong_clears_pending_ref() {
        let (router, _bus, state) = router_with_bus();
        state.write().pending_heartbeat_ref = Some("3".to_string());

        router.route(r#"{"event":"pong","ref":"2"}"#);
        assert_eq!(state.read().pending_heartbeat_ref.as_deref(), Some("3"));

        router.route(r#"{"event":"pong","ref":"3"}"#);
        assert_eq!(state.read().pending_heartbeat_ref, None);
    }
}
