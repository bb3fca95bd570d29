//! Request registry: id allocation and response routing.
//!
//! Each id maps to either a live listener or a tombstone. Tombstoned and
//! unknown ids are treated the same way on dispatch: the frame is dropped.
//! The registry is owned by one connection; clearing it also resets the id
//! counter so the next connection starts again at 1.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::frame::IncomingMessage;
use crate::types::{Response, ResponseListener, RpcId};

/// In-flight requests for one connection.
#[derive(Default)]
pub struct RequestRegistry {
    last_id: RpcId,
    entries: HashMap<RpcId, Option<Arc<dyn ResponseListener>>>,
}

impl RequestRegistry {
    /// Empty registry; the first allocated id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id. Ids strictly increase until [`clear`](Self::clear).
    pub fn allocate_id(&mut self) -> RpcId {
        self.last_id += 1;
        self.last_id
    }

    /// Most recently allocated id, 0 if none.
    pub fn last_id(&self) -> RpcId {
        self.last_id
    }

    /// Attach `listener` to `rpc_id`, replacing any earlier entry.
    pub fn register(&mut self, rpc_id: RpcId, listener: Arc<dyn ResponseListener>) {
        let _ = self.entries.insert(rpc_id, Some(listener));
    }

    /// Forget the listener for `rpc_id` but keep the id known.
    pub fn tombstone(&mut self, rpc_id: RpcId) {
        let _ = self.entries.insert(rpc_id, None);
    }

    /// Whether `rpc_id` has a live listener.
    pub fn is_pending(&self, rpc_id: RpcId) -> bool {
        matches!(self.entries.get(&rpc_id), Some(Some(_)))
    }

    /// Whether any id still has a live listener.
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(Option::is_some)
    }

    /// Number of ids with a live listener.
    pub fn pending_count(&self) -> usize {
        self.entries.values().filter(|l| l.is_some()).count()
    }

    /// Drop every entry without notifying listeners, and reset the counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_id = 0;
    }

    /// Find the listener for an inbound message.
    ///
    /// A final message tombstones its id here, so a duplicate final frame
    /// finds no listener. Returns `None` for id 0, unknown, and tombstoned ids.
    pub fn route(&mut self, message: IncomingMessage) -> Option<Delivery> {
        if message.rpc_id == 0 {
            trace!("dropping response without RpcId");
            return None;
        }
        let slot = self.entries.get_mut(&message.rpc_id)?;
        let listener = if message.is_final {
            slot.take()?
        } else {
            slot.clone()?
        };
        debug!(
            rpc_id = message.rpc_id,
            is_final = message.is_final,
            "routing response"
        );
        Some(Delivery { listener, message })
    }
}

impl fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRegistry")
            .field("last_id", &self.last_id)
            .field("entries", &self.entries.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// A response matched to its listener, delivered outside any lock.
pub struct Delivery {
    listener: Arc<dyn ResponseListener>,
    message: IncomingMessage,
}

impl Delivery {
    /// Id the response belongs to.
    pub fn rpc_id(&self) -> RpcId {
        self.message.rpc_id
    }

    /// Parse the body and invoke the listener.
    ///
    /// An unparseable body is logged and delivered as `None`.
    pub fn deliver(self) {
        let body = self.message.parse_body();
        self.listener.on_response(Response {
            rpc_id: self.message.rpc_id,
            body,
            is_final: self.message.is_final,
            headers: self.message.header_lines,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use recorder::Recorder;
    use proptest::prelude::*;
    use serde_json::json;

    /// Minimal listener that records what it receives.
    mod recorder {
        use std::sync::Arc;

        use parking_lot::Mutex;

        use crate::types::{Response, ResponseListener};

        #[derive(Clone, Default)]
        pub struct Recorder(pub Arc<Mutex<Vec<Response>>>);

        impl Recorder {
            pub fn len(&self) -> usize {
                self.0.lock().len()
            }

            pub fn last(&self) -> Option<Response> {
                self.0.lock().last().cloned()
            }
        }

        impl ResponseListener for Recorder {
            fn on_response(&self, response: Response) {
                self.0.lock().push(response);
            }
        }
    }

    fn incoming(rpc_id: RpcId, is_final: bool, body: &str) -> IncomingMessage {
        IncomingMessage {
            header_lines: vec![format!("RpcId: {rpc_id}")],
            rpc_id,
            is_final,
            body: body.to_owned(),
            declared_body_length: body.len(),
        }
    }

    fn deliver(registry: &mut RequestRegistry, message: IncomingMessage) -> bool {
        match registry.route(message) {
            Some(delivery) => {
                delivery.deliver();
                true
            }
            None => false,
        }
    }

    #[test]
    fn ids_start_at_one() {
        let mut registry = RequestRegistry::new();
        assert_eq!(registry.last_id(), 0);
        assert_eq!(registry.allocate_id(), 1);
        assert_eq!(registry.allocate_id(), 2);
    }

    #[test]
    fn clear_resets_ids_and_entries() {
        let mut registry = RequestRegistry::new();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(Recorder::default()));
        registry.clear();
        assert!(!registry.has_pending());
        assert_eq!(registry.allocate_id(), 1);
    }

    #[test]
    fn final_response_tombstones() {
        let mut registry = RequestRegistry::new();
        let recorder = Recorder::default();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(recorder.clone()));

        assert!(deliver(&mut registry, incoming(id, true, r#"{"ok":true}"#)));
        assert_eq!(recorder.len(), 1);
        assert!(!registry.is_pending(id));

        // duplicate final is dropped
        assert!(!deliver(&mut registry, incoming(id, true, "{}")));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn non_final_responses_keep_listener() {
        let mut registry = RequestRegistry::new();
        let recorder = Recorder::default();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(recorder.clone()));

        for _ in 0..3 {
            assert!(deliver(&mut registry, incoming(id, false, "{}")));
        }
        assert!(registry.is_pending(id));
        assert!(deliver(&mut registry, incoming(id, true, "{}")));
        assert_eq!(recorder.len(), 4);
        assert!(!registry.has_pending());
    }

    #[test]
    fn tombstoned_id_is_dropped() {
        let mut registry = RequestRegistry::new();
        let recorder = Recorder::default();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(recorder.clone()));
        registry.tombstone(id);
        registry.tombstone(id);

        assert!(!deliver(&mut registry, incoming(id, false, "{}")));
        assert!(!deliver(&mut registry, incoming(id, true, "{}")));
        assert_eq!(recorder.len(), 0);
    }

    #[test]
    fn id_zero_and_unknown_ids_are_dropped() {
        let mut registry = RequestRegistry::new();
        assert!(registry.route(incoming(0, true, "{}")).is_none());
        assert!(registry.route(incoming(42, true, "{}")).is_none());
    }

    #[test]
    fn bad_json_is_delivered_as_none() {
        let mut registry = RequestRegistry::new();
        let recorder = Recorder::default();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(recorder.clone()));

        assert!(deliver(&mut registry, incoming(id, true, "<html>")));
        let response = recorder.last().unwrap();
        assert_eq!(response.body, None);
        assert!(response.is_final);
    }

    #[test]
    fn delivery_carries_headers_and_body() {
        let mut registry = RequestRegistry::new();
        let recorder = Recorder::default();
        let id = registry.allocate_id();
        registry.register(id, Arc::new(recorder.clone()));

        let delivery = registry.route(incoming(id, false, r#"{"x":1}"#)).unwrap();
        assert_eq!(delivery.rpc_id(), id);
        delivery.deliver();

        let response = recorder.last().unwrap();
        assert_eq!(response.body, Some(json!({"x": 1})));
        assert_eq!(response.headers, vec![format!("RpcId: {id}")]);
    }

    #[test]
    fn pending_count_ignores_tombstones() {
        let mut registry = RequestRegistry::new();
        for _ in 0..3 {
            let id = registry.allocate_id();
            registry.register(id, Arc::new(Recorder::default()));
        }
        registry.tombstone(2);
        assert_eq!(registry.pending_count(), 2);
        assert!(format!("{registry:?}").contains("pending: 2"));
    }

    proptest! {
        #[test]
        fn allocated_ids_strictly_increase(count in 1usize..200) {
            let mut registry = RequestRegistry::new();
            let ids: Vec<RpcId> = (0..count).map(|_| registry.allocate_id()).collect();
            prop_assert_eq!(ids[0], 1);
            prop_assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }
}
