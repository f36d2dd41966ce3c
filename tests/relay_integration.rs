//! Cross-component integration tests
//!
//! These tests verify the registry, router, and wire decoding working
//! together, without binding a listener. The full transport path is covered
//! by the end-to-end suite in `ws_e2e.rs`.

use std::sync::Arc;

use tokio::sync::mpsc;

use chat_relay::registry::{ConnectionHandle, ConnectionRegistry};
use chat_relay::router::MessageRouter;
use chat_relay::websocket::InboundMessage;

/// Register an identity with an outbound queue of the given capacity,
/// handing back the receiving side the writer task would drain.
fn connect(
    registry: &ConnectionRegistry,
    identity: &str,
    capacity: usize,
) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = Arc::new(ConnectionHandle::new(identity.to_string(), tx));
    registry.register(handle.clone());
    (handle, rx)
}

fn decode(json: &str) -> InboundMessage {
    serde_json::from_str(json).unwrap()
}

mod routing {
    use super::*;

    #[tokio::test]
    async fn test_public_message_fans_out_to_all_queues() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_alice, mut alice_rx) = connect(&registry, "alice", 16);
        let (_bob, mut bob_rx) = connect(&registry, "bob", 16);
        let (_carol, mut carol_rx) = connect(&registry, "carol", 16);

        router.route(decode(r#"{"type":"public","from":"alice","content":"hi"}"#));

        assert_eq!(alice_rx.recv().await.unwrap(), "alice: hi");
        assert_eq!(bob_rx.recv().await.unwrap(), "alice: hi");
        assert_eq!(carol_rx.recv().await.unwrap(), "alice: hi");
    }

    #[tokio::test]
    async fn test_private_message_reaches_exactly_one_queue() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_alice, mut alice_rx) = connect(&registry, "alice", 16);
        let (_bob, mut bob_rx) = connect(&registry, "bob", 16);
        let (_carol, mut carol_rx) = connect(&registry, "carol", 16);

        router.route(decode(
            r#"{"type":"private","from":"alice","to":"bob","content":"secret"}"#,
        ));

        assert_eq!(bob_rx.recv().await.unwrap(), "[Private] alice: secret");
        assert!(alice_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_private_to_unknown_recipient_enqueues_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_alice, mut alice_rx) = connect(&registry, "alice", 16);
        let (_carol, mut carol_rx) = connect(&registry, "carol", 16);

        router.route(decode(
            r#"{"type":"private","from":"alice","to":"bob","content":"secret"}"#,
        ));

        assert!(alice_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
        assert_eq!(router.stats().routing_misses, 1);
    }

    #[tokio::test]
    async fn test_per_recipient_delivery_order_is_fifo() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_bob, mut bob_rx) = connect(&registry, "bob", 16);

        for i in 1..=3 {
            router.route(decode(&format!(
                r#"{{"type":"private","from":"alice","to":"bob","content":"{}"}}"#,
                i
            )));
        }

        assert_eq!(bob_rx.recv().await.unwrap(), "[Private] alice: 1");
        assert_eq!(bob_rx.recv().await.unwrap(), "[Private] alice: 2");
        assert_eq!(bob_rx.recv().await.unwrap(), "[Private] alice: 3");
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_malformed_frame_then_wellformed_frame_still_routes() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_bob, mut bob_rx) = connect(&registry, "bob", 16);

        // The session skips an undecodable frame and keeps reading
        assert!(serde_json::from_str::<InboundMessage>("not json at all").is_err());

        router.route(decode(r#"{"type":"public","from":"alice","content":"still here"}"#));
        assert_eq!(bob_rx.recv().await.unwrap(), "alice: still here");
    }

    #[tokio::test]
    async fn test_closed_connection_receives_no_further_payloads() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_alice, mut alice_rx) = connect(&registry, "alice", 16);
        let (bob, bob_rx) = connect(&registry, "bob", 16);

        // Bob's session closes: writer gone, identity deregistered
        drop(bob_rx);
        assert!(registry.unregister("bob", bob.id));
        assert!(registry.lookup("bob").is_none());

        router.route(decode(
            r#"{"type":"private","from":"alice","to":"bob","content":"too late"}"#,
        ));
        router.route(decode(r#"{"type":"public","from":"alice","content":"hi"}"#));

        // The broadcast reaches the survivors only; the private was a miss
        assert_eq!(alice_rx.recv().await.unwrap(), "alice: hi");
        assert!(alice_rx.try_recv().is_err());
        assert_eq!(router.stats().routing_misses, 1);
    }

    #[tokio::test]
    async fn test_identity_reuse_routes_to_the_newest_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (old_bob, mut old_rx) = connect(&registry, "bob", 16);
        let (_new_bob, mut new_rx) = connect(&registry, "bob", 16);

        // The stale session closing must not take the identity with it
        registry.unregister("bob", old_bob.id);

        router.route(decode(
            r#"{"type":"private","from":"alice","to":"bob","content":"hello again"}"#,
        ));

        assert_eq!(new_rx.recv().await.unwrap(), "[Private] alice: hello again");
        assert!(old_rx.try_recv().is_err());
    }
}

mod backpressure {
    use super::*;

    #[tokio::test]
    async fn test_stalled_recipient_never_blocks_routing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (_alice, mut alice_rx) = connect(&registry, "alice", 16);
        // Bob's writer never drains: one-slot queue fills immediately
        let (bob, _bob_rx) = connect(&registry, "bob", 1);

        for _ in 0..10 {
            router.route(decode(r#"{"type":"public","from":"alice","content":"spam"}"#));
        }

        // Routing completed without suspending; alice got every frame,
        // bob kept the first and dropped the rest
        for _ in 0..10 {
            assert_eq!(alice_rx.recv().await.unwrap(), "alice: spam");
        }
        assert_eq!(bob.dropped_frames(), 9);
        assert_eq!(router.stats().frames_dropped, 9);
    }
}
