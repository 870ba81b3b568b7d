use parley_core::{Description, NegotiationMessage};
use parley_peer::relay::MemoryRelay;
use parley_peer::session::{NegotiationState, Role};
use std::sync::Arc;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{
    MESSAGE_TIMEOUT_MS, MockTransportFactory, NEGOTIATION_TIMEOUT_MS, RecordingObserver,
    ScriptedPeer, start_participant, wait_for_session, wait_for_state,
};

#[tokio::test]
async fn test_duplicate_offer_keeps_session() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut alice = ScriptedPeer::join(&relay, ROOM, "alice")
        .await
        .expect("Failed to join alice");

    let transports = MockTransportFactory::new("bob");
    let observer = RecordingObserver::new();
    let bob = start_participant(
        &relay,
        ROOM,
        "bob",
        Arc::new(transports.clone()),
        Arc::new(observer.clone()),
    )
    .await
    .expect("Failed to start bob");
    let bob_id = bob.local_id().clone();

    let offer = NegotiationMessage::Offer {
        offer: Description::offer("alice offer"),
    };
    alice.send(&bob_id, &offer).await.expect("Send failed");

    let (sender, answer) = alice
        .next_message(MESSAGE_TIMEOUT_MS)
        .await
        .expect("Alice should get an answer");
    assert_eq!(sender, bob_id);
    assert!(matches!(answer, NegotiationMessage::Answer { .. }));

    let first = wait_for_state(
        &bob,
        &alice.id,
        NegotiationState::Connected,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Bob should connect");
    assert_eq!(first.role, Role::Answerer);

    alice.send(&bob_id, &offer).await.expect("Send failed");
    assert!(alice.is_quiet(300).await, "No second answer expected");
    assert_eq!(transports.created(), 1);
    assert_eq!(
        bob.session(&alice.id)
            .await
            .expect("Coordinator closed")
            .map(|s| s.epoch),
        Some(first.epoch)
    );

    // A different offer replaces the session.
    alice
        .send(
            &bob_id,
            &NegotiationMessage::Offer {
                offer: Description::offer("alice restarted offer"),
            },
        )
        .await
        .expect("Send failed");
    let (_, answer) = alice
        .next_message(MESSAGE_TIMEOUT_MS)
        .await
        .expect("Alice should get a new answer");
    assert!(matches!(answer, NegotiationMessage::Answer { .. }));

    let second = wait_for_session(
        &bob,
        &alice.id,
        |s| s.epoch > first.epoch && s.state == NegotiationState::Connected,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Bob should renegotiate");
    assert_eq!(
        second.remote_description,
        Some(Description::offer("alice restarted offer"))
    );
    assert_eq!(transports.created(), 2);
    assert!(
        transports
            .wait_for_close(&alice.id, NEGOTIATION_TIMEOUT_MS)
            .await
    );
    assert_eq!(
        observer.roles_for(&alice.id).await,
        vec![Role::Answerer, Role::Answerer]
    );

    bob.leave().await.expect("Leave failed");
}
