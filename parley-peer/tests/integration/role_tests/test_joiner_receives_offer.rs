use parley_core::DescriptionKind;
use parley_peer::relay::MemoryRelay;
use parley_peer::session::{NegotiationState, Role};
use std::sync::Arc;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{
    MockTransportFactory, NEGOTIATION_TIMEOUT_MS, RecordingObserver, ScriptedPeer,
    TransportCall, start_participant, wait_for_state,
};

#[tokio::test]
async fn test_joiner_receives_offer() {
    init_tracing();

    let relay = MemoryRelay::new();
    let transports = MockTransportFactory::new("alice");
    let observer = RecordingObserver::new();

    let alice = start_participant(
        &relay,
        ROOM,
        "alice",
        Arc::new(transports.clone()),
        Arc::new(observer.clone()),
    )
    .await
    .expect("Failed to start alice");

    let mut bob = ScriptedPeer::join(&relay, ROOM, "bob")
        .await
        .expect("Failed to join bob");
    let (sender, _) = bob.expect_offer().await.expect("Bob should get an offer");
    assert_eq!(&sender, alice.local_id());

    let session = wait_for_state(
        &alice,
        &bob.id,
        NegotiationState::AwaitingRemoteDescription,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Alice should be waiting for an answer");
    assert_eq!(session.role, Role::Offerer);
    assert!(session.local_description_set);
    assert!(!session.remote_description_set);
    assert_eq!(observer.roles_for(&bob.id).await, vec![Role::Offerer]);

    let calls = transports.calls_for(&bob.id).await;
    assert_eq!(calls.first(), Some(&TransportCall::AttachLocalTracks(2)));
    assert!(calls.contains(&TransportCall::CreateLocalDescription(
        DescriptionKind::Offer
    )));
    assert!(!calls.contains(&TransportCall::CreateLocalDescription(
        DescriptionKind::Answer
    )));

    alice.leave().await.expect("Leave failed");
}
