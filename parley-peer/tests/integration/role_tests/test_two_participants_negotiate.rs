use parley_core::DescriptionKind;
use parley_peer::relay::MemoryRelay;
use parley_peer::session::{NegotiationState, Role};
use std::sync::Arc;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{
    MockTransportFactory, NEGOTIATION_TIMEOUT_MS, RecordingObserver, TransportCall,
    start_participant, wait_for_state,
};

fn trickled(label: &str) -> Vec<String> {
    (0..3)
        .map(|i| {
            format!(
                "candidate:{} {} udp 2130706431 127.0.0.1 {} typ host",
                label,
                i,
                50000 + i
            )
        })
        .collect()
}

#[tokio::test]
async fn test_two_participants_negotiate() {
    init_tracing();

    let relay = MemoryRelay::new();
    let alice_transports = MockTransportFactory::builder("alice").trickle(3).build();
    let bob_transports = MockTransportFactory::builder("bob").trickle(3).build();
    let alice_observer = RecordingObserver::new();
    let bob_observer = RecordingObserver::new();

    let alice = start_participant(
        &relay,
        ROOM,
        "alice",
        Arc::new(alice_transports.clone()),
        Arc::new(alice_observer.clone()),
    )
    .await
    .expect("Failed to start alice");
    let bob = start_participant(
        &relay,
        ROOM,
        "bob",
        Arc::new(bob_transports.clone()),
        Arc::new(bob_observer.clone()),
    )
    .await
    .expect("Failed to start bob");

    let alice_id = alice.local_id().clone();
    let bob_id = bob.local_id().clone();

    let alice_side = wait_for_state(
        &alice,
        &bob_id,
        NegotiationState::Connected,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Alice should connect");
    let bob_side = wait_for_state(
        &bob,
        &alice_id,
        NegotiationState::Connected,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Bob should connect");

    assert_eq!(alice_side.role, Role::Offerer);
    assert_eq!(bob_side.role, Role::Answerer);
    assert_eq!(alice_observer.roles_for(&bob_id).await, vec![Role::Offerer]);
    assert_eq!(bob_observer.roles_for(&alice_id).await, vec![Role::Answerer]);

    assert!(
        alice_transports
            .wait_for_candidates(&bob_id, 3, NEGOTIATION_TIMEOUT_MS)
            .await
    );
    assert!(
        bob_transports
            .wait_for_candidates(&alice_id, 3, NEGOTIATION_TIMEOUT_MS)
            .await
    );

    for (transports, remote_id) in [(&alice_transports, &bob_id), (&bob_transports, &alice_id)] {
        let calls = transports.calls_for(remote_id).await;
        let remote_at = calls
            .iter()
            .position(|c| matches!(c, TransportCall::SetRemoteDescription(_)))
            .expect("Remote description should be applied");
        let candidates_at: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, TransportCall::AddCandidate(_)))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(candidates_at.len(), 3);
        assert!(candidates_at.iter().all(|&i| i > remote_at));
        assert_eq!(transports.remote_descriptions_for(remote_id).await.len(), 1);
    }

    let applied_by_alice: Vec<_> = alice_transports
        .candidates_for(&bob_id)
        .await
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(applied_by_alice, trickled("bob"));

    let applied_by_bob: Vec<_> = bob_transports
        .candidates_for(&alice_id)
        .await
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(applied_by_bob, trickled("alice"));

    assert_eq!(
        bob_transports.remote_descriptions_for(&alice_id).await[0].kind,
        DescriptionKind::Offer
    );
    assert_eq!(
        alice_transports.remote_descriptions_for(&bob_id).await[0].kind,
        DescriptionKind::Answer
    );

    alice.leave().await.expect("Alice leave failed");
    bob.leave().await.expect("Bob leave failed");
}
