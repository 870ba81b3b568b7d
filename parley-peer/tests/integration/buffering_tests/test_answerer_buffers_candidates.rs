use parley_core::{Candidate, Description, NegotiationMessage};
use parley_peer::relay::MemoryRelay;
use parley_peer::session::{NegotiationState, Role};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{
    MESSAGE_TIMEOUT_MS, MockTransportFactory, NEGOTIATION_TIMEOUT_MS, RecordingObserver,
    ScriptedPeer, TransportCall, start_participant, wait_for_session, wait_for_state,
};

#[tokio::test]
async fn test_answerer_buffers_candidates() {
    init_tracing();

    let relay = MemoryRelay::new();
    let mut alice = ScriptedPeer::join(&relay, ROOM, "alice")
        .await
        .expect("Failed to join alice");

    let gate = Arc::new(Semaphore::new(0));
    let transports = MockTransportFactory::builder("bob")
        .gate_remote_descriptions(gate.clone())
        .build();
    let bob = start_participant(
        &relay,
        ROOM,
        "bob",
        Arc::new(transports.clone()),
        Arc::new(RecordingObserver::new()),
    )
    .await
    .expect("Failed to start bob");
    let bob_id = bob.local_id().clone();

    alice
        .send(
            &bob_id,
            &NegotiationMessage::Offer {
                offer: Description::offer("alice offer"),
            },
        )
        .await
        .expect("Send failed");
    let sent: Vec<_> = (0..3)
        .map(|i| Candidate::new(format!("candidate:alice {}", i)))
        .collect();
    for candidate in &sent {
        alice
            .send(
                &bob_id,
                &NegotiationMessage::Candidate {
                    candidate: candidate.clone(),
                },
            )
            .await
            .expect("Send failed");
    }

    let buffered = wait_for_session(
        &bob,
        &alice.id,
        |s| s.pending_candidates == 3,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Candidates should be buffered while the offer is applied");
    assert_eq!(buffered.role, Role::Answerer);
    assert_eq!(buffered.state, NegotiationState::LocalDescriptionPending);
    assert!(!buffered.remote_description_set);
    assert!(alice.is_quiet(200).await, "No answer before the offer is applied");

    gate.add_permits(1);

    let (sender, answer) = alice
        .next_message(MESSAGE_TIMEOUT_MS)
        .await
        .expect("Alice should get an answer");
    assert_eq!(sender, bob_id);
    assert!(matches!(answer, NegotiationMessage::Answer { .. }));

    assert!(
        transports
            .wait_for_candidates(&alice.id, 3, NEGOTIATION_TIMEOUT_MS)
            .await
    );
    assert_eq!(transports.candidates_for(&alice.id).await, sent);

    let calls = transports.calls_for(&alice.id).await;
    let remote_at = calls
        .iter()
        .position(|c| matches!(c, TransportCall::SetRemoteDescription(_)))
        .expect("Offer should be applied");
    let first_candidate_at = calls
        .iter()
        .position(|c| matches!(c, TransportCall::AddCandidate(_)))
        .expect("Candidates should be applied");
    assert!(remote_at < first_candidate_at);

    wait_for_state(
        &bob,
        &alice.id,
        NegotiationState::Connected,
        NEGOTIATION_TIMEOUT_MS,
    )
    .await
    .expect("Bob should connect");

    bob.leave().await.expect("Leave failed");
}
