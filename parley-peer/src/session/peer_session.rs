use crate::error::NegotiationError;
use crate::session::state::{NegotiationState, Role};
use crate::session::worker::{TransportOp, WorkerHandle};
use crate::transport::SessionKey;
use parley_core::{Candidate, Description, DescriptionKind, NegotiationMessage, ParticipantId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Remote candidates held for a session whose remote description is not yet
/// applied. Anything beyond this is dropped.
pub const MAX_PENDING_CANDIDATES: usize = 64;

/// What happened to a remote candidate handed to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    Buffered,
    /// The pending buffer was full.
    Dropped,
}

/// Point-in-time view of a session, for the application and for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub remote_id: ParticipantId,
    pub epoch: u64,
    pub role: Role,
    pub state: NegotiationState,
    pub local_description_set: bool,
    pub remote_description_set: bool,
    pub remote_description: Option<Description>,
    pub pending_candidates: usize,
}

/// Negotiation state for one remote participant.
///
/// Pure bookkeeping: every transport call is queued on the session worker and
/// its completion comes back as a separate event.
pub struct PeerSession {
    /// Remote participant plus the epoch this session was opened under.
    key: SessionKey,
    role: Role,
    state: NegotiationState,
    /// Our own description was applied by the transport.
    local_description_set: bool,
    /// The remote description was applied by the transport.
    remote_description_set: bool,
    /// The remote description is queued on the worker but not applied yet.
    remote_description_in_flight: bool,
    /// The remote description as received, kept to recognise redeliveries.
    remote_description: Option<Description>,
    /// Our own offer/answer has gone out; trickled candidates may follow.
    description_emitted: bool,
    /// Remote candidates waiting for the remote description, in receipt order.
    pending_candidates: Vec<Candidate>,
    /// Our candidates waiting for our own description to be sent.
    outbound_candidates: Vec<Candidate>,
    /// The session worker. `None` once closed.
    worker: Option<WorkerHandle>,
}

impl PeerSession {
    pub(crate) fn new(key: SessionKey, role: Role, worker: WorkerHandle) -> Self {
        Self {
            key,
            role,
            state: NegotiationState::Idle,
            local_description_set: false,
            remote_description_set: false,
            remote_description_in_flight: false,
            remote_description: None,
            description_emitted: false,
            pending_candidates: Vec::new(),
            outbound_candidates: Vec::new(),
            worker: Some(worker),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.key.remote_id
    }

    pub fn epoch(&self) -> u64 {
        self.key.epoch
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn local_description_set(&self) -> bool {
        self.local_description_set
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> &[Candidate] {
        &self.pending_candidates
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            remote_id: self.key.remote_id.clone(),
            epoch: self.key.epoch,
            role: self.role,
            state: self.state,
            local_description_set: self.local_description_set,
            remote_description_set: self.remote_description_set,
            remote_description: self.remote_description.clone(),
            pending_candidates: self.pending_candidates.len(),
        }
    }

    /// Queue creation of our own offer or answer.
    pub(crate) fn begin_local_description(&mut self) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::OutOfOrder {
                peer: self.key.remote_id.clone(),
                kind: "local description",
                state: self.state,
            });
        }
        self.state = NegotiationState::LocalDescriptionPending;
        self.enqueue(TransportOp::CreateLocalDescription(
            self.role.local_description_kind(),
        ));
        Ok(())
    }

    /// Queue application of the remote offer or answer.
    ///
    /// A session accepts exactly one remote description. Anything after the
    /// first, including one that arrives while the first is still being
    /// applied, is rejected as a duplicate.
    pub(crate) fn accept_remote_description(
        &mut self,
        description: Description,
    ) -> Result<(), NegotiationError> {
        let kind = match self.role {
            Role::Offerer => "answer",
            Role::Answerer => "offer",
        };

        if self.state.is_closed() {
            return Err(NegotiationError::StaleMessage {
                peer: self.key.remote_id.clone(),
                kind,
            });
        }
        if self.remote_description_set || self.remote_description_in_flight {
            return Err(NegotiationError::DuplicateDescription {
                peer: self.key.remote_id.clone(),
                kind: description.kind,
            });
        }
        // An offerer cannot be answered before its offer went out.
        if self.role == Role::Offerer && !self.local_description_set {
            return Err(NegotiationError::OutOfOrder {
                peer: self.key.remote_id.clone(),
                kind,
                state: self.state,
            });
        }

        self.remote_description_in_flight = true;
        self.remote_description = Some(description.clone());
        self.enqueue(TransportOp::ApplyRemoteDescription(description));
        Ok(())
    }

    /// Whether `offer` is the offer this answerer session was created from.
    pub(crate) fn is_same_offer(&self, offer: &Description) -> bool {
        self.role == Role::Answerer
            && offer.kind == DescriptionKind::Offer
            && self.remote_description.as_ref() == Some(offer)
    }

    /// The transport applied the remote description. Buffered candidates are
    /// queued in receipt order, ahead of anything that arrives later.
    pub(crate) fn on_remote_description_applied(&mut self) -> usize {
        self.remote_description_in_flight = false;
        self.remote_description_set = true;

        let flushed = self.pending_candidates.len();
        for candidate in std::mem::take(&mut self.pending_candidates) {
            self.enqueue(TransportOp::AddCandidate(candidate));
        }

        if self.role == Role::Offerer && self.local_description_set {
            self.state = NegotiationState::Connected;
        }
        flushed
    }

    /// The transport applied our own description. Returns the messages to
    /// send, in order: the description itself, then any candidates that were
    /// discovered before it went out.
    pub(crate) fn on_local_description_applied(
        &mut self,
        description: Description,
    ) -> Vec<NegotiationMessage> {
        self.local_description_set = true;
        self.description_emitted = true;

        let mut outgoing = Vec::with_capacity(1 + self.outbound_candidates.len());
        outgoing.push(match self.role {
            Role::Offerer => NegotiationMessage::Offer { offer: description },
            Role::Answerer => NegotiationMessage::Answer {
                answer: description,
            },
        });
        outgoing.extend(
            self.outbound_candidates
                .drain(..)
                .map(|candidate| NegotiationMessage::Candidate { candidate }),
        );

        self.state = match self.role {
            Role::Offerer if !self.remote_description_set => {
                NegotiationState::AwaitingRemoteDescription
            }
            _ => NegotiationState::Connected,
        };
        outgoing
    }

    /// A candidate of ours was discovered. It is held back until our own
    /// description has gone out.
    pub(crate) fn on_local_candidate(&mut self, candidate: Candidate) -> Option<NegotiationMessage> {
        if self.description_emitted {
            Some(NegotiationMessage::Candidate { candidate })
        } else {
            self.outbound_candidates.push(candidate);
            None
        }
    }

    pub(crate) fn accept_candidate(&mut self, candidate: Candidate) -> CandidateDisposition {
        if self.remote_description_set {
            self.enqueue(TransportOp::AddCandidate(candidate));
            CandidateDisposition::Applied
        } else if self.pending_candidates.len() >= MAX_PENDING_CANDIDATES {
            warn!(
                "Dropping candidate from {}: {} already pending",
                self.key, MAX_PENDING_CANDIDATES
            );
            CandidateDisposition::Dropped
        } else {
            self.pending_candidates.push(candidate);
            CandidateDisposition::Buffered
        }
    }

    /// Moves the session to `Closed` and cancels its worker, which abandons
    /// queued work and closes the transport. The worker's handle is returned
    /// for callers that want to wait for that.
    pub(crate) fn close(&mut self) -> Option<JoinHandle<()>> {
        self.state = NegotiationState::Closed;
        self.pending_candidates.clear();
        self.outbound_candidates.clear();
        self.worker.take().and_then(WorkerHandle::cancel)
    }

    fn enqueue(&self, op: TransportOp) {
        let Some(worker) = &self.worker else {
            return;
        };
        if !worker.send(op) {
            // The worker stopped after a failure; its report is on the way.
            debug!("Transport queue for {} is gone", self.key);
        }
    }
}
