use crate::link::{LinkState, PeerLink};
use moot_core::model::{
    CandidatePayload, ConnectionDoc, NegotiationRole, ParticipantId, SessionDescription, pair_key,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle of one negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    RoleAssigned,
    OfferSent,
    AwaitingOffer,
    DescriptionExchanged,
    Connected,
    Closed,
}

/// Per-remote-participant negotiation state machine. Exactly one exists per
/// roster peer while local media is ready. Driven exclusively from the
/// engine's serialized event loop, so interior flags need no locking; the
/// races it guards against are message races, not data races.
///
/// Every handler is a safe no-op once the session is closed.
pub struct NegotiationSession {
    local_id: ParticipantId,
    peer_id: ParticipantId,
    pair: String,
    role: NegotiationRole,
    phase: SessionPhase,
    offer_handled: bool,
    answer_handled: bool,
    remote_description_set: bool,
    queued_candidates: VecDeque<CandidatePayload>,
    seen_candidates: HashSet<String>,
    link: Arc<dyn PeerLink>,
    watch_tasks: Vec<JoinHandle<()>>,
}

impl NegotiationSession {
    /// Role assignment is a pure function of the identifier pair, so both
    /// ends independently agree without a coordination round-trip.
    pub fn new(local_id: ParticipantId, peer_id: ParticipantId, link: Arc<dyn PeerLink>) -> Self {
        let role = NegotiationRole::between(&local_id, &peer_id);
        let pair = pair_key(&local_id, &peer_id);
        Self {
            local_id,
            peer_id,
            pair,
            role,
            phase: SessionPhase::RoleAssigned,
            offer_handled: false,
            answer_handled: false,
            remote_description_set: false,
            queued_candidates: VecDeque::new(),
            seen_candidates: HashSet::new(),
            link,
            watch_tasks: Vec::new(),
        }
    }

    pub fn peer_id(&self) -> &ParticipantId {
        &self.peer_id
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn link(&self) -> Arc<dyn PeerLink> {
        self.link.clone()
    }

    /// Register a mailbox subscription task torn down with the session.
    pub fn attach_watch(&mut self, task: JoinHandle<()>) {
        self.watch_tasks.push(task);
    }

    /// Initiator: produce the local offer for the mailbox. The responder
    /// moves to `AwaitingOffer` and produces nothing.
    pub async fn start(&mut self) -> Option<SessionDescription> {
        if self.phase != SessionPhase::RoleAssigned {
            return None;
        }
        if !self.role.is_initiator() {
            self.phase = SessionPhase::AwaitingOffer;
            return None;
        }
        match self.link.create_offer().await {
            Ok(offer) => {
                self.phase = SessionPhase::OfferSent;
                Some(offer)
            }
            Err(e) => {
                error!("failed to create offer for peer {}: {e}", self.peer_id);
                None
            }
        }
    }

    /// Feed one connection-document snapshot. Duplicate snapshots are
    /// harmless: each of offer/answer handling is one-shot. Returns the
    /// answer to write back, if this snapshot carried a fresh remote offer.
    pub async fn handle_connection_doc(
        &mut self,
        doc: &ConnectionDoc,
    ) -> Option<SessionDescription> {
        if self.phase == SessionPhase::Closed {
            return None;
        }

        let mut answer_out = None;

        if let (Some(offer), Some(offer_by)) = (&doc.offer, &doc.offer_by) {
            if *offer_by != self.local_id && !self.offer_handled {
                // The flag flips before the async work so a re-delivered
                // snapshot cannot re-trigger the exchange.
                self.offer_handled = true;
                match self.link.accept_offer(offer.clone()).await {
                    Ok(answer) => {
                        self.remote_description_applied().await;
                        answer_out = Some(answer);
                    }
                    Err(e) => error!("failed answering offer from {}: {e}", self.peer_id),
                }
            }
        }

        if let (Some(answer), Some(answer_by)) = (&doc.answer, &doc.answer_by) {
            if *answer_by != self.local_id && !self.answer_handled {
                self.answer_handled = true;
                match self.link.accept_answer(answer.clone()).await {
                    Ok(()) => self.remote_description_applied().await,
                    Err(e) => error!("failed applying answer from {}: {e}", self.peer_id),
                }
            }
        }

        answer_out
    }

    /// Feed one remote candidate. Idempotent by candidate id; queued until
    /// the remote description is applied, then applied in arrival order.
    pub async fn handle_remote_candidate(&mut self, id: &str, candidate: CandidatePayload) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        if !self.seen_candidates.insert(id.to_owned()) {
            return;
        }
        if !self.remote_description_set {
            self.queued_candidates.push_back(candidate);
            return;
        }
        if let Err(e) = self.link.add_remote_candidate(candidate).await {
            warn!("failed to add candidate from {}: {e}", self.peer_id);
        }
    }

    /// Transport state transition observed for this session's link.
    pub fn note_link_state(&mut self, state: LinkState) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        if state == LinkState::Connected {
            info!("peer {} connected", self.peer_id);
            self.phase = SessionPhase::Connected;
        }
    }

    async fn remote_description_applied(&mut self) {
        self.remote_description_set = true;
        self.phase = SessionPhase::DescriptionExchanged;
        let queued = std::mem::take(&mut self.queued_candidates);
        for candidate in queued {
            if let Err(e) = self.link.add_remote_candidate(candidate).await {
                warn!("failed to add queued candidate from {}: {e}", self.peer_id);
            }
        }
    }

    /// Tear the session down: detach mailbox subscriptions and close the
    /// connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.phase = SessionPhase::Closed;
        for task in self.watch_tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.link.close().await {
            debug!("closing link to {}: {e}", self.peer_id);
        }
    }
}
