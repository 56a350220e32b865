use std::sync::Arc;

use tokio::sync::mpsc;

use moot_client::link::LinkState;
use moot_client::session::{NegotiationSession, SessionPhase};
use moot_core::model::{CandidatePayload, ConnectionDoc, ParticipantId, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::FakeLink;

#[tokio::test]
async fn close_is_idempotent_and_handlers_are_noops_afterwards() {
    init_tracing();

    let (events, _rx) = mpsc::channel(16);
    let link = Arc::new(FakeLink::new(ParticipantId::from("b2"), events));
    let mut session = NegotiationSession::new(
        ParticipantId::from("a1"),
        ParticipantId::from("b2"),
        link.clone(),
    );
    let offer = session.start().await.expect("initiator offer");

    session.close().await;
    session.close().await;
    assert_eq!(link.close_calls(), 1);
    assert_eq!(session.phase(), SessionPhase::Closed);

    // Late mailbox traffic and link transitions are ignored after teardown.
    session
        .handle_remote_candidate(
            "c1",
            CandidatePayload {
                candidate: "late".to_owned(),
                ..Default::default()
            },
        )
        .await;
    let doc = ConnectionDoc {
        participants: vec![ParticipantId::from("a1"), ParticipantId::from("b2")],
        offer: Some(offer),
        offer_by: Some(ParticipantId::from("a1")),
        answer: Some(SessionDescription::answer("late-answer".to_owned())),
        answer_by: Some(ParticipantId::from("b2")),
        ..Default::default()
    };
    assert!(session.handle_connection_doc(&doc).await.is_none());
    session.note_link_state(LinkState::Connected);

    assert!(link.applied_candidates().is_empty());
    assert!(!link.has_both_descriptions());
    assert_eq!(session.phase(), SessionPhase::Closed);
}
