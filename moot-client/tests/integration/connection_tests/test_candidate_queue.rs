use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use moot_client::session::NegotiationSession;
use moot_core::model::{CandidatePayload, ConnectionDoc, ParticipantId, SessionDescription};

use crate::integration::{connected_pair, init_tracing};
use crate::utils::{FAKE_CANDIDATES, FakeLink};

fn payload(s: &str) -> CandidatePayload {
    CandidatePayload {
        candidate: s.to_owned(),
        ..Default::default()
    }
}

#[tokio::test]
async fn candidates_queue_until_the_remote_description_and_flush_in_order() {
    init_tracing();

    let (events, _rx) = mpsc::channel(16);
    let link = Arc::new(FakeLink::new(ParticipantId::from("b2"), events));
    let mut session = NegotiationSession::new(
        ParticipantId::from("a1"),
        ParticipantId::from("b2"),
        link.clone(),
    );
    assert!(session.role().is_initiator());
    let offer = session.start().await.expect("initiator offer");

    // Candidates arriving before the answer are held, duplicates dropped.
    session.handle_remote_candidate("c1", payload("one")).await;
    session.handle_remote_candidate("c1", payload("one-again")).await;
    session.handle_remote_candidate("c2", payload("two")).await;
    assert!(link.applied_candidates().is_empty());

    let doc = ConnectionDoc {
        participants: vec![ParticipantId::from("a1"), ParticipantId::from("b2")],
        offer: Some(offer),
        offer_by: Some(ParticipantId::from("a1")),
        answer: Some(SessionDescription::answer("answer".to_owned())),
        answer_by: Some(ParticipantId::from("b2")),
        ..Default::default()
    };
    session.handle_connection_doc(&doc).await;
    assert_eq!(link.applied_candidates(), vec!["one", "two"]);

    // A re-delivered snapshot is a no-op, and late candidates go straight
    // through.
    session.handle_connection_doc(&doc).await;
    session.handle_remote_candidate("c3", payload("three")).await;
    assert_eq!(link.applied_candidates(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn trickled_candidates_reach_the_other_side() {
    init_tracing();

    let (host_peer, host, guest_peer, guest) = connected_pair().await;
    let host_id = host.state().local_id.clone();
    let guest_id = guest.state().local_id.clone();

    let host_link = host_peer.links.link_to(&guest_id).expect("host link");
    let guest_link = guest_peer.links.link_to(&host_id).expect("guest link");

    // Each side trickled a fixed number of candidates; the opposite link
    // ends up with exactly that many applied, however they interleaved
    // with the descriptions.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if host_link.applied_candidates().len() == FAKE_CANDIDATES
            && guest_link.applied_candidates().len() == FAKE_CANDIDATES
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "candidates never arrived: host={:?} guest={:?}",
            host_link.applied_candidates(),
            guest_link.applied_candidates()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
