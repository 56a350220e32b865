use moot_client::link::LinkState;

use crate::integration::{connected_pair, init_tracing, wait_until};

#[tokio::test]
async fn leaving_peer_is_torn_down_on_the_other_side() {
    init_tracing();

    let (host_peer, mut host, _guest_peer, guest) = connected_pair().await;
    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    guest.leave().await.unwrap();

    let state = wait_until(&mut host, |s| s.participants.len() == 1).await;
    assert!(state.session_phases.is_empty());
    assert!(link.close_calls() >= 1);
}

#[tokio::test]
async fn failed_link_closes_the_session_and_clears_the_stream() {
    init_tracing();

    let (host_peer, mut host, _guest_peer, guest) = connected_pair().await;
    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    link.emit_remote_stream("stream-bo").await;
    wait_until(&mut host, |s| {
        s.participant(&guest_id)
            .is_some_and(|p| p.stream.is_some())
    })
    .await;

    link.emit_state(LinkState::Failed).await;
    let state = wait_until(&mut host, |s| !s.session_phases.contains_key(&guest_id)).await;
    assert!(state.participant(&guest_id).unwrap().stream.is_none());
    assert!(link.close_calls() >= 1);
}

#[tokio::test]
async fn leave_is_idempotent_for_the_leaver() {
    init_tracing();

    let (_host_peer, _host, _guest_peer, mut guest) = connected_pair().await;
    guest.leave().await.unwrap();

    // The engine stops after publishing its final state.
    wait_until(&mut guest, |s| s.left).await;
}
