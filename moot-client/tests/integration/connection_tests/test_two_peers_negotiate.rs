use moot_core::model::{SdpKind, TrackKind, pair_key};

use crate::integration::{connected_pair, init_tracing, wait_until};

#[tokio::test]
async fn offer_comes_from_the_smaller_id_and_both_sides_connect() {
    init_tracing();

    let (host_peer, host, guest_peer, guest) = connected_pair().await;
    let host_id = host.state().local_id.clone();
    let guest_id = guest.state().local_id.clone();

    let host_link = host_peer.links.link_to(&guest_id).expect("host link");
    let guest_link = guest_peer.links.link_to(&host_id).expect("guest link");
    assert!(host_link.has_both_descriptions());
    assert!(guest_link.has_both_descriptions());

    // The lexicographically smaller id offered, the other answered.
    let (initiator, responder) = if host_id < guest_id {
        (&host_link, &guest_link)
    } else {
        (&guest_link, &host_link)
    };
    assert_eq!(initiator.local_description().unwrap().kind, SdpKind::Offer);
    assert_eq!(responder.local_description().unwrap().kind, SdpKind::Answer);

    // Both ends derived the same pair key and opened exactly one link each.
    assert_eq!(pair_key(&host_id, &guest_id), pair_key(&guest_id, &host_id));
    assert_eq!(host_peer.links.opened(), 1);
    assert_eq!(guest_peer.links.opened(), 1);
}

#[tokio::test]
async fn camera_and_microphone_are_routed_on_connect() {
    init_tracing();

    let (host_peer, mut host, _guest_peer, guest) = connected_pair().await;
    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    let video = link.outgoing(TrackKind::Video).unwrap();
    let audio = link.outgoing(TrackKind::Audio).unwrap();
    assert_eq!(video.id(), "camera");
    assert_eq!(audio.id(), "microphone");

    // Mute flags flow to the shared tracks, not to the senders.
    host.set_media_state(true, true).await.unwrap();
    wait_until(&mut host, |s| s.is_mic_muted && s.is_camera_off).await;
    assert!(!audio.is_enabled());
    assert!(!video.is_enabled());
}

#[tokio::test]
async fn remote_stream_is_attached_to_the_roster_entry() {
    init_tracing();

    let (host_peer, mut host, _guest_peer, guest) = connected_pair().await;
    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    link.emit_remote_stream("stream-bo").await;
    let state = wait_until(&mut host, |s| {
        s.participant(&guest_id)
            .is_some_and(|p| p.stream.is_some())
    })
    .await;
    assert_eq!(
        state.participant(&guest_id).unwrap().stream.as_ref().unwrap().id,
        "stream-bo"
    );
}
