use std::sync::Arc;

use moot_client::error::{EngineError, MediaError};
use moot_client::mailbox::MemoryMailbox;
use moot_client::media::SampleDevices;

use crate::integration::{
    connected_pair, fully_connected, init_tracing, peer_on, wait_until,
};

#[tokio::test]
async fn only_one_share_at_a_time() {
    init_tracing();

    let (_host_peer, host, _guest_peer, mut guest) = connected_pair().await;

    host.start_screen_share().await.unwrap();
    assert!(matches!(
        host.share_media("movie.mp4").await,
        Err(EngineError::ShareBusy)
    ));

    // A second screen share is refused too.
    assert!(matches!(
        host.start_screen_share().await,
        Err(EngineError::ShareBusy)
    ));

    host.stop_screen_share().await.unwrap();
    host.share_media("movie.mp4").await.unwrap();

    // The guest sees the host's share and cannot start its own co-watch.
    wait_until(&mut guest, |s| s.shared_media.is_some()).await;
    assert!(matches!(
        guest.share_media("other.mp4").await,
        Err(EngineError::ShareBusy)
    ));
}

#[tokio::test]
async fn unsupported_capture_fails_without_touching_the_links() {
    init_tracing();

    let mailbox = Arc::new(MemoryMailbox::new());
    let host_peer = peer_on(
        mailbox.clone(),
        SampleDevices::new().without_screen_capture(),
    );
    let guest_peer = peer_on(mailbox, SampleDevices::new());

    let mut host = host_peer.client.create_meeting("Ann").await.unwrap();
    let meeting = host.state().meeting_id.clone();
    let mut guest = guest_peer
        .client
        .join_meeting(&meeting, "Bo")
        .await
        .unwrap();
    let seen = wait_until(&mut host, |s| !s.waiting.is_empty()).await;
    host.admit(seen.waiting[0].clone()).await.unwrap();
    wait_until(&mut host, fully_connected).await;
    wait_until(&mut guest, fully_connected).await;

    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    let err = host.start_screen_share().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Media(MediaError::CaptureUnsupported(_))
    ));

    // The failure stays local: the session is untouched and the camera is
    // still routed.
    assert!(!host.state().is_screen_sharing);
    assert!(fully_connected(&host.state()));
    assert_eq!(
        link.outgoing(moot_core::model::TrackKind::Video).unwrap().id(),
        "camera"
    );
}
