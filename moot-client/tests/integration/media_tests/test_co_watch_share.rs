use std::time::Duration;

use moot_core::model::{QualityHint, TrackKind};

use crate::integration::{connected_pair, init_tracing, wait_until};

#[tokio::test]
async fn co_watch_replaces_both_senders_and_announces_the_share() {
    init_tracing();

    let (host_peer, mut host, _guest_peer, mut guest) = connected_pair().await;
    let host_id = host.state().local_id.clone();
    let guest_id = guest.state().local_id.clone();
    let link = host_peer.links.link_to(&guest_id).expect("host link");

    host.share_media("movie.mp4").await.unwrap();

    // Both primary senders now carry the captured playback, at elevated
    // quality.
    assert_eq!(link.outgoing(TrackKind::Video).unwrap().id(), "playback-video");
    assert_eq!(link.outgoing(TrackKind::Audio).unwrap().id(), "playback-audio");
    assert!(
        link.quality_hints()
            .contains(&(TrackKind::Video, QualityHint::co_watch()))
    );

    let guest_state = wait_until(&mut guest, |s| s.shared_media.is_some()).await;
    let media = guest_state.shared_media.unwrap();
    assert_eq!(media.name, "movie.mp4");
    assert_eq!(media.sharer_id, host_id);
    assert_eq!(guest_state.current_sharer, Some(host_id));

    host.stop_media_share().await.unwrap();
    wait_until(&mut guest, |s| s.shared_media.is_none()).await;
    wait_until(&mut host, |s| s.shared_media.is_none()).await;
    assert_eq!(link.outgoing(TrackKind::Video).unwrap().id(), "camera");
    assert_eq!(link.outgoing(TrackKind::Audio).unwrap().id(), "microphone");
}

#[tokio::test]
async fn follower_receives_playback_directives() {
    init_tracing();

    let (_host_peer, host, _guest_peer, mut guest) = connected_pair().await;

    let mut directives = guest.playback_directives();
    host.share_media("movie.mp4").await.unwrap();
    wait_until(&mut guest, |s| s.shared_media.is_some()).await;

    // First report from the sharer: the follower has no local position, so
    // it seeks and starts playing.
    host.playback_changed(true, 42.0).await.unwrap();
    let directive = tokio::time::timeout(Duration::from_secs(5), directives.recv())
        .await
        .expect("directive timeout")
        .expect("directive stream");
    assert_eq!(directive.seek, Some(42.0));
    assert_eq!(directive.set_playing, Some(true));
}

#[tokio::test]
async fn sharer_ignores_remote_playback_echoes() {
    init_tracing();

    let (_host_peer, mut host, _guest_peer, _guest) = connected_pair().await;

    let mut directives = host.playback_directives();
    host.share_media("movie.mp4").await.unwrap();
    host.playback_changed(true, 10.0).await.unwrap();

    // The sharer's own meeting-document echo must not produce a directive.
    wait_until(&mut host, |s| {
        s.shared_media
            .as_ref()
            .is_some_and(|m| m.playback.is_some())
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        directives.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
