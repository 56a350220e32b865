use std::sync::Arc;

use moot_client::mailbox::MemoryMailbox;
use moot_client::media::SampleDevices;
use moot_core::model::MeetingId;

use crate::integration::{init_tracing, peer_on, wait_until};

#[tokio::test]
async fn guest_waits_until_host_admits() {
    init_tracing();

    let mailbox = Arc::new(MemoryMailbox::new());
    let host_peer = peer_on(mailbox.clone(), SampleDevices::new());
    let guest_peer = peer_on(mailbox, SampleDevices::new());

    let mut host = host_peer.client.create_meeting("Ann").await.unwrap();
    assert!(host.state().is_host);
    let meeting = host.state().meeting_id.clone();

    let mut guest = guest_peer
        .client
        .join_meeting(&meeting, "Bo")
        .await
        .unwrap();
    assert!(!guest.state().is_admitted());

    let seen = wait_until(&mut host, |s| !s.waiting.is_empty()).await;
    assert_eq!(seen.waiting.len(), 1);
    assert_eq!(seen.waiting[0].name, "Bo");

    host.admit(seen.waiting[0].clone()).await.unwrap();

    let host_state = wait_until(&mut host, |s| s.participants.len() == 2).await;
    assert!(host_state.waiting.is_empty());

    let guest_state = wait_until(&mut guest, |s| s.is_admitted()).await;
    assert_eq!(guest_state.participants.len(), 2);
    assert!(guest_state.waiting.is_empty());
    let host_entry = guest_state
        .participants
        .iter()
        .find(|p| p.is_host)
        .expect("host in roster");
    assert_eq!(host_entry.name, "Ann");
}

#[tokio::test]
async fn joining_an_unknown_meeting_fails() {
    init_tracing();

    let guest_peer = peer_on(Arc::new(MemoryMailbox::new()), SampleDevices::new());
    let err = guest_peer
        .client
        .join_meeting(&MeetingId::from("no-such-meeting"), "Bo")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no-such-meeting"));
}
