use std::sync::Arc;
use std::time::Duration;

use moot_client::mailbox::MemoryMailbox;
use moot_client::media::SampleDevices;

use crate::integration::{init_tracing, peer_on, wait_until};

#[tokio::test]
async fn denied_guest_stays_out_of_the_roster() {
    init_tracing();

    let mailbox = Arc::new(MemoryMailbox::new());
    let host_peer = peer_on(mailbox.clone(), SampleDevices::new());
    let guest_peer = peer_on(mailbox, SampleDevices::new());

    let mut host = host_peer.client.create_meeting("Ann").await.unwrap();
    let meeting = host.state().meeting_id.clone();
    let guest = guest_peer
        .client
        .join_meeting(&meeting, "Bo")
        .await
        .unwrap();

    let seen = wait_until(&mut host, |s| !s.waiting.is_empty()).await;
    host.deny(seen.waiting[0].id.clone()).await.unwrap();

    let host_state = wait_until(&mut host, |s| s.waiting.is_empty()).await;
    assert_eq!(host_state.participants.len(), 1);

    // The denied guest never gets admitted and no link is ever opened.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!guest.state().is_admitted());
    assert_eq!(guest_peer.links.opened(), 0);
}
