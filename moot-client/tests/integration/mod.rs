//! Integration tests for moot-client.
//!
//! Tests are organized by functionality:
//! - `admission_tests` - waiting room, admit and deny
//! - `connection_tests` - negotiation, candidates and teardown
//! - `media_tests` - screen share and co-watch routing
//! - `messaging_tests` - chat

pub mod admission_tests;
pub mod connection_tests;

use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

use moot_client::engine::{MeetingClient, MeetingHandle, MeetingState};
use moot_client::mailbox::MemoryMailbox;
use moot_client::media::SampleDevices;
use moot_client::session::SessionPhase;

use crate::utils::FakeLinkFactory;

/// Timeout for any single state transition a test waits on.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One test participant: its client plus the injected fakes for inspection.
pub struct TestPeer {
    pub client: MeetingClient,
    pub devices: SampleDevices,
    pub links: Arc<FakeLinkFactory>,
}

pub fn peer_on(mailbox: Arc<MemoryMailbox>, devices: SampleDevices) -> TestPeer {
    let links = FakeLinkFactory::new();
    let client = MeetingClient::new(mailbox, Arc::new(devices.clone()), links.clone());
    TestPeer {
        client,
        devices,
        links,
    }
}

/// Poll the handle's state until `pred` holds, or panic after the timeout.
pub async fn wait_until<F>(handle: &mut MeetingHandle, mut pred: F) -> MeetingState
where
    F: FnMut(&MeetingState) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let state = handle.state();
        if pred(&state) {
            return state;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(
            !remaining.is_zero(),
            "timed out waiting for state, last: {state:?}"
        );
        tokio::time::timeout(remaining, handle.changed())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for state, last: {state:?}"))
            .expect("engine stopped while waiting");
    }
}

pub fn fully_connected(state: &MeetingState) -> bool {
    !state.session_phases.is_empty()
        && state
            .session_phases
            .values()
            .all(|p| *p == SessionPhase::Connected)
}

/// Host creates a meeting, a guest joins and is admitted, and both sides
/// reach a connected session. Returns (host peer, host handle, guest peer,
/// guest handle).
pub async fn connected_pair() -> (TestPeer, MeetingHandle, TestPeer, MeetingHandle) {
    let mailbox = Arc::new(MemoryMailbox::new());
    let host_peer = peer_on(mailbox.clone(), SampleDevices::new());
    let guest_peer = peer_on(mailbox, SampleDevices::new());

    let mut host = host_peer
        .client
        .create_meeting("Ann")
        .await
        .expect("create meeting");
    let meeting = host.state().meeting_id.clone();
    let mut guest = guest_peer
        .client
        .join_meeting(&meeting, "Bo")
        .await
        .expect("join meeting");

    let seen = wait_until(&mut host, |s| !s.waiting.is_empty()).await;
    host.admit(seen.waiting[0].clone()).await.expect("admit");

    wait_until(&mut host, fully_connected).await;
    wait_until(&mut guest, fully_connected).await;
    (host_peer, host, guest_peer, guest)
}
