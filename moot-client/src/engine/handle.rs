use crate::engine::command::EngineCommand;
use crate::engine::engine::{COMMAND_BUFFER, DIRECTIVE_BUFFER, MeetingEngine};
use crate::engine::state::MeetingState;
use crate::engine::sync::PlaybackDirective;
use crate::error::{EngineError, MailboxError};
use crate::link::LinkFactory;
use crate::mailbox::Mailbox;
use crate::media::MediaDevices;
use crate::time::now_millis;
use moot_core::model::{MeetingId, ParticipantDoc, ParticipantId, WaitingParticipant};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::info;

/// Entry point: holds the injected collaborators and spawns one engine per
/// meeting. Cloneable; handles outlive it.
#[derive(Clone)]
pub struct MeetingClient {
    mailbox: Arc<dyn Mailbox>,
    devices: Arc<dyn MediaDevices>,
    links: Arc<dyn LinkFactory>,
}

impl MeetingClient {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        devices: Arc<dyn MediaDevices>,
        links: Arc<dyn LinkFactory>,
    ) -> Self {
        Self {
            mailbox,
            devices,
            links,
        }
    }

    /// Create a meeting and enter it as host. The host is in the roster
    /// from the first snapshot and never passes through the waiting room.
    pub async fn create_meeting(&self, name: &str) -> Result<MeetingHandle, EngineError> {
        let meeting = MeetingId::random();
        let local = ParticipantId::random();
        info!(%meeting, "creating meeting as {name}");
        self.mailbox
            .create_meeting(
                &meeting,
                ParticipantDoc {
                    id: local.clone(),
                    name: name.to_owned(),
                    is_host: true,
                },
            )
            .await?;
        let state = MeetingState::new(meeting, local, name.to_owned(), true);
        Ok(self.spawn(state))
    }

    /// Join an existing meeting. The participant lands in the waiting room
    /// and stays there until the host admits them; the returned handle's
    /// state reflects admission when it happens.
    pub async fn join_meeting(
        &self,
        meeting: &MeetingId,
        name: &str,
    ) -> Result<MeetingHandle, EngineError> {
        if !self.mailbox.meeting_exists(meeting).await? {
            return Err(MailboxError::MeetingNotFound(meeting.to_string()).into());
        }
        let local = ParticipantId::random();
        info!(%meeting, "joining as {name}");
        self.mailbox
            .put_waiting(
                meeting,
                WaitingParticipant {
                    id: local.clone(),
                    name: name.to_owned(),
                    timestamp: now_millis(),
                },
            )
            .await?;
        let state = MeetingState::new(meeting.clone(), local, name.to_owned(), false);
        Ok(self.spawn(state))
    }

    fn spawn(&self, state: MeetingState) -> MeetingHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (directive_tx, _) = broadcast::channel(DIRECTIVE_BUFFER);
        let engine = MeetingEngine::new(
            self.mailbox.clone(),
            self.devices.clone(),
            self.links.clone(),
            state,
            cmd_rx,
            state_tx,
            directive_tx.clone(),
        );
        tokio::spawn(engine.run());
        MeetingHandle {
            cmd_tx,
            state_rx,
            directive_tx,
        }
    }
}

/// The caller's side of one joined meeting: commands in, state snapshots
/// and playback directives out.
#[derive(Clone, Debug)]
pub struct MeetingHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    state_rx: watch::Receiver<MeetingState>,
    directive_tx: broadcast::Sender<PlaybackDirective>,
}

impl MeetingHandle {
    /// Latest published meeting state.
    pub fn state(&self) -> MeetingState {
        self.state_rx.borrow().clone()
    }

    /// Wait for the next state publication.
    pub async fn changed(&mut self) -> Result<(), EngineError> {
        self.state_rx
            .changed()
            .await
            .map_err(|_| EngineError::EngineGone)
    }

    /// Subscribe to player directives produced while following a co-watch.
    pub fn playback_directives(&self) -> broadcast::Receiver<PlaybackDirective> {
        self.directive_tx.subscribe()
    }

    pub async fn set_media_state(
        &self,
        mic_muted: bool,
        camera_off: bool,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::SetMediaState {
            mic_muted,
            camera_off,
        })
        .await
    }

    pub async fn admit(&self, participant: WaitingParticipant) -> Result<(), EngineError> {
        self.send(EngineCommand::Admit { participant }).await
    }

    pub async fn deny(&self, participant: ParticipantId) -> Result<(), EngineError> {
        self.send(EngineCommand::Deny { participant }).await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), EngineError> {
        self.send(EngineCommand::SendChat { text: text.into() }).await
    }

    pub async fn ack_chat(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::AckChat).await
    }

    pub async fn start_screen_share(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::StartScreenShare { reply }).await?;
        rx.await.map_err(|_| EngineError::EngineGone)?
    }

    pub async fn stop_screen_share(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::StopScreenShare).await
    }

    /// Start co-watching a locally loaded video.
    pub async fn share_media(&self, name: impl Into<String>) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::ShareMedia {
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::EngineGone)?
    }

    pub async fn stop_media_share(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::StopMediaShare).await
    }

    /// Report a local player event (play, pause or seek).
    pub async fn playback_changed(
        &self,
        is_playing: bool,
        position: f64,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::PlaybackChanged {
            is_playing,
            position,
        })
        .await
    }

    pub async fn leave(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Leave).await
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::EngineGone)
    }
}
