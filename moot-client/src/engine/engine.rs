use crate::engine::command::EngineCommand;
use crate::engine::event::EngineEvent;
use crate::engine::router::{ShareKind, TrackRouter};
use crate::engine::state::MeetingState;
use crate::engine::sync::{PlaybackDirective, PlaybackSync};
use crate::error::EngineError;
use crate::link::{LinkEventKind, LinkFactory, PeerLink};
use crate::mailbox::Mailbox;
use crate::media::MediaDevices;
use crate::session::NegotiationSession;
use crate::time::now_millis;
use moot_core::model::{
    CandidateDoc, ChatMessage, MediaKind, ParticipantId, PlaybackState, SharedMedia,
    WaitingParticipant,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) const COMMAND_BUFFER: usize = 64;
pub(crate) const EVENT_BUFFER: usize = 256;
pub(crate) const DIRECTIVE_BUFFER: usize = 16;

/// Spawned task that republishes one mailbox feed into the engine's event
/// channel. Dies with either end.
fn forward_into<T, F>(
    mut rx: mpsc::Receiver<T>,
    tx: mpsc::Sender<EngineEvent>,
    wrap: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> EngineEvent + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if tx.send(wrap(item)).await.is_err() {
                break;
            }
        }
    })
}

/// The meeting's single writer. Every mailbox snapshot, link completion and
/// UI command funnels into `run`'s select loop, so state transitions never
/// interleave.
pub struct MeetingEngine {
    mailbox: Arc<dyn Mailbox>,
    devices: Arc<dyn MediaDevices>,
    links: Arc<dyn LinkFactory>,
    state: MeetingState,
    sessions: HashMap<ParticipantId, NegotiationSession>,
    router: TrackRouter,
    sync: PlaybackSync,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
    event_rx: mpsc::Receiver<EngineEvent>,
    state_tx: watch::Sender<MeetingState>,
    directive_tx: broadcast::Sender<PlaybackDirective>,
    feed_tasks: Vec<JoinHandle<()>>,
    // At most one capture-ended waiter is alive at a time.
    capture_task: Option<JoinHandle<()>>,
}

impl MeetingEngine {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        devices: Arc<dyn MediaDevices>,
        links: Arc<dyn LinkFactory>,
        state: MeetingState,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        state_tx: watch::Sender<MeetingState>,
        directive_tx: broadcast::Sender<PlaybackDirective>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            mailbox,
            devices,
            links,
            state,
            sessions: HashMap::new(),
            router: TrackRouter::new(),
            sync: PlaybackSync::new(),
            cmd_rx,
            event_tx,
            event_rx,
            state_tx,
            directive_tx,
            feed_tasks: Vec::new(),
            capture_task: None,
        }
    }

    pub async fn run(mut self) {
        self.subscribe_meeting_feeds();
        self.publish_state();
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // The handle is gone; treat it as a leave.
                    None => self.shutdown().await,
                },
                Some(event) = self.event_rx.recv() => self.handle_event(event).await,
            }
            self.publish_state();
            if self.state.left {
                break;
            }
        }
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(self.state.clone());
    }

    fn subscribe_meeting_feeds(&mut self) {
        let meeting = self.state.meeting_id.clone();
        self.feed_tasks.push(forward_into(
            self.mailbox.watch_roster(&meeting),
            self.event_tx.clone(),
            EngineEvent::Roster,
        ));
        self.feed_tasks.push(forward_into(
            self.mailbox.watch_waiting(&meeting),
            self.event_tx.clone(),
            EngineEvent::Waiting,
        ));
        self.feed_tasks.push(forward_into(
            self.mailbox.watch_meeting(&meeting),
            self.event_tx.clone(),
            EngineEvent::Meeting,
        ));
        self.feed_tasks.push(forward_into(
            self.mailbox.watch_chat(&meeting),
            self.event_tx.clone(),
            EngineEvent::Chat,
        ));
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Roster(docs) => {
                self.state.apply_roster(docs);
                self.reconcile_sessions().await;
            }
            EngineEvent::Waiting(docs) => self.state.apply_waiting(docs),
            EngineEvent::Meeting(doc) => {
                if let Some(playback) = self.state.apply_meeting(doc) {
                    self.apply_remote_playback(playback);
                } else if self.state.shared_media.is_none()
                    && self.router.active_share() != Some(ShareKind::CoWatch)
                {
                    self.sync.reset();
                }
            }
            EngineEvent::Chat(messages) => self.state.apply_chat(messages),
            EngineEvent::Connection { peer, doc } => {
                let Some(session) = self.sessions.get_mut(&peer) else {
                    return;
                };
                let pair = session.pair().to_owned();
                let answer = session.handle_connection_doc(&doc).await;
                let phase = session.phase();
                self.state.session_phases.insert(peer.clone(), phase);
                if let Some(answer) = answer {
                    if let Err(e) = self
                        .mailbox
                        .write_answer(
                            &self.state.meeting_id,
                            &pair,
                            answer,
                            self.state.local_id.clone(),
                        )
                        .await
                    {
                        error!("failed to publish answer for {peer}: {e}");
                    }
                }
            }
            EngineEvent::Candidate { peer, added } => {
                if added.doc.from == self.state.local_id {
                    return;
                }
                if let Some(session) = self.sessions.get_mut(&peer) {
                    session
                        .handle_remote_candidate(&added.id, added.doc.candidate)
                        .await;
                }
            }
            EngineEvent::Link(event) => self.handle_link_event(event.peer, event.kind).await,
            EngineEvent::CaptureEnded => {
                info!("display capture ended by the platform");
                self.stop_screen_share().await;
            }
        }
    }

    async fn handle_link_event(&mut self, peer: ParticipantId, kind: LinkEventKind) {
        match kind {
            LinkEventKind::StateChanged(state) => {
                if state.is_terminal() {
                    debug!("link to {peer} reached {state:?}, tearing session down");
                    self.teardown_session(&peer).await;
                } else if let Some(session) = self.sessions.get_mut(&peer) {
                    session.note_link_state(state);
                    let phase = session.phase();
                    self.state.session_phases.insert(peer, phase);
                }
            }
            LinkEventKind::RemoteStream(stream) => {
                self.state.set_participant_stream(&peer, Some(stream));
            }
            LinkEventKind::LocalCandidate(candidate) => {
                let Some(session) = self.sessions.get(&peer) else {
                    return;
                };
                let pair = session.pair().to_owned();
                let doc = CandidateDoc {
                    from: self.state.local_id.clone(),
                    candidate,
                    created_at: now_millis(),
                };
                if let Err(e) = self
                    .mailbox
                    .add_candidate(&self.state.meeting_id, &pair, doc)
                    .await
                {
                    warn!("failed to publish candidate for {peer}: {e}");
                }
            }
        }
    }

    /// Make the live session set match the roster: one session per remote
    /// participant, none for anyone who left. Requires local media; the
    /// first admitted roster snapshot acquires it lazily, and on failure no
    /// sessions are attempted.
    async fn reconcile_sessions(&mut self) {
        if !self.state.is_admitted() {
            return;
        }
        if self.router.user_media().is_none() {
            match self.devices.user_media().await {
                Ok(media) => {
                    media.audio.set_enabled(!self.state.is_mic_muted);
                    media.video.set_enabled(!self.state.is_camera_off);
                    self.router.set_user_media(media);
                    self.state.media_error = None;
                }
                Err(e) => {
                    warn!("cannot acquire camera/microphone: {e}");
                    self.state.media_error = Some(e.to_string());
                    return;
                }
            }
        }

        let roster: Vec<ParticipantId> = self
            .state
            .participants
            .iter()
            .map(|p| p.id.clone())
            .filter(|id| *id != self.state.local_id)
            .collect();

        for peer in &roster {
            if !self.sessions.contains_key(peer) {
                self.create_session(peer.clone()).await;
            }
        }

        let gone: Vec<ParticipantId> = self
            .sessions
            .keys()
            .filter(|peer| !roster.contains(peer))
            .cloned()
            .collect();
        for peer in gone {
            info!("peer {peer} left the roster");
            self.teardown_session(&peer).await;
        }
    }

    async fn create_session(&mut self, peer: ParticipantId) {
        // Per-session bridge from link callbacks into the engine loop; the
        // forwarder dies with the session.
        let (link_tx, link_rx) = mpsc::channel(EVENT_BUFFER);
        let link = match self.links.open(peer.clone(), link_tx).await {
            Ok(link) => link,
            Err(e) => {
                error!("failed to open link to {peer}: {e}");
                return;
            }
        };
        self.router.attach_link(&peer, &link).await;

        let mut session =
            NegotiationSession::new(self.state.local_id.clone(), peer.clone(), link);
        session.attach_watch(forward_into(
            link_rx,
            self.event_tx.clone(),
            EngineEvent::Link,
        ));
        let pair = session.pair().to_owned();
        let meeting = self.state.meeting_id.clone();
        info!(role = ?session.role(), %pair, "negotiating with {peer}");

        if let Err(e) = self
            .mailbox
            .ensure_connection(
                &meeting,
                &pair,
                [self.state.local_id.clone(), peer.clone()],
            )
            .await
        {
            error!("failed to create connection slot for {peer}: {e}");
        }

        let conn_peer = peer.clone();
        session.attach_watch(forward_into(
            self.mailbox.watch_connection(&meeting, &pair),
            self.event_tx.clone(),
            move |doc| EngineEvent::Connection {
                peer: conn_peer.clone(),
                doc,
            },
        ));
        let cand_peer = peer.clone();
        session.attach_watch(forward_into(
            self.mailbox.watch_candidates(&meeting, &pair),
            self.event_tx.clone(),
            move |added| EngineEvent::Candidate {
                peer: cand_peer.clone(),
                added,
            },
        ));

        if let Some(offer) = session.start().await {
            if let Err(e) = self
                .mailbox
                .write_offer(&meeting, &pair, offer, self.state.local_id.clone())
                .await
            {
                error!("failed to publish offer for {peer}: {e}");
            }
        }

        self.state
            .session_phases
            .insert(peer.clone(), session.phase());
        self.sessions.insert(peer, session);
    }

    async fn teardown_session(&mut self, peer: &ParticipantId) {
        if let Some(mut session) = self.sessions.remove(peer) {
            session.close().await;
        }
        self.state.session_phases.remove(peer);
        self.state.set_participant_stream(peer, None);
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SetMediaState {
                mic_muted,
                camera_off,
            } => {
                self.state.set_local_media_flags(mic_muted, camera_off);
                self.router.apply_media_flags(mic_muted, camera_off);
            }
            EngineCommand::Admit { participant } => self.admit(participant).await,
            EngineCommand::Deny { participant } => {
                if !self.state.is_host {
                    warn!("ignoring deny from non-host");
                    return;
                }
                if let Err(e) = self
                    .mailbox
                    .remove_waiting(&self.state.meeting_id, &participant)
                    .await
                {
                    warn!("failed to deny {participant}: {e}");
                }
            }
            EngineCommand::SendChat { text } => self.send_chat(text).await,
            EngineCommand::AckChat => self.state.unread_chat = false,
            EngineCommand::StartScreenShare { reply } => {
                let _ = reply.send(self.start_screen_share().await);
            }
            EngineCommand::StopScreenShare => self.stop_screen_share().await,
            EngineCommand::ShareMedia { name, reply } => {
                let _ = reply.send(self.share_media(name).await);
            }
            EngineCommand::StopMediaShare => self.stop_media_share().await,
            EngineCommand::PlaybackChanged {
                is_playing,
                position,
            } => self.playback_changed(is_playing, position).await,
            EngineCommand::Leave => self.shutdown().await,
        }
    }

    /// Roster first, waiting-room second: if the second write is lost the
    /// participant is admitted and the waiting entry is pruned locally.
    async fn admit(&mut self, participant: WaitingParticipant) {
        if !self.state.is_host {
            warn!("ignoring admit from non-host");
            return;
        }
        info!("admitting {} ({})", participant.name, participant.id);
        let doc = moot_core::model::ParticipantDoc {
            id: participant.id.clone(),
            name: participant.name,
            is_host: false,
        };
        if let Err(e) = self
            .mailbox
            .put_participant(&self.state.meeting_id, doc)
            .await
        {
            error!("failed to admit {}: {e}", participant.id);
            return;
        }
        if let Err(e) = self
            .mailbox
            .remove_waiting(&self.state.meeting_id, &participant.id)
            .await
        {
            warn!("failed to clear waiting entry for {}: {e}", participant.id);
        }
    }

    async fn send_chat(&mut self, text: String) {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: self.state.local_id.clone(),
            sender_name: self.state.local_name.clone(),
            text,
            timestamp: now_millis(),
        };
        self.state.add_local_chat(message.clone());
        if let Err(e) = self
            .mailbox
            .append_chat(&self.state.meeting_id, message)
            .await
        {
            warn!("failed to send chat message: {e}");
        }
    }

    async fn start_screen_share(&mut self) -> Result<(), EngineError> {
        if self.router.active_share().is_some() {
            return Err(EngineError::ShareBusy);
        }
        let mut capture = self.devices.display_media().await?;
        if let Some(stale) = self.capture_task.take() {
            stale.abort();
        }
        if let Some(ended) = capture.ended.take() {
            let tx = self.event_tx.clone();
            self.capture_task = Some(tokio::spawn(async move {
                if ended.await.is_ok() {
                    let _ = tx.send(EngineEvent::CaptureEnded).await;
                }
            }));
        }
        let links = self.link_list();
        self.router.start_screen(capture, &links).await;
        self.state.is_screen_sharing = true;
        Ok(())
    }

    async fn stop_screen_share(&mut self) {
        if self.router.active_share() != Some(ShareKind::Screen) {
            return;
        }
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        let links = self.link_list();
        self.router.stop_screen(&links).await;
        self.state.is_screen_sharing = false;
    }

    async fn share_media(&mut self, name: String) -> Result<(), EngineError> {
        if self.router.active_share().is_some() || self.remote_share_active() {
            return Err(EngineError::ShareBusy);
        }
        let capture = self.devices.playback_capture(&name).await?;
        let links = self.link_list();
        self.router.start_co_watch(capture, &links).await;

        let media = SharedMedia {
            sharer_id: self.state.local_id.clone(),
            sharer_name: self.state.local_name.clone(),
            kind: MediaKind::Video,
            name,
            playback: None,
        };
        self.state.set_local_share(Some(media.clone()));
        self.sync.reset();
        if let Err(e) = self
            .mailbox
            .set_shared_media(&self.state.meeting_id, Some(media))
            .await
        {
            warn!("failed to announce shared media: {e}");
        }
        Ok(())
    }

    fn remote_share_active(&self) -> bool {
        self.state
            .current_sharer
            .as_ref()
            .is_some_and(|sharer| *sharer != self.state.local_id)
    }

    fn is_local_sharer(&self) -> bool {
        self.state.current_sharer.as_ref() == Some(&self.state.local_id)
    }

    async fn stop_media_share(&mut self) {
        if self.router.active_share() != Some(ShareKind::CoWatch) {
            return;
        }
        let links = self.link_list();
        self.router.stop_co_watch(&links).await;
        self.router
            .apply_media_flags(self.state.is_mic_muted, self.state.is_camera_off);
        self.state.set_local_share(None);
        self.sync.reset();
        if let Err(e) = self
            .mailbox
            .set_shared_media(&self.state.meeting_id, None)
            .await
        {
            warn!("failed to clear shared media: {e}");
        }
    }

    /// Local player event. Followers record it for drift estimation only;
    /// the sharer additionally publishes it, unless it is an echo of a
    /// just-applied remote update.
    async fn playback_changed(&mut self, is_playing: bool, position: f64) {
        let publish = self.sync.note_local(is_playing, position, Instant::now());
        if !publish || !self.is_local_sharer() {
            return;
        }
        let Some(mut media) = self.state.shared_media.clone() else {
            return;
        };
        media.playback = Some(PlaybackState {
            is_playing,
            position,
            updated_at: now_millis(),
        });
        self.state.set_local_share(Some(media.clone()));
        if let Err(e) = self
            .mailbox
            .set_shared_media(&self.state.meeting_id, Some(media))
            .await
        {
            warn!("failed to publish playback state: {e}");
        }
    }

    fn apply_remote_playback(&mut self, playback: PlaybackState) {
        if let Some(directive) = self
            .sync
            .apply_remote(&playback, now_millis(), Instant::now())
        {
            debug!(?directive, "applying remote playback update");
            let _ = self.directive_tx.send(directive);
        }
    }

    fn link_list(&self) -> Vec<(ParticipantId, Arc<dyn PeerLink>)> {
        self.sessions
            .iter()
            .map(|(peer, session)| (peer.clone(), session.link()))
            .collect()
    }

    async fn shutdown(&mut self) {
        if self.state.left {
            return;
        }
        info!("leaving meeting {}", self.state.meeting_id);

        let links = self.link_list();
        self.router.stop_all(&links).await;
        if self.is_local_sharer() {
            self.state.set_local_share(None);
            if let Err(e) = self
                .mailbox
                .set_shared_media(&self.state.meeting_id, None)
                .await
            {
                warn!("failed to clear shared media on leave: {e}");
            }
        }
        if let Some(media) = self.router.user_media() {
            media.stop();
        }

        let peers: Vec<ParticipantId> = self.sessions.keys().cloned().collect();
        for peer in peers {
            self.teardown_session(&peer).await;
        }

        let result = if self.state.is_admitted() {
            self.mailbox
                .remove_participant(&self.state.meeting_id, &self.state.local_id)
                .await
        } else {
            self.mailbox
                .remove_waiting(&self.state.meeting_id, &self.state.local_id)
                .await
        };
        if let Err(e) = result {
            warn!("failed to remove own mailbox entry: {e}");
        }

        for task in self.feed_tasks.drain(..) {
            task.abort();
        }
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        self.state.left = true;
    }
}
