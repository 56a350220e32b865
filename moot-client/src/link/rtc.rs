use crate::config::IceConfig;
use crate::error::LinkError;
use crate::link::{LinkEvent, LinkEventKind, LinkFactory, LinkState, PeerLink};
use crate::media::LocalTrack;
use async_trait::async_trait;
use moot_core::model::{
    CandidatePayload, ParticipantId, QualityHint, RemoteStream, SessionDescription, TrackKind,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_remote::TrackRemote;

fn map_state(s: RTCPeerConnectionState) -> LinkState {
    match s {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => LinkState::New,
        RTCPeerConnectionState::Connecting => LinkState::Connecting,
        RTCPeerConnectionState::Connected => LinkState::Connected,
        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
        RTCPeerConnectionState::Failed => LinkState::Failed,
        RTCPeerConnectionState::Closed => LinkState::Closed,
    }
}

/// Peer link over the `webrtc` crate. Callbacks funnel completions into the
/// engine's event channel; the engine never touches the connection from a
/// callback context.
pub struct RtcPeerLink {
    peer_id: ParticipantId,
    pc: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, Arc<RTCRtpSender>>>,
    aux_audio: Mutex<Option<Arc<RTCRtpSender>>>,
    closed: AtomicBool,
}

impl RtcPeerLink {
    pub async fn new(
        peer_id: ParticipantId,
        config: &IceConfig,
        event_tx: mpsc::Sender<LinkEvent>,
    ) -> Result<Self, LinkError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Callbacks must be 'static; each one carries its own clones.
        let state_tx = event_tx.clone();
        let peer_state = peer_id.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let peer = peer_state.clone();
            Box::pin(async move {
                info!("connection state for peer {peer}: {s}");
                let _ = tx
                    .send(LinkEvent::new(peer, LinkEventKind::StateChanged(map_state(s))))
                    .await;
            })
        }));

        let ice_tx = event_tx.clone();
        let peer_ice = peer_id.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let peer = peer_ice.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let payload = CandidatePayload {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx
                    .send(LinkEvent::new(peer, LinkEventKind::LocalCandidate(payload)))
                    .await;
            })
        }));

        let track_tx = event_tx;
        let peer_track = peer_id.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let peer = peer_track.clone();
                Box::pin(async move {
                    let stream = RemoteStream {
                        id: track.stream_id(),
                    };
                    debug!("remote track from peer {peer}: stream {}", stream.id);
                    let _ = tx
                        .send(LinkEvent::new(peer, LinkEventKind::RemoteStream(stream)))
                        .await;
                })
            },
        ));

        Ok(Self {
            peer_id,
            pc,
            senders: Mutex::new(HashMap::new()),
            aux_audio: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerLink for RtcPeerLink {
    async fn create_offer(&self) -> Result<SessionDescription, LinkError> {
        self.ensure_open()?;
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LinkError> {
        self.ensure_open()?;
        let remote = RTCSessionDescription::offer(offer.sdp)?;
        self.pc.set_remote_description(remote).await?;
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn accept_answer(&self, answer: SessionDescription) -> Result<(), LinkError> {
        self.ensure_open()?;
        let remote = RTCSessionDescription::answer(answer.sdp)?;
        self.pc.set_remote_description(remote).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: CandidatePayload) -> Result<(), LinkError> {
        self.ensure_open()?;
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn set_outgoing(&self, kind: TrackKind, track: LocalTrack) -> Result<(), LinkError> {
        self.ensure_open()?;
        let mut senders = self.senders.lock().await;
        if let Some(sender) = senders.get(&kind) {
            sender.replace_track(Some(track.rtc())).await?;
        } else {
            let sender = self.pc.add_track(track.rtc()).await?;
            senders.insert(kind, sender);
        }
        Ok(())
    }

    async fn clear_outgoing(&self, kind: TrackKind) -> Result<(), LinkError> {
        self.ensure_open()?;
        let senders = self.senders.lock().await;
        if let Some(sender) = senders.get(&kind) {
            sender.replace_track(None).await?;
        }
        Ok(())
    }

    async fn add_aux_audio(&self, track: LocalTrack) -> Result<(), LinkError> {
        self.ensure_open()?;
        let mut aux = self.aux_audio.lock().await;
        if aux.is_some() {
            return Ok(());
        }
        let sender = self.pc.add_track(track.rtc()).await?;
        *aux = Some(sender);
        Ok(())
    }

    async fn remove_aux_audio(&self) -> Result<(), LinkError> {
        self.ensure_open()?;
        let sender = self.aux_audio.lock().await.take();
        if let Some(sender) = sender {
            self.pc.remove_track(&sender).await?;
        }
        Ok(())
    }

    async fn request_quality(&self, kind: TrackKind, hint: QualityHint) -> Result<(), LinkError> {
        // webrtc-rs exposes no per-sender encoding rewrite; the hint stays
        // advisory here.
        debug!(
            peer = %self.peer_id,
            %kind,
            max_bitrate = hint.max_bitrate,
            high_priority = hint.high_priority,
            "sender quality hint recorded"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.pc.close().await?;
        Ok(())
    }
}

/// Opens `RtcPeerLink`s with a fixed ICE configuration.
pub struct RtcLinkFactory {
    ice: IceConfig,
}

impl RtcLinkFactory {
    pub fn new(ice: IceConfig) -> Self {
        Self { ice }
    }
}

#[async_trait]
impl LinkFactory for RtcLinkFactory {
    async fn open(
        &self,
        peer: ParticipantId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, LinkError> {
        let link = RtcPeerLink::new(peer, &self.ice, events).await?;
        Ok(Arc::new(link))
    }
}
