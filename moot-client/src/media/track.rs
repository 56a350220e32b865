use moot_core::model::TrackKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// A local media track: tagged kind, stable identity, an enabled flag, and
/// the transport-level track handle shared by reference across every peer
/// link. Links borrow the handle; only the acquiring component may stop it.
#[derive(Clone)]
pub struct LocalTrack {
    kind: TrackKind,
    id: String,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    rtc: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, id: &str, rtc: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self {
            kind,
            id: id.to_owned(),
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
            rtc,
        }
    }

    /// VP8 sample-fed video track. `stream_id` groups tracks into one
    /// remote stream.
    pub fn video_sample(id: &str, stream_id: &str) -> Self {
        let rtc = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            id.to_owned(),
            stream_id.to_owned(),
        ));
        Self::new(TrackKind::Video, id, rtc)
    }

    /// Opus sample-fed audio track.
    pub fn audio_sample(id: &str, stream_id: &str) -> Self {
        let rtc = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            id.to_owned(),
            stream_id.to_owned(),
        ));
        Self::new(TrackKind::Audio, id, rtc)
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rtc(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtc.clone()
    }

    /// Mute/unmute gate observed by whichever component feeds the track.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Permanently stop the track. Reserved for the owner; peer links only
    /// drop their references.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
