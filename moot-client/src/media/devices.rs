use crate::error::MediaError;
use crate::media::{LocalTrack, MediaDevices};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Camera + microphone bundle. The owner stops the tracks on leave; peer
/// links hold references only.
#[derive(Debug, Clone)]
pub struct UserMedia {
    pub video: LocalTrack,
    pub audio: LocalTrack,
}

impl UserMedia {
    pub fn stop(&self) {
        self.video.stop();
        self.audio.stop();
    }
}

/// A screen or playback capture: a video track, optional system audio, and
/// an end-of-capture hook that fires when the platform stops the capture.
#[derive(Debug)]
pub struct Capture {
    pub video: LocalTrack,
    pub audio: Option<LocalTrack>,
    pub ended: Option<oneshot::Receiver<()>>,
}

impl Capture {
    pub fn stop(&self) {
        self.video.stop();
        if let Some(audio) = &self.audio {
            audio.stop();
        }
    }
}

struct SampleDevicesInner {
    screen_supported: bool,
    playback_supported: bool,
    with_capture_audio: bool,
    capture_end: Option<oneshot::Sender<()>>,
}

/// Sample-track device source for native embedders that feed frames
/// themselves, and the device double used by the integration tests.
/// Capability flags make the distinct capture errors reachable.
#[derive(Clone)]
pub struct SampleDevices {
    inner: Arc<Mutex<SampleDevicesInner>>,
}

impl Default for SampleDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleDevices {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SampleDevicesInner {
                screen_supported: true,
                playback_supported: true,
                with_capture_audio: true,
                capture_end: None,
            })),
        }
    }

    pub fn without_screen_capture(self) -> Self {
        self.inner.lock().expect("devices lock").screen_supported = false;
        self
    }

    pub fn without_playback_capture(self) -> Self {
        self.inner.lock().expect("devices lock").playback_supported = false;
        self
    }

    pub fn without_capture_audio(self) -> Self {
        self.inner.lock().expect("devices lock").with_capture_audio = false;
        self
    }

    /// Fire the end-of-capture hook of the most recent display capture, as
    /// the platform does when the user stops sharing from its own UI.
    pub fn end_capture(&self) {
        if let Some(tx) = self.inner.lock().expect("devices lock").capture_end.take() {
            let _ = tx.send(());
        }
    }

    fn capture(&self, label: &str, with_ended: bool) -> Capture {
        let stream_id = format!("{label}-{}", Uuid::new_v4().simple());
        let video = LocalTrack::video_sample(&format!("{label}-video"), &stream_id);
        let mut inner = self.inner.lock().expect("devices lock");
        let audio = inner
            .with_capture_audio
            .then(|| LocalTrack::audio_sample(&format!("{label}-audio"), &stream_id));
        let ended = if with_ended {
            let (tx, rx) = oneshot::channel();
            inner.capture_end = Some(tx);
            Some(rx)
        } else {
            None
        };
        Capture {
            video,
            audio,
            ended,
        }
    }
}

#[async_trait]
impl MediaDevices for SampleDevices {
    async fn user_media(&self) -> Result<UserMedia, MediaError> {
        let stream_id = format!("user-{}", Uuid::new_v4().simple());
        debug!(stream_id, "acquired user media");
        Ok(UserMedia {
            video: LocalTrack::video_sample("camera", &stream_id),
            audio: LocalTrack::audio_sample("microphone", &stream_id),
        })
    }

    async fn display_media(&self) -> Result<Capture, MediaError> {
        if !self.inner.lock().expect("devices lock").screen_supported {
            return Err(MediaError::CaptureUnsupported(
                "screen capture is not available on this platform".to_owned(),
            ));
        }
        Ok(self.capture("screen", true))
    }

    async fn playback_capture(&self, name: &str) -> Result<Capture, MediaError> {
        if !self.inner.lock().expect("devices lock").playback_supported {
            return Err(MediaError::CaptureUnsupported(
                "capturing a playing video is not available on this platform".to_owned(),
            ));
        }
        debug!(name, "captured playback stream");
        Ok(self.capture("playback", false))
    }
}
