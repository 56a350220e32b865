use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque participant identifier. Ordering is lexicographic over the raw
/// string; negotiation role assignment depends on it.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Fresh random identifier. Uniqueness is an enforced precondition of
    /// the deterministic initiator/responder tie-break.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roster entry as stored in the mailbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDoc {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
}

/// Handle to an inbound media stream delivered by a peer link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

/// Aggregated view of one admitted participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
    pub is_mic_muted: bool,
    pub is_camera_off: bool,
    /// Populated and cleared by the negotiation session for this peer.
    pub stream: Option<RemoteStream>,
}

impl Participant {
    pub fn from_doc(doc: ParticipantDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            is_host: doc.is_host,
            is_mic_muted: false,
            is_camera_off: false,
            stream: None,
        }
    }
}

/// Entry in the waiting room, created on join request and destroyed on
/// admission or denial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaitingParticipant {
    pub id: ParticipantId,
    pub name: String,
    pub timestamp: u64,
}
