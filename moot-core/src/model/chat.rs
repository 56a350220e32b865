use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};

/// Append-only chat entry: `meetings/{meetingId}/chat/{autoId}`.
/// Immutable once created; ordered by `timestamp` ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: ParticipantId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: u64,
}
