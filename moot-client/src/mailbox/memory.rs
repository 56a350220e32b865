use crate::error::MailboxError;
use crate::mailbox::{CandidateAdded, Mailbox};
use crate::time::now_millis;
use async_trait::async_trait;
use dashmap::DashMap;
use moot_core::model::{
    CandidateDoc, ChatMessage, ConnectionDoc, MeetingDoc, MeetingId, ParticipantDoc,
    ParticipantId, SessionDescription, SharedMedia, WaitingParticipant,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;
use uuid::Uuid;

const SNAPSHOT_BUFFER: usize = 64;

struct StoreInner {
    meeting: MeetingDoc,
    participants: BTreeMap<ParticipantId, ParticipantDoc>,
    waiting: BTreeMap<ParticipantId, WaitingParticipant>,
    connections: HashMap<String, ConnectionDoc>,
    candidates: HashMap<String, Vec<(String, CandidateDoc)>>,
    chat: Vec<ChatMessage>,
}

/// One meeting's documents plus the broadcast fan-out for its subscribers.
/// Mutations publish while holding the lock so every subscriber observes
/// snapshots in write order.
struct MeetingStore {
    inner: Mutex<StoreInner>,
    roster_tx: broadcast::Sender<Vec<ParticipantDoc>>,
    waiting_tx: broadcast::Sender<Vec<WaitingParticipant>>,
    meeting_tx: broadcast::Sender<MeetingDoc>,
    chat_tx: broadcast::Sender<Vec<ChatMessage>>,
    connection_tx: broadcast::Sender<(String, ConnectionDoc)>,
    candidate_tx: broadcast::Sender<(String, CandidateAdded)>,
}

impl MeetingStore {
    fn new(meeting: MeetingDoc) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                meeting,
                participants: BTreeMap::new(),
                waiting: BTreeMap::new(),
                connections: HashMap::new(),
                candidates: HashMap::new(),
                chat: Vec::new(),
            }),
            roster_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
            waiting_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
            meeting_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
            chat_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
            connection_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
            candidate_tx: broadcast::channel(SNAPSHOT_BUFFER).0,
        }
    }
}

/// Process-local document store implementing the full mailbox layout.
/// Several engines sharing one `MemoryMailbox` form a complete in-process
/// meeting, which is how the integration tests drive full negotiations.
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    meetings: Arc<DashMap<MeetingId, Arc<MeetingStore>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, meeting: &MeetingId) -> Result<Arc<MeetingStore>, MailboxError> {
        self.meetings
            .get(meeting)
            .map(|e| e.value().clone())
            .ok_or_else(|| MailboxError::MeetingNotFound(meeting.to_string()))
    }

    /// Subscribe-then-snapshot under the store lock, then forward snapshots
    /// into a plain mpsc stream. A lagged broadcast receiver just skips to
    /// the next snapshot, which is still authoritative.
    fn forward<T: Clone + Send + 'static>(
        initial: T,
        mut sub: broadcast::Receiver<T>,
    ) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        tokio::spawn(async move {
            if tx.send(initial).await.is_err() {
                return;
            }
            loop {
                match sub.recv().await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        rx
    }

    fn closed_stream<T: Send + 'static>() -> mpsc::Receiver<T> {
        mpsc::channel(1).1
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn create_meeting(
        &self,
        meeting: &MeetingId,
        host: ParticipantDoc,
    ) -> Result<(), MailboxError> {
        let doc = MeetingDoc {
            host_id: host.id.clone(),
            created_at: now_millis(),
            shared_media: None,
        };
        let store = Arc::new(MeetingStore::new(doc));
        {
            let mut inner = store.inner.lock().expect("mailbox lock");
            inner.participants.insert(host.id.clone(), host);
        }
        self.meetings.insert(meeting.clone(), store);
        Ok(())
    }

    async fn meeting_exists(&self, meeting: &MeetingId) -> Result<bool, MailboxError> {
        Ok(self.meetings.contains_key(meeting))
    }

    async fn put_participant(
        &self,
        meeting: &MeetingId,
        doc: ParticipantDoc,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        inner.participants.insert(doc.id.clone(), doc);
        let _ = store
            .roster_tx
            .send(inner.participants.values().cloned().collect());
        Ok(())
    }

    async fn remove_participant(
        &self,
        meeting: &MeetingId,
        id: &ParticipantId,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        if inner.participants.remove(id).is_some() {
            let _ = store
                .roster_tx
                .send(inner.participants.values().cloned().collect());
        }
        Ok(())
    }

    async fn put_waiting(
        &self,
        meeting: &MeetingId,
        doc: WaitingParticipant,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        inner.waiting.insert(doc.id.clone(), doc);
        let _ = store
            .waiting_tx
            .send(inner.waiting.values().cloned().collect());
        Ok(())
    }

    async fn remove_waiting(
        &self,
        meeting: &MeetingId,
        id: &ParticipantId,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        if inner.waiting.remove(id).is_some() {
            let _ = store
                .waiting_tx
                .send(inner.waiting.values().cloned().collect());
        }
        Ok(())
    }

    async fn set_shared_media(
        &self,
        meeting: &MeetingId,
        media: Option<SharedMedia>,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        inner.meeting.shared_media = media;
        let _ = store.meeting_tx.send(inner.meeting.clone());
        Ok(())
    }

    async fn ensure_connection(
        &self,
        meeting: &MeetingId,
        pair: &str,
        participants: [ParticipantId; 2],
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        if !inner.connections.contains_key(pair) {
            let doc = ConnectionDoc {
                participants: participants.to_vec(),
                created_at: now_millis(),
                ..ConnectionDoc::default()
            };
            inner.connections.insert(pair.to_owned(), doc.clone());
            let _ = store.connection_tx.send((pair.to_owned(), doc));
        }
        Ok(())
    }

    async fn write_offer(
        &self,
        meeting: &MeetingId,
        pair: &str,
        offer: SessionDescription,
        by: ParticipantId,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        let doc = inner.connections.entry(pair.to_owned()).or_default();
        doc.offer = Some(offer);
        doc.offer_by = Some(by);
        let doc = doc.clone();
        let _ = store.connection_tx.send((pair.to_owned(), doc));
        Ok(())
    }

    async fn write_answer(
        &self,
        meeting: &MeetingId,
        pair: &str,
        answer: SessionDescription,
        by: ParticipantId,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        let doc = inner.connections.entry(pair.to_owned()).or_default();
        doc.answer = Some(answer);
        doc.answer_by = Some(by);
        doc.answered_at = Some(now_millis());
        let doc = doc.clone();
        let _ = store.connection_tx.send((pair.to_owned(), doc));
        Ok(())
    }

    async fn add_candidate(
        &self,
        meeting: &MeetingId,
        pair: &str,
        doc: CandidateDoc,
    ) -> Result<String, MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        let id = Uuid::new_v4().to_string();
        inner
            .candidates
            .entry(pair.to_owned())
            .or_default()
            .push((id.clone(), doc.clone()));
        let _ = store.candidate_tx.send((
            pair.to_owned(),
            CandidateAdded {
                id: id.clone(),
                doc,
            },
        ));
        Ok(id)
    }

    async fn append_chat(
        &self,
        meeting: &MeetingId,
        message: ChatMessage,
    ) -> Result<(), MailboxError> {
        let store = self.store(meeting)?;
        let mut inner = store.inner.lock().expect("mailbox lock");
        inner.chat.push(message);
        inner.chat.sort_by_key(|m| m.timestamp);
        let _ = store.chat_tx.send(inner.chat.clone());
        Ok(())
    }

    fn watch_roster(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<ParticipantDoc>> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, "watch_roster on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let sub = store.roster_tx.subscribe();
        Self::forward(inner.participants.values().cloned().collect(), sub)
    }

    fn watch_waiting(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<WaitingParticipant>> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, "watch_waiting on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let sub = store.waiting_tx.subscribe();
        Self::forward(inner.waiting.values().cloned().collect(), sub)
    }

    fn watch_meeting(&self, meeting: &MeetingId) -> mpsc::Receiver<MeetingDoc> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, "watch_meeting on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let sub = store.meeting_tx.subscribe();
        Self::forward(inner.meeting.clone(), sub)
    }

    fn watch_chat(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<ChatMessage>> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, "watch_chat on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let sub = store.chat_tx.subscribe();
        Self::forward(inner.chat.clone(), sub)
    }

    fn watch_connection(&self, meeting: &MeetingId, pair: &str) -> mpsc::Receiver<ConnectionDoc> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, pair, "watch_connection on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let mut sub = store.connection_tx.subscribe();
        let initial = inner.connections.get(pair).cloned();
        drop(inner);

        let pair = pair.to_owned();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        tokio::spawn(async move {
            if let Some(doc) = initial {
                if tx.send(doc).await.is_err() {
                    return;
                }
            }
            loop {
                match sub.recv().await {
                    Ok((key, doc)) if key == pair => {
                        if tx.send(doc).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        rx
    }

    fn watch_candidates(&self, meeting: &MeetingId, pair: &str) -> mpsc::Receiver<CandidateAdded> {
        let Ok(store) = self.store(meeting) else {
            warn!(%meeting, pair, "watch_candidates on unknown meeting");
            return Self::closed_stream();
        };
        let inner = store.inner.lock().expect("mailbox lock");
        let mut sub = store.candidate_tx.subscribe();
        let backlog: Vec<CandidateAdded> = inner
            .candidates
            .get(pair)
            .map(|v| {
                v.iter()
                    .map(|(id, doc)| CandidateAdded {
                        id: id.clone(),
                        doc: doc.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        drop(inner);

        let pair = pair.to_owned();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        tokio::spawn(async move {
            for added in backlog {
                if tx.send(added).await.is_err() {
                    return;
                }
            }
            loop {
                match sub.recv().await {
                    Ok((key, added)) if key == pair => {
                        if tx.send(added).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => continue,
                    // Candidate events are not snapshots; a lagged receiver
                    // has lost candidates, but the session-level dedup set
                    // keeps the replayed backlog harmless on resubscribe.
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(pair, missed = n, "candidate subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        rx
    }
}
