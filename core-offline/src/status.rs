//! # Download Status Store
//!
//! In-memory `ChapterKey -> DownloadState` map shared by every download task
//! and every UI reader, plus a broadcast channel of changes.
//!
//! A missing entry means `Idle`. Each update is one locked assignment and the
//! matching broadcast happens under the same lock, so subscribers observe
//! updates for a chapter in the order they were applied.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, Receiver};

use crate::models::{ChapterKey, DownloadState};

/// One state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub key: ChapterKey,
    pub state: DownloadState,
}

pub struct DownloadStatusStore {
    states: Mutex<HashMap<ChapterKey, DownloadState>>,
    sender: broadcast::Sender<StatusUpdate>,
}

impl DownloadStatusStore {
    /// `capacity` is the per-subscriber buffer; slower subscribers get
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            states: Mutex::new(HashMap::new()),
            sender,
        }
    }

    pub fn set(&self, key: &ChapterKey, state: DownloadState) {
        let mut states = self.states.lock();
        if state.is_idle() {
            states.remove(key);
        } else {
            states.insert(key.clone(), state);
        }

        // No subscribers is fine
        let _ = self.sender.send(StatusUpdate {
            key: key.clone(),
            state,
        });
    }

    pub fn get(&self, key: &ChapterKey) -> DownloadState {
        self.states.lock().get(key).copied().unwrap_or_default()
    }

    /// Copy of every non-idle state.
    pub fn snapshot(&self) -> HashMap<ChapterKey, DownloadState> {
        self.states.lock().clone()
    }

    pub fn keys(&self) -> Vec<ChapterKey> {
        self.states.lock().keys().cloned().collect()
    }

    pub fn subscribe(&self) -> StatusStream {
        StatusStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for DownloadStatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadStatusStore")
            .field("tracked", &self.states.lock().len())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type UpdateFilter = Box<dyn Fn(&StatusUpdate) -> bool + Send + Sync>;

/// Receiver of [`StatusUpdate`]s with an optional filter.
pub struct StatusStream {
    receiver: Receiver<StatusUpdate>,
    filter: Option<UpdateFilter>,
}

impl StatusStream {
    pub fn new(receiver: Receiver<StatusUpdate>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StatusUpdate) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only updates for `key`.
    pub fn for_chapter(self, key: ChapterKey) -> Self {
        self.filter(move |update| update.key == key)
    }

    fn accepts(&self, update: &StatusUpdate) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(update))
    }

    pub async fn recv(&mut self) -> Result<StatusUpdate, RecvError> {
        loop {
            let update = self.receiver.recv().await?;
            if self.accepts(&update) {
                return Ok(update);
            }
        }
    }

    /// `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<StatusUpdate, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => {
                    if self.accepts(&update) {
                        return Some(Ok(update));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for StatusStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
