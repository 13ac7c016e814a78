//! In-memory storage backend for simulation environments

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use parking_lot::RwLock;
use streamgate_core::{BackendLocator, FetchError, ObjectBody, StorageBackend};
use tracing::trace;

/// Misbehavior injected for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    /// Opening fails as if the backend were unreachable
    Unavailable,
    /// The download errors once this many bytes have been delivered, unless
    /// the object ends first
    InterruptAfter(u64),
    /// Opening succeeds but no byte ever arrives
    Stall,
}

/// Counts live download bodies; one per open stream.
struct LiveBody(Arc<AtomicUsize>);

impl LiveBody {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for LiveBody {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct PieceState {
    data: Bytes,
    offset: usize,
    piece_size: usize,
    piece_delay: Option<Duration>,
    interrupt_at: Option<u64>,
    interrupted: bool,
    _live: LiveBody,
}

/// Storage backend holding whole objects in memory.
pub struct InMemoryBackend {
    objects: RwLock<HashMap<BackendLocator, Bytes>>,
    faults: RwLock<HashMap<BackendLocator, SimulatedFault>>,
    piece_size: usize,
    piece_delay: Option<Duration>,
    open_calls: AtomicUsize,
    live_bodies: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    /// Default size of the pieces a download is delivered in.
    pub const DEFAULT_PIECE_SIZE: usize = 64 * 1024;

    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            faults: RwLock::new(HashMap::new()),
            piece_size: Self::DEFAULT_PIECE_SIZE,
            piece_delay: None,
            open_calls: AtomicUsize::new(0),
            live_bodies: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delivers downloads in pieces of `piece_size` bytes (at least one).
    pub fn with_piece_size(mut self, piece_size: usize) -> Self {
        self.piece_size = piece_size.max(1);
        self
    }

    /// Waits `delay` before each piece, approximating a slow network.
    pub fn with_piece_delay(mut self, delay: Duration) -> Self {
        self.piece_delay = Some(delay);
        self
    }

    /// Stores `data` under `locator`, replacing any previous object.
    pub fn insert(&self, locator: &str, data: impl Into<Bytes>) {
        self.objects
            .write()
            .insert(BackendLocator::from(locator), data.into());
    }

    /// Deletes the object, as if the storage channel message were removed.
    pub fn remove(&self, locator: &str) -> bool {
        self.objects
            .write()
            .remove(&BackendLocator::from(locator))
            .is_some()
    }

    pub fn set_fault(&self, locator: &str, fault: SimulatedFault) {
        self.faults
            .write()
            .insert(BackendLocator::from(locator), fault);
    }

    pub fn clear_fault(&self, locator: &str) {
        self.faults.write().remove(&BackendLocator::from(locator));
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Number of `open_object` calls so far.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of download bodies that have not been dropped yet.
    pub fn live_bodies(&self) -> usize {
        self.live_bodies.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn open_object(&self, locator: &BackendLocator) -> Result<ObjectBody, FetchError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.faults.read().get(locator).copied();

        if fault == Some(SimulatedFault::Unavailable) {
            return Err(FetchError::BackendUnavailable {
                reason: format!("simulated outage opening {locator}"),
            });
        }

        let data = self
            .objects
            .read()
            .get(locator)
            .cloned()
            .ok_or_else(|| FetchError::ObjectNotFound {
                locator: locator.clone(),
            })?;
        let declared_len = Some(data.len() as u64);
        let live = LiveBody::new(&self.live_bodies);

        if fault == Some(SimulatedFault::Stall) {
            trace!(%locator, "Opened stalled object");
            let stalled = stream::unfold(live, |live| async move {
                std::future::pending::<()>().await;
                Some((Ok::<Bytes, FetchError>(Bytes::new()), live))
            })
            .boxed();
            return Ok(ObjectBody::new(declared_len, stalled));
        }

        let interrupt_at = match fault {
            Some(SimulatedFault::InterruptAfter(limit)) => Some(limit),
            _ => None,
        };

        let state = PieceState {
            data,
            offset: 0,
            piece_size: self.piece_size,
            piece_delay: self.piece_delay,
            interrupt_at,
            interrupted: false,
            _live: live,
        };

        let pieces = stream::unfold(state, |mut state| async move {
            if let Some(delay) = state.piece_delay {
                tokio::time::sleep(delay).await;
            }

            if state.interrupted || state.offset >= state.data.len() {
                return None;
            }

            if let Some(limit) = state.interrupt_at
                && state.offset as u64 >= limit
            {
                state.interrupted = true;
                return Some((
                    Err(FetchError::FetchInterrupted {
                        reason: format!("simulated interruption after {limit} bytes"),
                    }),
                    state,
                ));
            }

            let mut end = (state.offset + state.piece_size).min(state.data.len());
            if let Some(limit) = state.interrupt_at {
                end = end.min(limit as usize);
            }
            let piece = state.data.slice(state.offset..end);
            state.offset = end;
            Some((Ok(piece), state))
        })
        .boxed();

        trace!(%locator, len = ?declared_len, "Opened in-memory object");
        Ok(ObjectBody::new(declared_len, pieces))
    }

    fn backend_type(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(body: ObjectBody) -> (Vec<u8>, Option<FetchError>) {
        let mut stream = body.stream;
        let mut bytes = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(piece) => bytes.extend_from_slice(&piece),
                Err(e) => return (bytes, Some(e)),
            }
        }
        (bytes, None)
    }

    #[tokio::test]
    async fn test_whole_object_in_pieces() {
        let backend = InMemoryBackend::new().with_piece_size(3);
        backend.insert("a", b"0123456789".to_vec());

        let body = backend.open_object(&BackendLocator::from("a")).await.unwrap();
        assert_eq!(body.declared_len, Some(10));

        let mut stream = body.stream;
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"012");
        assert_eq!(backend.live_bodies(), 1);
        drop(stream);
        assert_eq!(backend.live_bodies(), 0);
        assert_eq!(backend.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let backend = InMemoryBackend::new();
        let result = backend.open_object(&BackendLocator::from("gone")).await;
        assert!(matches!(result, Err(FetchError::ObjectNotFound { .. })));
        assert_eq!(backend.live_bodies(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_after() {
        let backend = InMemoryBackend::new().with_piece_size(4);
        backend.insert("a", vec![7u8; 20]);
        backend.set_fault("a", SimulatedFault::InterruptAfter(10));

        let body = backend.open_object(&BackendLocator::from("a")).await.unwrap();
        let (bytes, error) = collect(body).await;
        assert_eq!(bytes.len(), 10);
        assert!(matches!(error, Some(FetchError::FetchInterrupted { .. })));
    }

    #[tokio::test]
    async fn test_interrupt_at_or_past_end_delivers_everything() {
        let backend = InMemoryBackend::new().with_piece_size(4);
        backend.insert("exact", vec![7u8; 20]);
        backend.insert("past", vec![9u8; 20]);
        backend.set_fault("exact", SimulatedFault::InterruptAfter(20));
        backend.set_fault("past", SimulatedFault::InterruptAfter(30));

        for locator in ["exact", "past"] {
            let body = backend.open_object(&BackendLocator::from(locator)).await.unwrap();
            let (bytes, error) = collect(body).await;
            assert_eq!(bytes.len(), 20, "{locator}");
            assert!(error.is_none(), "{locator}: {error:?}");
        }
    }

    #[tokio::test]
    async fn test_unavailable_and_clear() {
        let backend = InMemoryBackend::new();
        backend.insert("a", b"abc".to_vec());
        backend.set_fault("a", SimulatedFault::Unavailable);
        assert!(matches!(
            backend.open_object(&BackendLocator::from("a")).await,
            Err(FetchError::BackendUnavailable { .. })
        ));

        backend.clear_fault("a");
        let body = backend.open_object(&BackendLocator::from("a")).await.unwrap();
        assert_eq!(collect(body).await.0, b"abc");
    }

    #[tokio::test]
    async fn test_stall_holds_body_until_dropped() {
        let backend = InMemoryBackend::new();
        backend.insert("a", b"abc".to_vec());
        backend.set_fault("a", SimulatedFault::Stall);

        let mut body = backend.open_object(&BackendLocator::from("a")).await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(20), body.stream.next()).await;
        assert!(next.is_err());
        assert_eq!(backend.live_bodies(), 1);

        drop(body);
        assert_eq!(backend.live_bodies(), 0);
    }
}
