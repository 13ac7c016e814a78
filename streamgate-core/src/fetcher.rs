//! Chunked fetching of byte windows from whole-object backends
//!
//! The backend can only hand over complete objects, so each request window
//! costs exactly one backend download: bytes before the window are discarded
//! as they arrive, window bytes are re-sliced into chunks of at most
//! `chunk_size`, and the download is dropped the moment the window is
//! complete. The object is never re-requested per chunk.
//!
//! Sources are request-scoped. Two concurrent requests for the same file
//! open two independent downloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::debug;

use crate::backend::{FetchError, ObjectStream, StorageBackend};
use crate::config::StreamingConfig;
use crate::metadata::BackendLocator;
use crate::range::ByteWindow;

/// Stream of window chunks handed to the HTTP layer.
pub type ChunkStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Live count of open backend transfers.
///
/// Every [`ObjectSource`] holds one slot until its transfer is finished,
/// fails, or is dropped. A count that keeps growing means transfers are
/// outliving their requests.
#[derive(Debug, Clone, Default)]
pub struct ActiveFetches {
    count: Arc<AtomicUsize>,
}

impl ActiveFetches {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transfers currently open.
    pub fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn acquire(&self) -> FetchGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        FetchGuard {
            count: self.count.clone(),
        }
    }
}

/// Slot in [`ActiveFetches`], released on drop.
#[derive(Debug)]
struct FetchGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An in-progress backend download together with its accounting slot.
struct Transfer {
    body: ObjectStream,
    _guard: FetchGuard,
}

/// Produces byte windows of backend objects as lazy chunk sequences.
#[derive(Clone)]
pub struct ChunkedFetcher {
    backend: Arc<dyn StorageBackend>,
    chunk_size: usize,
    open_timeout: Duration,
    active: ActiveFetches,
}

impl ChunkedFetcher {
    /// Creates a fetcher over `backend` using the streaming settings.
    ///
    /// A zero chunk size is raised to one byte.
    pub fn new(backend: Arc<dyn StorageBackend>, config: &StreamingConfig) -> Self {
        Self {
            backend,
            chunk_size: config.chunk_size.max(1),
            open_timeout: config.backend_timeout,
            active: ActiveFetches::new(),
        }
    }

    /// Counter of transfers opened through this fetcher and its clones.
    pub fn active_fetches(&self) -> &ActiveFetches {
        &self.active
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Opens the object behind `locator`, costing one backend round trip.
    ///
    /// # Errors
    /// - `FetchError::BackendUnavailable` - Transport or auth failure
    /// - `FetchError::ObjectNotFound` - Locator no longer resolves
    pub async fn open(&self, locator: &BackendLocator) -> Result<ObjectSource, FetchError> {
        let body = self.backend.open_object(locator).await?;
        debug!(
            %locator,
            backend = self.backend.backend_type(),
            declared_len = ?body.declared_len,
            "Opened backend object"
        );

        Ok(ObjectSource {
            locator: locator.clone(),
            declared_len: body.declared_len,
            chunk_size: self.chunk_size,
            transfer: Transfer {
                body: body.stream,
                _guard: self.active.acquire(),
            },
        })
    }

    /// Opens `locator` and pulls the first chunk of `window`.
    ///
    /// Both steps together are bounded by the configured backend timeout, so
    /// a caller that has not committed response headers yet can still turn
    /// any failure into a clean error status.
    ///
    /// # Errors
    /// - `FetchError::TimedOut` - Open plus first chunk exceeded the bound
    /// - `FetchError::BackendUnavailable` - Transport or auth failure
    /// - `FetchError::ObjectNotFound` - Locator no longer resolves
    /// - `FetchError::FetchInterrupted` - Object ended before the window
    pub async fn fetch_window(
        &self,
        locator: &BackendLocator,
        window: ByteWindow,
    ) -> Result<PrimedWindow, FetchError> {
        let prime = async {
            let mut reader = self.open(locator).await?.read(window);
            match reader.next_chunk().await {
                Some(Ok(first)) => Ok(PrimedWindow {
                    first,
                    rest: reader,
                }),
                Some(Err(e)) => Err(e),
                None => Err(FetchError::FetchInterrupted {
                    reason: format!("object {locator} produced no bytes for window {window}"),
                }),
            }
        };

        tokio::time::timeout(self.open_timeout, prime)
            .await
            .map_err(|_| FetchError::TimedOut {
                limit: self.open_timeout,
            })?
    }
}

/// A backend object opened for one request.
///
/// Consumed by [`ObjectSource::read`]; a different window needs a new
/// source and therefore a new download.
pub struct ObjectSource {
    locator: BackendLocator,
    declared_len: Option<u64>,
    chunk_size: usize,
    transfer: Transfer,
}

impl ObjectSource {
    /// Turns the source into a reader of exactly `window`.
    pub fn read(self, window: ByteWindow) -> WindowReader {
        WindowReader {
            locator: self.locator,
            declared_len: self.declared_len,
            window,
            chunk_size: self.chunk_size,
            consumed: 0,
            pending: Bytes::new(),
            remaining: window.len(),
            transfer: Some(self.transfer),
        }
    }
}

/// Lazy, finite sequence of chunks covering one byte window.
pub struct WindowReader {
    locator: BackendLocator,
    declared_len: Option<u64>,
    window: ByteWindow,
    chunk_size: usize,
    /// Object bytes received from the backend so far
    consumed: u64,
    /// Window bytes received but not yet handed out
    pending: Bytes,
    /// Window bytes not yet handed out
    remaining: u64,
    transfer: Option<Transfer>,
}

impl WindowReader {
    pub fn window(&self) -> ByteWindow {
        self.window
    }

    /// Window bytes not yet returned by [`WindowReader::next_chunk`].
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns the next chunk, or `None` once the window is complete.
    ///
    /// After an error the reader is exhausted and only returns `None`.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, FetchError>> {
        if let Some(declared) = self.declared_len
            && self.window.end() >= declared
            && self.transfer.is_some()
        {
            self.release();
            return Some(Err(FetchError::FetchInterrupted {
                reason: format!(
                    "object {} is {declared} bytes, window {} is out of reach",
                    self.locator, self.window
                ),
            }));
        }

        loop {
            if self.remaining == 0 {
                self.release();
                return None;
            }

            if !self.pending.is_empty() {
                let take = self.pending.len().min(self.chunk_size);
                let chunk = self.pending.split_to(take);
                self.remaining -= take as u64;
                if self.remaining == 0 {
                    self.release();
                }
                return Some(Ok(chunk));
            }

            let next = match self.transfer.as_mut() {
                Some(transfer) => transfer.body.next().await,
                None => return None,
            };

            match next {
                Some(Ok(piece)) => self.accept(piece),
                Some(Err(e)) => {
                    self.release();
                    return Some(Err(e));
                }
                None => {
                    self.release();
                    return Some(Err(FetchError::FetchInterrupted {
                        reason: format!(
                            "object {} ended after {} bytes, {} bytes short of window {}",
                            self.locator, self.consumed, self.remaining, self.window
                        ),
                    }));
                }
            }
        }
    }

    /// Converts the reader into a boxed stream for an HTTP body.
    pub fn into_stream(self) -> ChunkStream {
        stream::unfold(self, |mut reader| async move {
            reader.next_chunk().await.map(|chunk| (chunk, reader))
        })
        .boxed()
    }

    /// Keeps the part of a backend piece that falls inside the window.
    fn accept(&mut self, mut piece: Bytes) {
        let piece_start = self.consumed;
        self.consumed += piece.len() as u64;

        if self.consumed <= self.window.start() {
            return;
        }
        if piece_start < self.window.start() {
            // Lossless: the skipped prefix is shorter than this piece
            piece.advance((self.window.start() - piece_start) as usize);
        }

        let wanted = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        piece.truncate(wanted);
        self.pending = piece;
    }

    fn release(&mut self) {
        if self.transfer.take().is_some() {
            debug!(
                locator = %self.locator,
                window = %self.window,
                received = self.consumed,
                "Released backend transfer"
            );
        }
    }
}

impl Drop for WindowReader {
    fn drop(&mut self) {
        if self.transfer.is_some() && self.remaining > 0 {
            debug!(
                locator = %self.locator,
                window = %self.window,
                remaining = self.remaining,
                "Window reader dropped before completion"
            );
        }
    }
}

/// A window whose source is open and whose first chunk has arrived.
pub struct PrimedWindow {
    first: Bytes,
    rest: WindowReader,
}

impl PrimedWindow {
    pub fn first_chunk(&self) -> &Bytes {
        &self.first
    }

    pub fn window(&self) -> ByteWindow {
        self.rest.window()
    }

    /// Chains the first chunk with the remainder of the window.
    pub fn into_stream(self) -> ChunkStream {
        stream::iter([Ok::<Bytes, FetchError>(self.first)])
            .chain(self.rest.into_stream())
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU64;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::ObjectBody;

    /// What the mock does when an object is opened
    #[derive(Clone)]
    enum MockObject {
        Data(Bytes),
        /// Serves the first `n` bytes then fails
        FailAfter(Bytes, usize),
        /// Announces a length but never answers
        Stall,
    }

    struct MockBackend {
        objects: HashMap<BackendLocator, MockObject>,
        piece_size: usize,
        opens: AtomicU64,
    }

    impl MockBackend {
        fn new(piece_size: usize) -> Self {
            Self {
                objects: HashMap::new(),
                piece_size,
                opens: AtomicU64::new(0),
            }
        }

        fn with(mut self, locator: &str, object: MockObject) -> Self {
            self.objects.insert(BackendLocator::from(locator), object);
            self
        }
    }

    #[async_trait]
    impl StorageBackend for MockBackend {
        async fn open_object(&self, locator: &BackendLocator) -> Result<ObjectBody, FetchError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let object = self
                .objects
                .get(locator)
                .cloned()
                .ok_or_else(|| FetchError::ObjectNotFound {
                    locator: locator.clone(),
                })?;

            let piece_size = self.piece_size;
            let split = |data: Bytes| -> Vec<Result<Bytes, FetchError>> {
                data.chunks(piece_size)
                    .map(|piece| Ok(Bytes::copy_from_slice(piece)))
                    .collect()
            };

            match object {
                MockObject::Data(data) => Ok(ObjectBody::new(
                    Some(data.len() as u64),
                    stream::iter(split(data)).boxed(),
                )),
                MockObject::FailAfter(data, n) => {
                    let mut pieces = split(data.slice(..n));
                    pieces.push(Err(FetchError::FetchInterrupted {
                        reason: "connection reset".to_string(),
                    }));
                    Ok(ObjectBody::new(None, stream::iter(pieces).boxed()))
                }
                MockObject::Stall => {
                    std::future::pending::<()>().await;
                    unreachable!("pending never resolves")
                }
            }
        }

        fn backend_type(&self) -> &'static str {
            "mock"
        }
    }

    fn sample(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    fn config(chunk_size: usize) -> StreamingConfig {
        StreamingConfig {
            chunk_size,
            backend_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    async fn collect(reader: WindowReader) -> (Vec<Bytes>, Option<FetchError>) {
        let mut chunks = Vec::new();
        let mut stream = reader.into_stream();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => return (chunks, Some(e)),
            }
        }
        (chunks, None)
    }

    #[tokio::test]
    async fn test_window_spanning_pieces() {
        let data = sample(10_000);
        let backend = Arc::new(MockBackend::new(3000).with("obj", MockObject::Data(data.clone())));
        let fetcher = ChunkedFetcher::new(backend.clone(), &config(1024));

        let window = ByteWindow::new(2500, 7499).unwrap();
        let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
        let (chunks, error) = collect(source.read(window)).await;

        assert!(error.is_none());
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 1024));
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(joined.len(), 5000);
        assert_eq!(&joined[..], &data[2500..7500]);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_object_window() {
        let data = sample(4096);
        let backend = Arc::new(MockBackend::new(4096).with("obj", MockObject::Data(data.clone())));
        let fetcher = ChunkedFetcher::new(backend, &config(8192));

        let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
        let (chunks, error) = collect(source.read(ByteWindow::full(4096).unwrap())).await;

        assert!(error.is_none());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], data);
    }

    #[tokio::test]
    async fn test_last_byte_window() {
        let data = sample(100);
        let backend = Arc::new(MockBackend::new(7).with("obj", MockObject::Data(data.clone())));
        let fetcher = ChunkedFetcher::new(backend, &config(8));

        let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
        let (chunks, error) = collect(source.read(ByteWindow::new(99, 99).unwrap())).await;

        assert!(error.is_none());
        assert_eq!(chunks, vec![data.slice(99..100)]);
    }

    #[tokio::test]
    async fn test_unknown_locator() {
        let fetcher = ChunkedFetcher::new(Arc::new(MockBackend::new(16)), &config(8));
        let result = fetcher.open(&BackendLocator::from("gone")).await;
        assert!(matches!(result, Err(FetchError::ObjectNotFound { .. })));
        assert_eq!(fetcher.active_fetches().current(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_mid_window() {
        let data = sample(1000);
        let backend =
            Arc::new(MockBackend::new(100).with("obj", MockObject::FailAfter(data.clone(), 300)));
        let fetcher = ChunkedFetcher::new(backend, &config(64));

        let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
        let (chunks, error) = collect(source.read(ByteWindow::new(0, 999).unwrap())).await;

        let delivered: usize = chunks.iter().map(Bytes::len).sum();
        assert_eq!(delivered, 300);
        assert!(matches!(error, Some(FetchError::FetchInterrupted { .. })));
        assert_eq!(fetcher.active_fetches().current(), 0);
    }

    #[tokio::test]
    async fn test_object_shorter_than_declared_window() {
        let data = sample(50);
        let backend = Arc::new(MockBackend::new(10).with("obj", MockObject::Data(data)));
        let fetcher = ChunkedFetcher::new(backend, &config(16));

        let result = fetcher
            .fetch_window(&BackendLocator::from("obj"), ByteWindow::new(0, 99).unwrap())
            .await;
        assert!(matches!(result, Err(FetchError::FetchInterrupted { .. })));
        assert_eq!(fetcher.active_fetches().current(), 0);
    }

    #[tokio::test]
    async fn test_primed_window_stream() {
        let data = sample(5000);
        let backend = Arc::new(MockBackend::new(999).with("obj", MockObject::Data(data.clone())));
        let fetcher = ChunkedFetcher::new(backend, &config(512));

        let window = ByteWindow::new(100, 4099).unwrap();
        let primed = fetcher
            .fetch_window(&BackendLocator::from("obj"), window)
            .await
            .unwrap();
        assert_eq!(primed.first_chunk().len(), 512);
        assert_eq!(primed.window(), window);
        assert_eq!(fetcher.active_fetches().current(), 1);

        let joined: Vec<u8> = primed
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(&joined[..], &data[100..4100]);
        assert_eq!(fetcher.active_fetches().current(), 0);
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let backend = Arc::new(MockBackend::new(16).with("obj", MockObject::Stall));
        let fetcher = ChunkedFetcher::new(backend, &config(16));

        let result = fetcher
            .fetch_window(&BackendLocator::from("obj"), ByteWindow::new(0, 9).unwrap())
            .await;
        assert!(matches!(result, Err(FetchError::TimedOut { .. })));
        assert_eq!(fetcher.active_fetches().current(), 0);
    }

    #[tokio::test]
    async fn test_dropping_reader_releases_transfer() {
        let data = sample(64 * 1024);
        let backend = Arc::new(MockBackend::new(1024).with("obj", MockObject::Data(data)));
        let fetcher = ChunkedFetcher::new(backend, &config(1024));

        for _ in 0..10 {
            let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
            let mut reader = source.read(ByteWindow::full(64 * 1024).unwrap());
            assert!(reader.next_chunk().await.unwrap().is_ok());
            assert_eq!(fetcher.active_fetches().current(), 1);
            drop(reader);
            assert_eq!(fetcher.active_fetches().current(), 0);
        }
    }

    #[tokio::test]
    async fn test_transfer_released_when_window_completes() {
        let data = sample(10_000);
        let backend = Arc::new(MockBackend::new(100).with("obj", MockObject::Data(data)));
        let fetcher = ChunkedFetcher::new(backend, &config(100));

        let source = fetcher.open(&BackendLocator::from("obj")).await.unwrap();
        let mut reader = source.read(ByteWindow::new(0, 99).unwrap());
        assert_eq!(reader.next_chunk().await.unwrap().unwrap().len(), 100);
        // Last chunk handed out: reader still alive, backend transfer gone
        assert_eq!(reader.remaining(), 0);
        assert_eq!(fetcher.active_fetches().current(), 0);
        assert!(reader.next_chunk().await.is_none());
    }
}
