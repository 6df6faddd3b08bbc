use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use reqwest::Url;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;
use trawl::download::{DownloadHandle, DownloadObserver, DownloadOptions, Progress};
use trawl::ledger::{KeyValueStore, MemoryStore};
use trawl::transport::{TaskId, Transport};
use trawl::{Error, SessionManager};

// Common test constants
pub const TEST_SCOPE: &str = "tests.downloads";
pub const WAIT: Duration = Duration::from_secs(10);

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Creates test file content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Creates a test URL for download testing
pub fn test_url(file_name: &str) -> Url {
    Url::parse(&format!("https://example.com/{}", file_name)).unwrap()
}

/// Asserts that a file exists at the given path
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "File should exist at path: {:?}", path);
}

/// Asserts that a file holds exactly `content`
pub fn assert_file_content(path: &Path, content: &[u8]) {
    let actual = fs::read(path).expect("Failed to read file");
    assert_eq!(actual.len(), content.len(), "File size mismatch at {:?}", path);
    assert!(actual == content, "File content mismatch at {:?}", path);
}

/// A memory store shared between successive managers.
pub fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

/// Builds a manager on `transport` with the test scope.
pub fn mock_manager(
    transport: Arc<dyn Transport>,
    store: Arc<dyn KeyValueStore>,
    auto_start: bool,
) -> SessionManager {
    init_tracing();
    SessionManager::builder()
        .identifier(TEST_SCOPE)
        .store(store)
        .auto_start(auto_start)
        .build_with_transport(transport)
        .expect("Failed to build the session manager")
}

/// What a completion callback received.
#[derive(Debug)]
pub struct Outcome {
    pub task_id: TaskId,
    pub error: Option<Error>,
    pub location: Option<PathBuf>,
}

/// Adds a completion callback to `options` reporting through a channel.
pub fn with_completion(options: DownloadOptions) -> (DownloadOptions, oneshot::Receiver<Outcome>) {
    let (tx, rx) = oneshot::channel();
    let options = options.on_complete(move |download, error, location| {
        let _ = tx.send(Outcome {
            task_id: download.task_id(),
            error: error.cloned(),
            location: location.map(Path::to_path_buf),
        });
    });
    (options, rx)
}

/// Waits for a completion, failing the test after [`WAIT`].
pub async fn wait_for(rx: oneshot::Receiver<Outcome>) -> Outcome {
    tokio::time::timeout(WAIT, rx)
        .await
        .expect("Timed out waiting for completion")
        .expect("Completion callback dropped")
}

/// Adds a progress callback to `options` reporting bytes through a channel.
pub fn with_progress(options: DownloadOptions) -> (DownloadOptions, mpsc::UnboundedReceiver<u64>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let options = options.on_progress(move |_, written, _| {
        let _ = tx.send(written);
    });
    (options, rx)
}

/// An event seen by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress {
        task_id: TaskId,
        progress: Progress,
        written: u64,
        expected: Option<u64>,
    },
    Finished {
        task_id: TaskId,
        error: Option<String>,
        location: Option<PathBuf>,
    },
}

/// Observer recording every notification.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingObserver::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, Event::Finished { .. }))
            .collect()
    }
}

impl DownloadObserver for RecordingObserver {
    fn on_progress(
        &self,
        download: &DownloadHandle,
        progress: Progress,
        total_written: u64,
        total_expected: Option<u64>,
    ) {
        self.events.lock().unwrap().push(Event::Progress {
            task_id: download.task_id(),
            progress,
            written: total_written,
            expected: total_expected,
        });
    }

    fn on_finished(&self, download: &DownloadHandle, error: Option<&Error>, location: Option<&Path>) {
        self.events.lock().unwrap().push(Event::Finished {
            task_id: download.task_id(),
            error: error.map(ToString::to_string),
            location: location.map(Path::to_path_buf),
        });
    }
}
