//! reqwest-backed transport sessions.

use super::client::create_http_client;
use super::resume::{headers_from_pairs, ResumeData, TaskTable};
use super::task::{HttpTask, TaskSeed};
use crate::error::{Error, Result};
use crate::session::{SessionConfig, SessionKind};
use crate::transport::{
    DownloadRequest, SessionEvents, TaskId, TaskSource, TaskState, Transport, TransportSession,
    TransportTask,
};
use crate::utils::{encode_file_component, lock};

use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Tells apart the sessions of this process that share a temp directory.
static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// The bundled [`Transport`], moving bytes over HTTP with reqwest.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport
    }
}

impl Transport for HttpTransport {
    fn open_session(
        &self,
        config: &SessionConfig,
        events: Arc<dyn SessionEvents>,
    ) -> Result<Arc<dyn TransportSession>> {
        let session: Arc<dyn TransportSession> = HttpSession::open(config, events)?;
        Ok(session)
    }
}

pub(crate) struct SessionShared {
    pub identifier: String,
    pub client: ClientWithMiddleware,
    pub events: Arc<dyn SessionEvents>,
    pub runtime: Handle,
    temp_dir: PathBuf,
    /// Unique to this session within the temp directory.
    partial_prefix: String,
    table_path: Option<PathBuf>,
    /// Stand-in URL for tasks whose resume data could not be decoded.
    blank_url: Url,
    tasks: Mutex<BTreeMap<TaskId, Arc<HttpTask>>>,
    next_id: AtomicU64,
    relaunch: Mutex<Vec<Arc<HttpTask>>>,
    persist_lock: Mutex<()>,
}

impl SessionShared {
    pub fn is_background(&self) -> bool {
        self.table_path.is_some()
    }

    /// Drops a terminated task and returns how many remain.
    pub fn forget(&self, id: TaskId) -> usize {
        let remaining = {
            let mut tasks = lock(&self.tasks);
            tasks.remove(&id);
            tasks.len()
        };
        self.persist();
        remaining
    }

    /// Writes the task table of a background session.
    pub fn persist(&self) {
        let Some(path) = &self.table_path else {
            return;
        };
        let _guard = lock(&self.persist_lock);
        let table = {
            let tasks = lock(&self.tasks);
            TaskTable {
                next_id: self.next_id.load(Ordering::SeqCst),
                tasks: tasks.values().map(|task| task.persisted()).collect(),
            }
        };
        if let Err(e) = table.store(path) {
            warn!("Cannot persist task table {:?}: {}", path, e);
        }
    }

    fn partial_path(&self, id: TaskId) -> PathBuf {
        self.temp_dir
            .join(format!("trawl-{}-{}.part", self.partial_prefix, id))
    }

    fn restore(self: &Arc<Self>, table: TaskTable) {
        let mut next_id = table.next_id.max(1);
        for persisted in table.tasks {
            next_id = next_id.max(persisted.id + 1);
            let url = match Url::parse(&persisted.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Dropping restored task {}: {}", persisted.id, e);
                    continue;
                }
            };
            let offset = fs::metadata(&persisted.partial_path)
                .map(|m| m.len())
                .unwrap_or(0);
            let seed = TaskSeed {
                id: persisted.id,
                request: DownloadRequest::new(url).with_headers(headers_from_pairs(&persisted.headers)),
                partial_path: persisted.partial_path,
                offset,
                validator: persisted.validator,
                accepts_ranges: persisted.accepts_ranges,
                error: None,
            };
            let task = HttpTask::new(seed, self);
            debug!(
                "Restored task {} of session {} at byte {}",
                persisted.id, self.identifier, offset
            );
            if persisted.running {
                lock(&self.relaunch).push(task.clone());
            }
            lock(&self.tasks).insert(persisted.id, task);
        }
        self.next_id.store(next_id, Ordering::SeqCst);
    }
}

/// A transport session issuing HTTP download tasks.
///
/// Background sessions keep their task table in
/// `<state_dir>/<identifier>.tasks.json`. Reopening a background session
/// with the same identifier brings its tasks back under their old
/// identifiers; the ones that were running continue on
/// [`activate`](TransportSession::activate).
pub struct HttpSession {
    shared: Arc<SessionShared>,
}

impl HttpSession {
    /// Opens a session. Must be called within a Tokio runtime.
    pub fn open(config: &SessionConfig, events: Arc<dyn SessionEvents>) -> Result<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("HTTP sessions need a Tokio runtime: {}", e)))?;
        let client = create_http_client(config)?;
        let blank_url =
            Url::parse("about:blank").map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let table_path = match &config.kind {
            SessionKind::Background { state_dir } => {
                let name = encode_file_component(&config.identifier);
                Some(state_dir.join(format!("{}.tasks.json", name)))
            }
            SessionKind::Default => None,
        };

        let partial_prefix = format!(
            "{}-{}-{}",
            encode_file_component(&config.identifier),
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        );

        let shared = Arc::new(SessionShared {
            identifier: config.identifier.clone(),
            client,
            events,
            runtime,
            temp_dir: config.temp_dir.clone(),
            partial_prefix,
            table_path,
            blank_url,
            tasks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            relaunch: Mutex::new(Vec::new()),
            persist_lock: Mutex::new(()),
        });
        if let Some(path) = &shared.table_path {
            shared.restore(TaskTable::load(path));
        }

        info!(
            "Opened {} session {}",
            if shared.is_background() { "background" } else { "default" },
            shared.identifier
        );
        Ok(Arc::new(HttpSession { shared }))
    }

    pub(crate) fn from_shared(shared: Arc<SessionShared>) -> Self {
        HttpSession { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    fn seed(&self, id: TaskId, source: TaskSource) -> TaskSeed {
        let shared = &self.shared;
        match source {
            TaskSource::Url(url) => TaskSeed::fresh(id, url.into(), shared.partial_path(id)),
            TaskSource::Request(request) => TaskSeed::fresh(id, request, shared.partial_path(id)),
            TaskSource::ResumeData(bytes) => {
                match ResumeData::from_bytes(&bytes).and_then(|data| {
                    let request = data.request()?;
                    Ok((data, request))
                }) {
                    Ok((data, request)) => TaskSeed::from_resume_data(id, request, data),
                    Err(e) => {
                        warn!("Task {} created from unusable resume data: {}", id, e);
                        let mut seed = TaskSeed::fresh(
                            id,
                            shared.blank_url.clone().into(),
                            shared.partial_path(id),
                        );
                        seed.error = Some(e);
                        seed
                    }
                }
            }
        }
    }
}

impl TransportSession for HttpSession {
    fn identifier(&self) -> &str {
        &self.shared.identifier
    }

    fn download_task(&self, source: TaskSource) -> Arc<dyn TransportTask> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let task = HttpTask::new(self.seed(id, source), &self.shared);
        lock(&self.shared.tasks).insert(id, task.clone());
        self.shared.persist();
        debug!("Created task {} for {}", id, task.original_request().url);
        task
    }

    fn live_tasks(&self) -> Vec<Arc<dyn TransportTask>> {
        lock(&self.shared.tasks)
            .values()
            .filter(|task| task.state() != TaskState::Completed)
            .map(|task| task.clone() as Arc<dyn TransportTask>)
            .collect()
    }

    fn activate(&self) {
        let relaunch = std::mem::take(&mut *lock(&self.shared.relaunch));
        for task in relaunch {
            debug!("Relaunching task {}", task.id());
            task.resume();
        }
    }
}
