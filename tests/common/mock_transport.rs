//! A scriptable in-memory transport.
//!
//! Tasks never move bytes on their own: tests drive them through the
//! [`MockSession`] helpers, which call the session events exactly like a
//! real transport would.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use reqwest::{StatusCode, Url};
use trawl::error::{Result, TransportError};
use trawl::session::SessionConfig;
use trawl::transport::{
    DownloadRequest, ResumeDataCallback, SessionEvents, TaskId, TaskSource, TaskState, Transport,
    TransportResponse, TransportSession, TransportTask,
};

/// Transport handing out a single [`MockSession`].
#[derive(Default)]
pub struct MockTransport {
    live: Mutex<Vec<(TaskId, Url)>>,
    scratch: Mutex<Option<PathBuf>>,
    session: Mutex<Option<Arc<MockSession>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport::default())
    }

    /// Makes the next opened session report a running task `id`.
    pub fn with_live_task(self: Arc<Self>, id: TaskId, url: &str) -> Arc<Self> {
        self.live
            .lock()
            .unwrap()
            .push((id, Url::parse(url).unwrap()));
        self
    }

    /// Directory the session writes finished bodies to.
    pub fn with_scratch_dir(self: Arc<Self>, dir: &Path) -> Arc<Self> {
        *self.scratch.lock().unwrap() = Some(dir.to_path_buf());
        self
    }

    /// The last session opened.
    pub fn session(&self) -> Arc<MockSession> {
        self.session
            .lock()
            .unwrap()
            .clone()
            .expect("no session opened yet")
    }
}

impl Transport for MockTransport {
    fn open_session(
        &self,
        config: &SessionConfig,
        events: Arc<dyn SessionEvents>,
    ) -> Result<Arc<dyn TransportSession>> {
        let scratch = self
            .scratch
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let session = Arc::new_cyclic(|me| MockSession {
            me: me.clone(),
            identifier: config.identifier.clone(),
            events,
            scratch,
            tasks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            activated: AtomicBool::new(false),
        });
        for (id, url) in self.live.lock().unwrap().drain(..) {
            let task = session.insert(id, DownloadRequest::new(url));
            *task.state.lock().unwrap() = TaskState::Running;
            session.next_id.fetch_max(id + 1, Ordering::SeqCst);
        }
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }
}

pub struct MockSession {
    me: Weak<MockSession>,
    identifier: String,
    events: Arc<dyn SessionEvents>,
    scratch: PathBuf,
    tasks: Mutex<BTreeMap<TaskId, Arc<MockTask>>>,
    next_id: AtomicU64,
    activated: AtomicBool,
}

impl MockSession {
    fn insert(&self, id: TaskId, request: DownloadRequest) -> Arc<MockTask> {
        let task = Arc::new(MockTask {
            id,
            request,
            session: self.me.clone(),
            state: Mutex::new(TaskState::Suspended),
            response: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        });
        self.tasks.lock().unwrap().insert(id, task.clone());
        task
    }

    pub fn task(&self, id: TaskId) -> Arc<MockTask> {
        self.tasks.lock().unwrap().get(&id).cloned().expect("unknown task")
    }

    pub fn was_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    fn dyn_task(&self, id: TaskId) -> Arc<dyn TransportTask> {
        self.task(id)
    }

    /// Reports a written chunk.
    pub fn progress(&self, id: TaskId, bytes: u64, total: u64, expected: Option<u64>) {
        self.events
            .on_bytes_written(&self.dyn_task(id), bytes, total, expected);
    }

    /// Records the server response of task `id`.
    pub fn respond(&self, id: TaskId, status: u16, suggested_filename: Option<&str>) {
        let task = self.task(id);
        *task.response.lock().unwrap() = Some(TransportResponse {
            status: StatusCode::from_u16(status).unwrap(),
            url: task.request.url.clone(),
            suggested_filename: suggested_filename.map(str::to_string),
            content_length: None,
        });
    }

    /// Writes `body` to a temporary file, hands it over, then completes.
    pub fn finish(&self, id: TaskId, body: &[u8]) {
        let location = self.scratch.join(format!("mock-{}-{}.tmp", self.identifier, id));
        std::fs::write(&location, body).unwrap();
        self.events
            .on_finished_to_temp_location(&self.dyn_task(id), &location);
        let _ = std::fs::remove_file(&location);
        self.complete(id, None);
    }

    /// Ends task `id` with `error`.
    pub fn complete(&self, id: TaskId, error: Option<TransportError>) {
        let task = self.task(id);
        *task.state.lock().unwrap() = TaskState::Completed;
        let task: Arc<dyn TransportTask> = task;
        self.events.on_task_completed(&task, error);
    }

    /// Signals that every background event was delivered.
    pub fn drain(&self) {
        self.events.on_all_background_events_drained(self);
    }
}

impl TransportSession for MockSession {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn download_task(&self, source: TaskSource) -> Arc<dyn TransportTask> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = match source {
            TaskSource::Url(url) => DownloadRequest::new(url),
            TaskSource::Request(request) => request,
            TaskSource::ResumeData(data) => {
                let url = String::from_utf8(data).unwrap_or_default();
                DownloadRequest::new(
                    Url::parse(&url).unwrap_or_else(|_| Url::parse("about:blank").unwrap()),
                )
            }
        };
        self.insert(id, request)
    }

    fn live_tasks(&self) -> Vec<Arc<dyn TransportTask>> {
        self.tasks
            .lock()
            .unwrap()
            .values()
            .filter(|task| task.state() != TaskState::Completed)
            .map(|task| task.clone() as Arc<dyn TransportTask>)
            .collect()
    }

    fn activate(&self) {
        self.activated.store(true, Ordering::SeqCst);
    }
}

pub struct MockTask {
    id: TaskId,
    request: DownloadRequest,
    session: Weak<MockSession>,
    state: Mutex<TaskState>,
    response: Mutex<Option<TransportResponse>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockTask {
    /// Control calls received, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn transition(&self, from: TaskState, to: TaskState) {
        let mut state = self.state.lock().unwrap();
        if *state == from {
            *state = to;
        }
    }

    fn cancelled(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, TaskState::Canceling | TaskState::Completed) {
                return;
            }
            *state = TaskState::Canceling;
        }
        if let Some(session) = self.session.upgrade() {
            session.complete(self.id, Some(TransportError::Cancelled));
        }
    }
}

impl TransportTask for MockTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn state(&self) -> TaskState {
        *self.state.lock().unwrap()
    }

    fn original_request(&self) -> &DownloadRequest {
        &self.request
    }

    fn response(&self) -> Option<TransportResponse> {
        self.response.lock().unwrap().clone()
    }

    fn resume(&self) {
        self.record("resume");
        self.transition(TaskState::Suspended, TaskState::Running);
    }

    fn suspend(&self) {
        self.record("suspend");
        self.transition(TaskState::Running, TaskState::Suspended);
    }

    fn cancel(&self) {
        self.record("cancel");
        self.cancelled();
    }

    fn cancel_producing_resume_data(&self, callback: ResumeDataCallback) {
        self.record("cancel_producing_resume_data");
        callback(Some(self.request.url.as_str().as_bytes().to_vec()));
        self.cancelled();
    }
}
