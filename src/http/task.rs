//! One HTTP transfer and the async driver moving its bytes.
//!
//! A task starts suspended. The first [`resume`](TransportTask::resume)
//! spawns a driver on the session's runtime which sends the request, streams
//! the body into a partial file and reports back through the session's
//! [`SessionEvents`](crate::transport::SessionEvents). Pause and cancellation
//! requests travel to the driver through a watch channel and are honoured
//! between chunks.

use super::resume::{headers_to_pairs, PersistedTask, ResumeData};
use super::session::{HttpSession, SessionShared};
use crate::error::TransportError;
use crate::transport::{
    task::is_acceptable_status, DownloadRequest, ResumeDataCallback, TaskId, TaskState,
    TransportResponse, TransportTask,
};
use crate::utils::{expected_total, lock, suggested_filename};

use futures::StreamExt;
use reqwest::{
    header::{ACCEPT_RANGES, ETAG, IF_RANGE, LAST_MODIFIED, RANGE},
    StatusCode,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::watch,
};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Cancel { produce_resume_data: bool },
}

/// How a transfer that did not fail ended.
#[derive(Debug)]
enum Finish {
    /// The whole body is in the partial file.
    Downloaded,
    /// The server answered with a non-2xx status; the body was not read.
    Rejected(StatusCode),
    Cancelled { produce_resume_data: bool },
}

/// Everything needed to create a task.
pub(crate) struct TaskSeed {
    pub id: TaskId,
    pub request: DownloadRequest,
    pub partial_path: PathBuf,
    /// Bytes already present in `partial_path`.
    pub offset: u64,
    pub validator: Option<String>,
    pub accepts_ranges: bool,
    /// Reported as the terminal error as soon as the task runs.
    pub error: Option<TransportError>,
}

impl TaskSeed {
    pub fn fresh(id: TaskId, request: DownloadRequest, partial_path: PathBuf) -> Self {
        Self {
            id,
            request,
            partial_path,
            offset: 0,
            validator: None,
            accepts_ranges: false,
            error: None,
        }
    }

    pub fn from_resume_data(id: TaskId, request: DownloadRequest, data: ResumeData) -> Self {
        Self {
            id,
            request,
            partial_path: data.partial_path,
            offset: data.offset,
            validator: data.validator,
            accepts_ranges: true,
            error: None,
        }
    }
}

struct TaskInner {
    state: TaskState,
    /// Whether a driver has been spawned.
    launched: bool,
    response: Option<TransportResponse>,
    /// Bytes currently in the partial file.
    received: u64,
    validator: Option<String>,
    accepts_ranges: bool,
    resume_callback: Option<ResumeDataCallback>,
    error: Option<TransportError>,
}

/// HTTP implementation of [`TransportTask`].
pub struct HttpTask {
    id: TaskId,
    request: DownloadRequest,
    partial_path: PathBuf,
    me: Weak<HttpTask>,
    session: Weak<SessionShared>,
    inner: Mutex<TaskInner>,
    control: watch::Sender<Control>,
}

impl HttpTask {
    pub(crate) fn new(seed: TaskSeed, session: &Arc<SessionShared>) -> Arc<Self> {
        let (control, _) = watch::channel(Control::Pause);
        Arc::new_cyclic(|me| HttpTask {
            id: seed.id,
            request: seed.request,
            partial_path: seed.partial_path,
            me: me.clone(),
            session: Arc::downgrade(session),
            inner: Mutex::new(TaskInner {
                state: TaskState::Suspended,
                launched: false,
                response: None,
                received: seed.offset,
                validator: seed.validator,
                accepts_ranges: seed.accepts_ranges,
                resume_callback: None,
                error: seed.error,
            }),
            control,
        })
    }

    /// Where the body is written while the transfer runs.
    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    pub(crate) fn persisted(&self) -> PersistedTask {
        let inner = lock(&self.inner);
        PersistedTask {
            id: self.id,
            url: self.request.url.to_string(),
            headers: headers_to_pairs(&self.request.headers),
            partial_path: self.partial_path.clone(),
            validator: inner.validator.clone(),
            accepts_ranges: inner.accepts_ranges,
            running: inner.state == TaskState::Running,
        }
    }

    fn persist(&self) {
        if let Some(session) = self.session.upgrade() {
            session.persist();
        }
    }

    fn launch(&self) {
        let (Some(task), Some(session)) = (self.me.upgrade(), self.session.upgrade()) else {
            return;
        };
        let runtime = session.runtime.clone();
        runtime.spawn(async move {
            let outcome = task.transfer(&session).await;
            task.finish(&session, outcome).await;
        });
    }

    fn request_cancel(&self, callback: Option<ResumeDataCallback>) {
        let produce_resume_data = callback.is_some();
        let launched = {
            let mut inner = lock(&self.inner);
            if matches!(inner.state, TaskState::Canceling | TaskState::Completed) {
                drop(inner);
                if let Some(callback) = callback {
                    callback(None);
                }
                return;
            }
            inner.state = TaskState::Canceling;
            inner.resume_callback = callback;
            std::mem::replace(&mut inner.launched, true)
        };
        debug!("Canceling task {}", self.id);
        self.control.send_replace(Control::Cancel {
            produce_resume_data,
        });
        // A task that never ran still goes through the driver to report its end.
        if !launched {
            self.launch();
        }
        self.persist();
    }

    /// Resume data for the bytes received so far, if the server allows ranges.
    fn resume_data(&self) -> Option<Vec<u8>> {
        let inner = lock(&self.inner);
        if inner.received == 0 || !inner.accepts_ranges {
            return None;
        }
        let data = ResumeData {
            url: self.request.url.to_string(),
            headers: headers_to_pairs(&self.request.headers),
            partial_path: self.partial_path.clone(),
            offset: inner.received,
            validator: inner.validator.clone(),
        };
        data.to_bytes().ok()
    }

    async fn transfer(&self, session: &SessionShared) -> Result<Finish, TransportError> {
        let mut control = self.control.subscribe();
        if let Some(produce_resume_data) = hold(&mut control).await {
            return Ok(Finish::Cancelled {
                produce_resume_data,
            });
        }

        let (offset, validator) = {
            let mut inner = lock(&self.inner);
            if let Some(error) = inner.error.take() {
                return Err(error);
            }
            if inner.accepts_ranges {
                (inner.received, inner.validator.clone())
            } else {
                (0, None)
            }
        };

        let mut request = session
            .client
            .get(self.request.url.clone())
            .headers(self.request.headers.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
            if let Some(validator) = validator {
                request = request.header(IF_RANGE, validator);
            }
        }

        debug!(
            "Task {} fetching {} from byte {}",
            self.id, self.request.url, offset
        );
        let response = tokio::select! {
            response = request.send() => response.map_err(|e| TransportError::Request(e.to_string()))?,
            produce_resume_data = wait_for_cancel(&mut control) => {
                return Ok(Finish::Cancelled { produce_resume_data });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let start = if resumed { offset } else { 0 };
        let total_expected = expected_total(status, &headers, start);
        {
            let mut inner = lock(&self.inner);
            inner.response = Some(TransportResponse {
                status,
                url: response.url().clone(),
                suggested_filename: suggested_filename(&headers, response.url()),
                content_length: total_expected,
            });
            inner.accepts_ranges = status == StatusCode::PARTIAL_CONTENT
                || headers
                    .get(ACCEPT_RANGES)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
            inner.validator = headers
                .get(ETAG)
                .or_else(|| headers.get(LAST_MODIFIED))
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            inner.received = start;
        }
        self.persist();

        if !is_acceptable_status(status) {
            return Ok(Finish::Rejected(status));
        }
        if offset > 0 && !resumed {
            debug!("Task {} restarting from scratch ({})", self.id, status);
        }

        if let Some(parent) = self.partial_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = if resumed {
            OpenOptions::new()
                .append(true)
                .open(&self.partial_path)
                .await?
        } else {
            fs::File::create(&self.partial_path).await?
        };

        let task: Arc<dyn TransportTask> = match self.me.upgrade() {
            Some(task) => task as Arc<dyn TransportTask>,
            None => return Err(TransportError::Cancelled),
        };
        let mut stream = response.bytes_stream();
        let mut total_written = start;
        loop {
            if let Some(produce_resume_data) = hold(&mut control).await {
                file.flush().await?;
                return Ok(Finish::Cancelled {
                    produce_resume_data,
                });
            }

            let next = tokio::select! {
                next = stream.next() => next,
                _ = control.changed() => continue,
            };

            match next {
                None => break,
                Some(Err(e)) => {
                    file.flush().await?;
                    return Err(TransportError::Request(e.to_string()));
                }
                Some(Ok(mut chunk)) => {
                    let bytes_written = chunk.len() as u64;
                    file.write_all_buf(&mut chunk).await?;
                    total_written += bytes_written;
                    lock(&self.inner).received = total_written;
                    trace!(
                        "Task {} wrote {} bytes ({} total)",
                        self.id,
                        bytes_written,
                        total_written
                    );
                    session.events.on_bytes_written(
                        &task,
                        bytes_written,
                        total_written,
                        total_expected,
                    );
                }
            }
        }

        file.flush().await?;
        Ok(Finish::Downloaded)
    }

    async fn finish(&self, session: &Arc<SessionShared>, outcome: Result<Finish, TransportError>) {
        let Some(task) = self.me.upgrade() else {
            return;
        };
        let task: Arc<dyn TransportTask> = task;

        let mut keep_partial = false;
        let error = match outcome {
            Ok(Finish::Downloaded) => {
                debug!("Task {} finished transferring", self.id);
                session
                    .events
                    .on_finished_to_temp_location(&task, &self.partial_path);
                None
            }
            Ok(Finish::Rejected(status)) => {
                debug!("Task {} rejected with status {}", self.id, status);
                None
            }
            Ok(Finish::Cancelled {
                produce_resume_data,
            }) => {
                if produce_resume_data {
                    let data = self.resume_data();
                    keep_partial = data.is_some();
                    let callback = lock(&self.inner).resume_callback.take();
                    if let Some(callback) = callback {
                        callback(data);
                    }
                }
                Some(TransportError::Cancelled)
            }
            Err(e) => {
                warn!("Task {} failed: {}", self.id, e);
                Some(e)
            }
        };

        let unanswered = lock(&self.inner).resume_callback.take();
        if let Some(callback) = unanswered {
            callback(None);
        }
        if !keep_partial {
            discard(&self.partial_path).await;
        }

        lock(&self.inner).state = TaskState::Completed;
        let remaining = session.forget(self.id);
        session.events.on_task_completed(&task, error);
        if remaining == 0 && session.is_background() {
            let session = HttpSession::from_shared(session.clone());
            session.shared().events.on_all_background_events_drained(&session);
        }
    }
}

/// Waits while paused. Returns `Some` once cancellation was requested.
async fn hold(control: &mut watch::Receiver<Control>) -> Option<bool> {
    loop {
        let current = *control.borrow_and_update();
        match current {
            Control::Run => return None,
            Control::Cancel {
                produce_resume_data,
            } => return Some(produce_resume_data),
            Control::Pause => {
                if control.changed().await.is_err() {
                    return Some(false);
                }
            }
        }
    }
}

async fn wait_for_cancel(control: &mut watch::Receiver<Control>) -> bool {
    loop {
        let current = *control.borrow_and_update();
        if let Control::Cancel {
            produce_resume_data,
        } = current
        {
            return produce_resume_data;
        }
        if control.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => trace!("Removed {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {:?}: {}", path, e),
    }
}

impl TransportTask for HttpTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn state(&self) -> TaskState {
        lock(&self.inner).state
    }

    fn original_request(&self) -> &DownloadRequest {
        &self.request
    }

    fn response(&self) -> Option<TransportResponse> {
        lock(&self.inner).response.clone()
    }

    fn resume(&self) {
        let first_run = {
            let mut inner = lock(&self.inner);
            if inner.state != TaskState::Suspended {
                return;
            }
            inner.state = TaskState::Running;
            !std::mem::replace(&mut inner.launched, true)
        };
        trace!("Resuming task {}", self.id);
        self.control.send_replace(Control::Run);
        if first_run {
            self.launch();
        }
        self.persist();
    }

    fn suspend(&self) {
        {
            let mut inner = lock(&self.inner);
            if inner.state != TaskState::Running {
                return;
            }
            inner.state = TaskState::Suspended;
        }
        trace!("Suspending task {}", self.id);
        self.control.send_replace(Control::Pause);
        self.persist();
    }

    fn cancel(&self) {
        self.request_cancel(None);
    }

    fn cancel_producing_resume_data(&self, callback: ResumeDataCallback) {
        self.request_cancel(Some(callback));
    }
}
