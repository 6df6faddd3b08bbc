//! Transport layer contract.
//!
//! The session engine does not speak HTTP itself. It drives a [`Transport`]
//! which hands out [`TransportSession`]s producing task-based downloads with
//! native pause, resume, cancel and resume-data semantics, and which reports
//! progress back through a [`SessionEvents`] sink.
//!
//! [`crate::http::HttpTransport`] is the bundled implementation built on
//! reqwest. Other implementations (platform download daemons, test doubles)
//! only need to honour the callback ordering documented on [`SessionEvents`].

pub mod task;

pub use task::{DownloadRequest, TaskId, TaskSource, TaskState, TransportResponse};

use crate::error::{Result, TransportError};
use crate::session::SessionConfig;

use std::path::Path;
use std::sync::Arc;

/// Callback invoked once with the resume data produced by a cancellation.
pub type ResumeDataCallback = Box<dyn FnOnce(Option<Vec<u8>>) + Send>;

/// Factory for transport sessions.
pub trait Transport: Send + Sync {
    /// Opens a session for `config`, delivering every task callback to `events`.
    fn open_session(
        &self,
        config: &SessionConfig,
        events: Arc<dyn SessionEvents>,
    ) -> Result<Arc<dyn TransportSession>>;
}

/// One live transport session.
pub trait TransportSession: Send + Sync {
    /// The session-scope identifier this session was configured with.
    fn identifier(&self) -> &str;

    /// Creates a new, suspended, download task.
    ///
    /// Creation never fails synchronously: a task that cannot run reports its
    /// failure through [`SessionEvents::on_task_completed`] once resumed.
    fn download_task(&self, source: TaskSource) -> Arc<dyn TransportTask>;

    /// Tasks the session currently knows about and that have not completed.
    fn live_tasks(&self) -> Vec<Arc<dyn TransportTask>>;

    /// Called once every restored task has been matched against the ledger.
    ///
    /// Sessions that restore transfers from a previous process relaunch them
    /// here, so that no callback is delivered before its handle is registered.
    fn activate(&self) {}
}

/// The transport's unit of work backing one download.
pub trait TransportTask: Send + Sync {
    /// Identifier, unique within the owning session.
    fn id(&self) -> TaskId;

    /// Current state of the task.
    fn state(&self) -> TaskState;

    /// The request this task was created from.
    fn original_request(&self) -> &DownloadRequest;

    /// The server response, once headers have been received.
    fn response(&self) -> Option<TransportResponse>;

    /// Starts or continues the transfer. No-op if already running.
    fn resume(&self);

    /// Pauses the transfer without losing state. No-op if already suspended.
    fn suspend(&self);

    /// Cancels the transfer for good.
    fn cancel(&self);

    /// Cancels the transfer and yields data allowing a later restart.
    fn cancel_producing_resume_data(&self, callback: ResumeDataCallback);
}

/// Callback sink of a transport session.
///
/// For a single task, callbacks arrive in the order `on_bytes_written*`,
/// `on_finished_to_temp_location`, `on_task_completed`. A failed transfer may
/// skip the finish step. Callbacks for different tasks may interleave on any
/// thread.
pub trait SessionEvents: Send + Sync {
    /// A chunk was written. `total_expected` is `None` when the size is unknown.
    fn on_bytes_written(
        &self,
        task: &Arc<dyn TransportTask>,
        bytes_written: u64,
        total_written: u64,
        total_expected: Option<u64>,
    );

    /// The whole body sits in `location`; it is discarded once this returns.
    fn on_finished_to_temp_location(&self, task: &Arc<dyn TransportTask>, location: &Path);

    /// The task reached a terminal state.
    fn on_task_completed(&self, task: &Arc<dyn TransportTask>, error: Option<TransportError>);

    /// A background session delivered every pending event.
    fn on_all_background_events_drained(&self, session: &dyn TransportSession);
}
