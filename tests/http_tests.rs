//! End-to-end downloads through the bundled HTTP transport and a local server.

use std::time::Duration;

use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use tokio::sync::oneshot;
use trawl::download::DownloadOptions;
use trawl::transport::TaskState;
use trawl::{Error, HttpTransport, ResumeData, SessionManager, SessionManagerBuilder};

mod common;
use common::helpers::*;
use common::http_server::{Route, TestServer};

fn http_manager(temp_dir: &std::path::Path) -> SessionManager {
    init_tracing();
    SessionManagerBuilder::new()
        .identifier(TEST_SCOPE)
        .retries(0)
        .temp_dir(temp_dir)
        .header(USER_AGENT, HeaderValue::from_static("trawl-tests"))
        .build()
        .expect("Failed to build the session manager")
}

fn partial_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "part"))
        .collect()
}

#[tokio::test]
async fn test_download_file() {
    let content = create_test_content(100_000);
    let server = TestServer::start(vec![("/data.bin", Route::ok(content.clone()))]).await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let (options, mut progress) = with_progress(
        DownloadOptions::new()
            .directory(dir.path().join("out"))
            .file_name("data.bin"),
    );
    let (options, rx) = with_completion(options);
    let download = manager.download(server.url("/data.bin"), options);

    let outcome = wait_for(rx).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    let destination = dir.path().join("out").join("data.bin");
    assert_eq!(outcome.location.as_deref(), Some(destination.as_path()));
    assert_file_content(&destination, &content);
    assert_eq!(download.state(), TaskState::Completed);

    let mut last = 0;
    while let Ok(written) = progress.try_recv() {
        assert!(written >= last);
        last = written;
    }
    assert_eq!(last, content.len() as u64);

    let requests = server.requests();
    assert_eq!(requests[0].header("user-agent"), Some("trawl-tests"));
    assert!(requests[0].header("range").is_none());

    // The partial file is gone.
    assert!(partial_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_sessions_sharing_temp_dir_do_not_collide() {
    let first = vec![b'A'; 64 * 1024];
    let second = vec![b'B'; 64 * 1024];
    let server = TestServer::start(vec![
        ("/a.bin", Route::ok(first.clone()).slow(4096, Duration::from_millis(2))),
        ("/b.bin", Route::ok(second.clone()).slow(4096, Duration::from_millis(2))),
    ])
    .await;
    let dir = create_temp_dir();
    let manager_a = http_manager(dir.path());
    let manager_b = http_manager(dir.path());

    let (options_a, rx_a) = with_completion(DownloadOptions::new().directory(dir.path().join("o1")));
    let (options_b, rx_b) = with_completion(DownloadOptions::new().directory(dir.path().join("o2")));
    let download_a = manager_a.download(server.url("/a.bin"), options_a);
    let download_b = manager_b.download(server.url("/b.bin"), options_b);
    assert_eq!(download_a.task_id(), download_b.task_id());

    let (outcome_a, outcome_b) = tokio::join!(wait_for(rx_a), wait_for(rx_b));
    assert!(outcome_a.error.is_none(), "{:?}", outcome_a.error);
    assert!(outcome_b.error.is_none(), "{:?}", outcome_b.error);
    assert_file_content(&dir.path().join("o1").join("a.bin"), &first);
    assert_file_content(&dir.path().join("o2").join("b.bin"), &second);
    assert!(partial_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_requests_name_the_session() {
    let server = TestServer::start(vec![("/a.txt", Route::ok(b"hello".to_vec()))]).await;
    let dir = create_temp_dir();
    init_tracing();
    let manager = SessionManagerBuilder::new()
        .identifier(TEST_SCOPE)
        .retries(0)
        .temp_dir(dir.path())
        .build()
        .expect("Failed to build the session manager");

    let (options, rx) = with_completion(DownloadOptions::new().directory(dir.path()));
    manager.download(server.url("/a.txt"), options);
    assert!(wait_for(rx).await.error.is_none());

    let requests = server.requests();
    let agent = requests[0].header("user-agent").unwrap();
    assert!(agent.starts_with("trawl/"));
    assert!(agent.ends_with(&format!("({})", TEST_SCOPE)));
}

#[tokio::test]
async fn test_not_found() {
    let server = TestServer::start(vec![]).await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let url = server.url("/missing.zip");
    let (options, rx) = with_completion(DownloadOptions::new().directory(dir.path()));
    let download = manager.download(url.clone(), options);

    let outcome = wait_for(rx).await;
    match outcome.error {
        Some(Error::HttpStatus { status, url: failed }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(failed, url);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(download.resulting_path().is_none());
    assert!(!dir.path().join("missing.zip").exists());
}

#[tokio::test]
async fn test_content_disposition_names_the_file() {
    let server = TestServer::start(vec![(
        "/download",
        Route::ok(b"report".to_vec()).attachment("report.pdf"),
    )])
    .await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let (options, rx) = with_completion(DownloadOptions::new().directory(dir.path()));
    manager.download(server.url("/download"), options);

    assert!(wait_for(rx).await.error.is_none());
    assert_file_content(&dir.path().join("report.pdf"), b"report");
}

#[tokio::test]
async fn test_suspend_and_resume() {
    let content = create_test_content(64 * 1024);
    let server = TestServer::start(vec![(
        "/slow.bin",
        Route::ok(content.clone()).slow(1024, Duration::from_millis(5)),
    )])
    .await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let (options, mut progress) = with_progress(
        DownloadOptions::new()
            .directory(dir.path())
            .file_name("slow.bin"),
    );
    let (options, rx) = with_completion(options);
    let download = manager.download(server.url("/slow.bin"), options);

    progress.recv().await.unwrap();
    download.suspend();
    download.suspend();
    assert_eq!(download.state(), TaskState::Suspended);
    assert_eq!(manager.current_downloads(Some(TaskState::Suspended)).len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    download.resume();

    assert!(wait_for(rx).await.error.is_none());
    assert_file_content(&dir.path().join("slow.bin"), &content);
}

#[tokio::test]
async fn test_cancel_removes_partial_file() {
    let content = create_test_content(64 * 1024);
    let server = TestServer::start(vec![(
        "/slow.bin",
        Route::ok(content).slow(1024, Duration::from_millis(5)),
    )])
    .await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let (options, mut progress) = with_progress(DownloadOptions::new().directory(dir.path()));
    let (options, rx) = with_completion(options);
    let download = manager.download(server.url("/slow.bin"), options);

    progress.recv().await.unwrap();
    download.cancel();

    let outcome = wait_for(rx).await;
    assert!(outcome.error.unwrap().is_cancelled());
    assert!(download.resulting_path().is_none());
    assert!(!dir.path().join("slow.bin").exists());
    assert!(partial_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_resume_data_continues_transfer() {
    let content = create_test_content(64 * 1024);
    let server = TestServer::start(vec![(
        "/big.iso",
        Route::ok(content.clone())
            .resumable("\"v1\"")
            .slow(1024, Duration::from_millis(5)),
    )])
    .await;
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());

    let (options, mut progress) = with_progress(DownloadOptions::new().directory(dir.path()));
    let (options, rx) = with_completion(options);
    let download = manager.download(server.url("/big.iso"), options);
    progress.recv().await.unwrap();

    let (tx, data) = oneshot::channel();
    download.cancel_producing_resume_data(move |data| {
        let _ = tx.send(data);
    });
    let data = data.await.unwrap().expect("resume data");
    assert!(wait_for(rx).await.error.unwrap().is_cancelled());

    let resume = ResumeData::from_bytes(&data).unwrap();
    assert!(resume.offset > 0);
    assert_eq!(resume.validator.as_deref(), Some("\"v1\""));
    assert!(resume.partial_path.exists());

    let (options, rx) = with_completion(
        DownloadOptions::new()
            .directory(dir.path())
            .file_name("big.iso"),
    );
    let resumed = manager.download_with_resume_data(data, options);
    assert_eq!(resumed.url(), &server.url("/big.iso"));

    let outcome = wait_for(rx).await;
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_file_content(&dir.path().join("big.iso"), &content);
    assert!(!resume.partial_path.exists());

    let requests = server.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.header("range"), Some(format!("bytes={}-", resume.offset).as_str()));
    assert_eq!(last.header("if-range"), Some("\"v1\""));
}

#[tokio::test]
async fn test_resume_data_without_range_support_restarts() {
    let content = create_test_content(32 * 1024);
    let server = TestServer::start(vec![("/plain.bin", Route::ok(content.clone()))]).await;
    let dir = create_temp_dir();
    let partial = dir.path().join("stale.part");
    std::fs::write(&partial, b"garbage that must go away").unwrap();

    let data = ResumeData {
        url: server.url("/plain.bin").to_string(),
        headers: Vec::new(),
        partial_path: partial.clone(),
        offset: 25,
        validator: None,
    }
    .to_bytes()
    .unwrap();

    let manager = http_manager(dir.path());
    let (options, rx) = with_completion(
        DownloadOptions::new()
            .directory(dir.path())
            .file_name("plain.bin"),
    );
    manager.download_with_resume_data(data, options);

    assert!(wait_for(rx).await.error.is_none());
    assert_file_content(&dir.path().join("plain.bin"), &content);
}

#[tokio::test]
async fn test_invalid_resume_data_fails() {
    let dir = create_temp_dir();
    let manager = http_manager(dir.path());
    let (options, rx) = with_completion(DownloadOptions::new());
    manager.download_with_resume_data(b"not resume data".to_vec(), options);

    let outcome = wait_for(rx).await;
    assert!(matches!(
        outcome.error,
        Some(Error::Transport(trawl::TransportError::InvalidResumeData(_)))
    ));
}

#[tokio::test]
async fn test_background_session_survives_restart() {
    let content = create_test_content(10_000);
    let server = TestServer::start(vec![("/keep.bin", Route::ok(content.clone()))]).await;
    let state = create_temp_dir();
    let out = create_temp_dir();

    let build = || {
        init_tracing();
        SessionManagerBuilder::new()
            .identifier("tests.background")
            .background(state.path())
            .temp_dir(state.path())
            .retries(0)
            .auto_start(false)
            .build_with_transport(std::sync::Arc::new(HttpTransport::new()))
            .expect("Failed to build the session manager")
    };

    let first = build();
    let download = first.download(
        server.url("/keep.bin"),
        DownloadOptions::new().directory(out.path()).file_name("kept.bin"),
    );
    let task_id = download.task_id();
    first.flush().await;
    drop(download);
    drop(first);

    let second = build();
    let restored = second.download_for_task(task_id).expect("restored download");
    assert_eq!(restored.file_name().as_deref(), Some("kept.bin"));
    assert_eq!(restored.directory(), Some(out.path()));
    assert_eq!(restored.url(), &server.url("/keep.bin"));

    let (tx, rx) = oneshot::channel();
    restored.set_on_complete(move |_, error, _| {
        let _ = tx.send(error.cloned());
    });
    let (drained_tx, drained) = oneshot::channel();
    second.set_background_events_handler(move || {
        let _ = drained_tx.send(());
    });
    restored.resume();

    let error = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
    assert!(error.is_none(), "{:?}", error);
    assert_file_content(&out.path().join("kept.bin"), &content);
    tokio::time::timeout(WAIT, drained).await.unwrap().unwrap();

    // New tasks continue after the restored identifiers.
    let next = second.download(server.url("/keep.bin"), DownloadOptions::new());
    assert!(next.task_id() > task_id);
}
