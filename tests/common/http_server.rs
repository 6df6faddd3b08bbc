//! A tiny HTTP/1.1 server serving fixed bodies, with `Range` support.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the server answers on one path.
#[derive(Clone, Debug)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    /// Honour `Range: bytes=<n>-` requests.
    pub ranges: bool,
    pub etag: Option<String>,
    pub content_disposition: Option<String>,
    pub chunk_size: usize,
    /// Pause between two body chunks.
    pub chunk_delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            ranges: false,
            etag: None,
            content_disposition: None,
            chunk_size: 16 * 1024,
            chunk_delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Route::ok(b"nope".to_vec())
        }
    }

    pub fn resumable(mut self, etag: &str) -> Self {
        self.ranges = true;
        self.etag = Some(etag.to_string());
        self
    }

    pub fn slow(mut self, chunk_size: usize, delay: Duration) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_delay = Some(delay);
        self
    }

    pub fn attachment(mut self, file_name: &str) -> Self {
        self.content_disposition = Some(format!("attachment; filename=\"{}\"", file_name));
        self
    }
}

/// A request as seen by the server.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let routes: Arc<HashMap<String, Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, &routes, &seen).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    stream: TcpStream,
    routes: &HashMap<String, Route>,
    seen: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let path = line.split_whitespace().nth(1).unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.trim_end().split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let request = RecordedRequest { path, headers };
    seen.lock().unwrap().push(request.clone());

    let route = routes
        .get(&request.path)
        .cloned()
        .unwrap_or_else(|| Route::status(404));
    let total = route.body.len();
    let offset = request
        .header("range")
        .and_then(|range| range.strip_prefix("bytes="))
        .and_then(|range| range.trim_end_matches('-').parse::<usize>().ok())
        .filter(|offset| route.ranges && route.status == 200 && *offset < total);

    let (status, reason, body) = match offset {
        Some(offset) => (206, "Partial Content", &route.body[offset..]),
        None if route.status == 200 => (200, "OK", &route.body[..]),
        None => (route.status, "Error", &route.body[..]),
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason,
        body.len()
    );
    if let Some(offset) = offset {
        head.push_str(&format!(
            "Content-Range: bytes {}-{}/{}\r\n",
            offset,
            total - 1,
            total
        ));
    }
    if route.ranges {
        head.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(etag) = &route.etag {
        head.push_str(&format!("ETag: {}\r\n", etag));
    }
    if let Some(disposition) = &route.content_disposition {
        head.push_str(&format!("Content-Disposition: {}\r\n", disposition));
    }
    head.push_str("\r\n");

    let mut stream = reader.into_inner();
    stream.write_all(head.as_bytes()).await?;
    for chunk in body.chunks(route.chunk_size.max(1)) {
        stream.write_all(chunk).await?;
        stream.flush().await?;
        if let Some(delay) = route.chunk_delay {
            tokio::time::sleep(delay).await;
        }
    }
    stream.shutdown().await
}
