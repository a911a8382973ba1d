//! Local HTTP fixture for the integration tests
//!
//! Serves canned HTML pages and media blobs over plain HTTP/1.1 with
//! `Connection: close`. Media routes honour `Range: bytes=N-` the way the
//! source CDNs do (206 + Content-Range, 416 past the end). Tests can make the
//! next N requests to a path fail with 500, cut the next body short, or hold
//! back response headers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
enum Route {
    Page(String),
    Media(Arc<Vec<u8>>),
}

#[derive(Default)]
struct State {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
    failures: HashMap<String, usize>,
    cutoffs: HashMap<String, usize>,
    range_starts: HashMap<String, Vec<u64>>,
    header_delays: HashMap<String, Duration>,
    throttle: Option<(usize, Duration)>,
}

#[derive(Clone)]
pub struct FixtureServer {
    pub base: String,
    state: Arc<Mutex<State>>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn page(&self, path: &str, html: &str) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(path.to_string(), Route::Page(html.to_string()));
    }

    pub fn media(&self, path: &str, body: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(path.to_string(), Route::Media(Arc::new(body)));
    }

    /// Send media bodies `bytes` at a time with `pause` between slices
    pub fn throttle(&self, bytes: usize, pause: Duration) {
        self.state.lock().unwrap().throttle = Some((bytes.max(1), pause));
    }

    /// Answer the next `count` requests for `path` with 500
    pub fn fail_next(&self, path: &str, count: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(path.to_string(), count);
    }

    /// Close the connection after `bytes` of the next media body
    pub fn cut_next(&self, path: &str, bytes: usize) {
        self.state
            .lock()
            .unwrap()
            .cutoffs
            .insert(path.to_string(), bytes);
    }

    /// Wait `delay` before sending the response head for every request to `path`
    pub fn delay_headers(&self, path: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .header_delays
            .insert(path.to_string(), delay);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.lock().unwrap().hits.get(path).copied().unwrap_or(0)
    }

    /// Start offset of every media request to `path` (0 when no Range)
    pub fn range_starts(&self, path: &str) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .range_starts
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

/// Deterministic media payload of `len` bytes
pub fn media_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check().await
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let request = String::from_utf8_lossy(&request).to_string();
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let range_start = request
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("range").then(|| value.trim().to_string())
        })
        .and_then(|value| {
            value
                .strip_prefix("bytes=")?
                .trim_end_matches('-')
                .parse::<u64>()
                .ok()
        });

    let (route, fail, cutoff, throttle, header_delay) = {
        let mut state = state.lock().unwrap();
        *state.hits.entry(path.clone()).or_default() += 1;

        let fail = match state.failures.get_mut(&path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        let route = state.routes.get(&path).cloned();
        if matches!(route, Some(Route::Media(_))) && !fail {
            state
                .range_starts
                .entry(path.clone())
                .or_default()
                .push(range_start.unwrap_or(0));
        }
        let cutoff = if fail { None } else { state.cutoffs.remove(&path) };
        let header_delay = state.header_delays.get(&path).copied();
        (route, fail, cutoff, state.throttle, header_delay)
    };

    if let Some(delay) = header_delay {
        tokio::time::sleep(delay).await;
    }

    if fail {
        return respond(&mut stream, "500 Internal Server Error", &[], b"upstream error").await;
    }

    match route {
        None => respond(&mut stream, "404 Not Found", &[], b"not found").await,
        Some(Route::Page(html)) => {
            respond(
                &mut stream,
                "200 OK",
                &[("Content-Type", "text/html; charset=utf-8".to_string())],
                html.as_bytes(),
            )
            .await
        }
        Some(Route::Media(body)) => {
            let len = body.len() as u64;
            let start = range_start.unwrap_or(0);

            if range_start.is_some() && start >= len {
                return respond(
                    &mut stream,
                    "416 Range Not Satisfiable",
                    &[("Content-Range", format!("bytes */{}", len))],
                    b"",
                )
                .await;
            }

            let slice = &body[start as usize..];
            let (status, mut headers) = if range_start.is_some() {
                (
                    "206 Partial Content",
                    vec![(
                        "Content-Range",
                        format!("bytes {}-{}/{}", start, len - 1, len),
                    )],
                )
            } else {
                ("200 OK", Vec::new())
            };
            headers.push(("Content-Type", "video/mp4".to_string()));
            headers.push(("Accept-Ranges", "bytes".to_string()));

            write_head(&mut stream, status, &headers, slice.len()).await?;

            let limit = cutoff.unwrap_or(slice.len()).min(slice.len());
            let (step, pause) = throttle.unwrap_or((slice.len().max(1), Duration::ZERO));
            let mut sent = 0;
            while sent < limit {
                let end = (sent + step).min(limit);
                stream.write_all(&slice[sent..end]).await?;
                stream.flush().await?;
                sent = end;
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            stream.shutdown().await
        }
    }
}

async fn write_head(
    stream: &mut TcpStream,
    status: &str,
    headers: &[(&str, String)],
    content_length: usize,
) -> std::io::Result<()> {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, content_length);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    headers: &[(&str, String)],
    body: &[u8],
) -> std::io::Result<()> {
    write_head(stream, status, headers, body.len()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    stream.shutdown().await
}
