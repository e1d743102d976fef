//! Mock recorder for end-to-end session tests.
//!
//! Speaks just enough HTTP/1.1 for the client: every request without digest
//! credentials for the expected user gets a 401 challenge, authorized
//! requests are routed to canned ISAPI responses, and `alertStream` answers
//! with a close-delimited multipart body.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "12345";

const CHALLENGE: &str =
    r#"Digest realm="MockNVR", nonce="6d6f636b6e6f6e6365", qop="auth", opaque="0a1b2c""#;

const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DeviceInfo version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<deviceName>Test NVR</deviceName><model>DS-7608NI-K2</model><serialNumber>TEST0001</serialNumber>
</DeviceInfo>"#;

const PROXY_CHANNELS: &str = r#"<InputProxyChannelList version="2.0">
<InputProxyChannel><id>1</id></InputProxyChannel>
<InputProxyChannel><id>2</id></InputProxyChannel>
</InputProxyChannelList>"#;

/// A multipart part carrying one alert document
pub fn alert(channel: u32, event_type: &str, state: &str, target: Option<&str>) -> String {
    let target = target
        .map(|t| {
            format!(
                "<DetectionRegionList><DetectionRegionEntry>\
                 <targetType>{t}</targetType></DetectionRegionEntry></DetectionRegionList>"
            )
        })
        .unwrap_or_default();
    let doc = format!(
        "<EventNotificationAlert version=\"2.0\" xmlns=\"http://www.hikvision.com/ver20/XMLSchema\">\
         <channelID>{channel}</channelID><dateTime>2024-05-04T12:00:00+00:00</dateTime>\
         <eventType>{event_type}</eventType><eventState>{state}</eventState>{target}\
         </EventNotificationAlert>"
    );
    format!(
        "--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\nContent-Length: {}\r\n\r\n{}\r\n",
        doc.len(),
        doc
    )
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorized: bool,
}

/// What `alertStream` does after writing its parts
#[derive(Debug, Clone, Copy)]
pub enum StreamEnd {
    Hold,
    Close,
}

pub struct MockDevice {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stream_opens: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockDevice {
    pub async fn start(parts: Vec<String>, end: StreamEnd) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let stream_opens = Arc::new(AtomicUsize::new(0));
        let parts = Arc::new(parts);

        let task = {
            let requests = Arc::clone(&requests);
            let stream_opens = Arc::clone(&stream_opens);
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let requests = Arc::clone(&requests);
                    let stream_opens = Arc::clone(&stream_opens);
                    let parts = Arc::clone(&parts);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, requests, stream_opens, parts, end).await {
                            eprintln!("mock device connection error: {e}");
                        }
                    });
                }
            })
        };

        Self {
            port,
            requests,
            stream_opens,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of authorized requests, in arrival order
    pub fn authorized_paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.authorized)
            .map(|r| r.path)
            .collect()
    }

    /// Authorized `alertStream` responses started so far
    pub fn stream_opens(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    stream_opens: Arc<AtomicUsize>,
    parts: Arc<Vec<String>>,
    end: StreamEnd,
) -> std::io::Result<()> {
    let head = read_head(&mut socket).await?;
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let authorized = head.lines().any(|line| {
        line.to_ascii_lowercase().starts_with("authorization:")
            && line.contains(&format!("Digest username=\"{USERNAME}\""))
    });
    requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        authorized,
    });

    if !authorized {
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: {CHALLENGE}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(response.as_bytes()).await?;
        return socket.shutdown().await;
    }

    match path.as_str() {
        "/ISAPI/System/deviceInfo" => respond(&mut socket, "200 OK", DEVICE_INFO).await,
        "/ISAPI/ContentMgmt/InputProxy/channels" => respond(&mut socket, "200 OK", PROXY_CHANNELS).await,
        "/ISAPI/Event/notification/alertStream" => {
            stream_opens.fetch_add(1, Ordering::SeqCst);
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: multipart/mixed; boundary=boundary\r\nConnection: close\r\n\r\n",
                )
                .await?;
            for part in parts.iter() {
                socket.write_all(part.as_bytes()).await?;
                socket.flush().await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            match end {
                StreamEnd::Hold => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
                StreamEnd::Close => socket.shutdown().await,
            }
        }
        _ => respond(&mut socket, "404 Not Found", "").await,
    }
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

async fn read_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Poll `condition` every 20ms until it holds or `limit` passes
pub async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
