//! Request/retry behaviour against a mock recorder

use mockito::{Matcher, Server, ServerGuard};

use isapi_client::{paths, ClientConfig, ClientError, IsapiClient, Method, StatusCode};

const CHALLENGE: &str = r#"Digest realm="DS-7608NI", nonce="4e6a4d7a5a6a63334f5445", qop="auth""#;

fn client_for(server: &ServerGuard) -> IsapiClient {
    let (host, port) = server
        .host_with_port()
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.parse::<u16>().unwrap()))
        .unwrap();
    IsapiClient::new(&ClientConfig::new(host, "admin", "12345").with_port(port)).unwrap()
}

fn digest_header() -> Matcher {
    Matcher::Regex(r#"^Digest username="admin", realm="DS-7608NI", nonce="4e6a4d7a5a6a63334f5445", uri="/ISAPI/System/deviceInfo", algorithm=MD5, response="[0-9a-f]{32}", qop=auth, nc=0000000[12], cnonce="[0-9a-f]{16}"$"#.to_string())
}

#[tokio::test]
async fn test_401_then_digest_retry_succeeds() {
    let mut server = Server::new_async().await;
    let challenge = server
        .mock("GET", paths::DEVICE_INFO)
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header("WWW-Authenticate", r#"Basic realm="DS-7608NI""#)
        .with_header("WWW-Authenticate", CHALLENGE)
        .expect(1)
        .create_async()
        .await;
    let authorized = server
        .mock("GET", paths::DEVICE_INFO)
        .match_header("authorization", digest_header())
        .with_status(200)
        .with_body("<DeviceInfo><deviceName>NVR</deviceName><model>DS-7608NI-K2</model></DeviceInfo>")
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server);
    assert!(client.validate_device_info().await);

    // The challenge is remembered: no second 401 round trip
    let info = client.fetch_device_info().await.unwrap();
    assert_eq!(info.device_name.as_deref(), Some("NVR"));

    challenge.assert_async().await;
    authorized.assert_async().await;
}

#[tokio::test]
async fn test_second_401_is_returned_to_caller() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", paths::DEVICE_INFO)
        .with_status(401)
        .with_header("WWW-Authenticate", CHALLENGE)
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client.request(Method::GET, paths::DEVICE_INFO).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_validate_device_info_false_on_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", paths::DEVICE_INFO)
        .with_status(403)
        .create_async()
        .await;

    let client = client_for(&server);
    assert!(!client.validate_device_info().await);
    assert!(client.fetch_device_info().await.is_none());
}

#[tokio::test]
async fn test_validate_device_info_false_when_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = IsapiClient::new(&ClientConfig::new("127.0.0.1", "admin", "12345").with_port(port)).unwrap();
    assert!(!client.validate_device_info().await);
}

#[tokio::test]
async fn test_event_stream_reads_until_close() {
    let mut server = Server::new_async().await;
    let body = "--boundary\r\n\r\n<EventNotificationAlert><channelID>1</channelID></EventNotificationAlert>\r\n";
    let _mock = server
        .mock("GET", paths::ALERT_STREAM)
        .with_status(200)
        .with_header("content-type", "multipart/mixed; boundary=boundary")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut stream = client.open_event_stream(paths::ALERT_STREAM).await.unwrap();

    let mut received = Vec::new();
    while let Some(chunk) = stream.next_chunk().await.unwrap() {
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, body.as_bytes());
    assert_eq!(stream.bytes_read(), body.len() as u64);
}

#[tokio::test]
async fn test_event_stream_non_200_carries_excerpt() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", paths::ALERT_STREAM)
        .with_status(503)
        .with_body("x".repeat(500))
        .create_async()
        .await;

    let client = client_for(&server);
    match client.open_event_stream(paths::ALERT_STREAM).await {
        Err(ClientError::UnexpectedStatus { status, excerpt }) => {
            assert_eq!(status, 503);
            assert_eq!(excerpt, "x".repeat(200));
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_event_stream_rejected_credentials() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", paths::ALERT_STREAM)
        .with_status(401)
        .with_header("WWW-Authenticate", CHALLENGE)
        .create_async()
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.open_event_stream(paths::ALERT_STREAM).await,
        Err(ClientError::Unauthorized)
    ));
}
