//! Channel discovery fallbacks against a mock recorder

use mockito::{Server, ServerGuard};

use isapi_client::{paths, ClientConfig, IsapiClient};
use isapi_events::discovery::discover_channels;

fn client_for(server: &ServerGuard) -> IsapiClient {
    let (host, port) = server
        .host_with_port()
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.parse::<u16>().unwrap()))
        .unwrap();
    IsapiClient::new(&ClientConfig::new(host, "admin", "12345").with_port(port)).unwrap()
}

const VIDEO_INPUTS: &str = r#"<VideoInputChannelList version="2.0">
<VideoInputChannel><id>1</id><inputPort>1</inputPort></VideoInputChannel>
<VideoInputChannel><id>2</id><inputPort>2</inputPort></VideoInputChannel>
</VideoInputChannelList>"#;

const PROXY_CHANNELS: &str = r#"<InputProxyChannelList version="2.0">
<InputProxyChannel><id>33</id><name>Gate</name></InputProxyChannel>
<InputProxyChannel><id>34</id><name>Yard</name></InputProxyChannel>
</InputProxyChannelList>"#;

#[tokio::test]
async fn test_first_endpoint_wins() {
    let mut server = Server::new_async().await;
    let inputs = server
        .mock("GET", paths::VIDEO_INPUT_CHANNELS)
        .with_status(200)
        .with_body(VIDEO_INPUTS)
        .create_async()
        .await;
    let proxy = server
        .mock("GET", paths::INPUT_PROXY_CHANNELS)
        .with_status(200)
        .with_body(PROXY_CHANNELS)
        .expect(0)
        .create_async()
        .await;

    assert_eq!(discover_channels(&client_for(&server)).await, vec![1, 2]);
    inputs.assert_async().await;
    proxy.assert_async().await;
}

#[tokio::test]
async fn test_falls_back_on_error_status() {
    let mut server = Server::new_async().await;
    let _inputs = server
        .mock("GET", paths::VIDEO_INPUT_CHANNELS)
        .with_status(404)
        .create_async()
        .await;
    let _proxy = server
        .mock("GET", paths::INPUT_PROXY_CHANNELS)
        .with_status(200)
        .with_body(PROXY_CHANNELS)
        .create_async()
        .await;

    assert_eq!(discover_channels(&client_for(&server)).await, vec![33, 34]);
}

#[tokio::test]
async fn test_falls_back_on_empty_list() {
    let mut server = Server::new_async().await;
    let _inputs = server
        .mock("GET", paths::VIDEO_INPUT_CHANNELS)
        .with_status(200)
        .with_body("<VideoInputChannelList version=\"2.0\"/>")
        .create_async()
        .await;
    let _proxy = server
        .mock("GET", paths::INPUT_PROXY_CHANNELS)
        .with_status(200)
        .with_body(PROXY_CHANNELS)
        .create_async()
        .await;

    assert_eq!(discover_channels(&client_for(&server)).await, vec![33, 34]);
}

#[tokio::test]
async fn test_nothing_found_is_empty() {
    let mut server = Server::new_async().await;
    let _inputs = server
        .mock("GET", paths::VIDEO_INPUT_CHANNELS)
        .with_status(500)
        .create_async()
        .await;
    let _proxy = server
        .mock("GET", paths::INPUT_PROXY_CHANNELS)
        .with_status(403)
        .create_async()
        .await;

    assert!(discover_channels(&client_for(&server)).await.is_empty());
}
