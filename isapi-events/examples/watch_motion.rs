//! Print channel state changes from a recorder until Ctrl-C
//!
//! Run with:
//! ISAPI_HOST=192.168.1.64 ISAPI_USER=admin ISAPI_PASSWORD=secret ISAPI_LOG_MODE=development \
//!     cargo run -p isapi-events --example watch_motion

use std::sync::Arc;

use isapi_events::logging::init_logging_from_env;
use isapi_events::{EventSession, JsonFileTimeoutStore, SensorKind, SessionConfig, SessionError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let env = |key: &str| std::env::var(key).unwrap_or_default();
    let mut config = SessionConfig::new(env("ISAPI_HOST"), env("ISAPI_USER"), env("ISAPI_PASSWORD"));
    if let Ok(port) = env("ISAPI_PORT").parse() {
        config = config.with_port(port);
    }

    println!("Checking {}:{} ...", config.host, config.port);
    match EventSession::validate(&config).await {
        Ok(()) => {}
        Err(SessionError::CannotConnect(reason)) => {
            println!("Cannot reach the recorder: {reason}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let store = Arc::new(JsonFileTimeoutStore::for_session(
        std::env::temp_dir(),
        &config.session_key(),
    ));
    let session = EventSession::start(config, store).await?;

    if let Some(name) = session.device_info().and_then(|info| info.display_name()) {
        println!("Connected to {name}");
    }
    println!("Channels: {:?}", session.registry().channel_ids());

    let _states = session.registry().add_state_listener(|state| {
        let on: Vec<&str> = SensorKind::ALL
            .iter()
            .filter(|kind| state.is_on(**kind))
            .map(|kind| kind.as_str())
            .collect();
        println!(
            "channel {:>2}: [{}] last={} at {}",
            state.channel_id,
            on.join(", "),
            state.last_event_state.as_deref().unwrap_or("-"),
            state.last_event_time.as_deref().unwrap_or("-"),
        );
    });
    let _channels = session
        .registry()
        .add_channel_listener(|channel| println!("new channel {channel}"));

    let mut status = session.subscribe_status();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            while status.changed().await.is_ok() {
                println!("stream: {:?}", *status.borrow());
            }
        } => {}
    }

    session.shutdown().await?;
    Ok(())
}
