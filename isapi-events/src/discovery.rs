//! Channel discovery at session start

use tracing::{debug, info, warn};

use isapi_client::{paths, IsapiClient, StatusCode};
use isapi_parser::{decode_channel_ids, ChannelId};

/// Endpoints listing channels, tried in order
pub const DISCOVERY_PATHS: [&str; 2] = [paths::VIDEO_INPUT_CHANNELS, paths::INPUT_PROXY_CHANNELS];

/// Channel IDs from the first endpoint that answers 200 with at least one ID.
///
/// Failures and empty lists fall through to the next endpoint; when none
/// yields anything the result is empty and channels appear as events arrive.
pub async fn discover_channels(client: &IsapiClient) -> Vec<ChannelId> {
    for path in DISCOVERY_PATHS {
        match client.fetch_text(path).await {
            Ok((StatusCode::OK, body)) => {
                let channels = decode_channel_ids(&body);
                if !channels.is_empty() {
                    info!("Discovered {} channel(s) via {}: {:?}", channels.len(), path, channels);
                    return channels;
                }
                debug!("No channel IDs in {} response", path);
            }
            Ok((status, _)) => debug!("Channel discovery via {} returned HTTP {}", path, status),
            Err(e) => warn!("Channel discovery via {} failed: {}", path, e),
        }
    }

    info!("No channels discovered; channels will be added as events arrive");
    Vec::new()
}
