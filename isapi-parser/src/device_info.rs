//! `/ISAPI/System/deviceInfo` response

use serde::Deserialize;

use crate::error::ParseResult;
use crate::xml_decode;

/// Identity of the recorder, used by hosts for naming
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "DeviceInfo")]
pub struct DeviceInfo {
    #[serde(rename = "deviceName", default)]
    pub device_name: Option<String>,

    #[serde(rename = "deviceID", default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(rename = "serialNumber", default)]
    pub serial_number: Option<String>,

    #[serde(rename = "macAddress", default)]
    pub mac_address: Option<String>,

    #[serde(rename = "firmwareVersion", default)]
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        xml_decode::parse(xml)
    }

    /// Best available display name: device name, then model, then serial
    pub fn display_name(&self) -> Option<&str> {
        [&self.device_name, &self.model, &self.serial_number]
            .into_iter()
            .find_map(|field| field.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    }
}

/// Decode a device info response, `None` if it does not parse
pub fn decode_device_info(xml: &str) -> Option<DeviceInfo> {
    DeviceInfo::from_xml(xml)
        .map_err(|e| tracing::debug!("Unparseable device info: {}", e))
        .ok()
}
