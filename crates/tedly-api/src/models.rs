// Wire models for the tedee HTTP API.
//
// Every response body is wrapped in `{ "result": ... }`; the envelope is
// stripped by the client before callers see the payload.

use serde::{Deserialize, Deserializer, Serialize};
use strum::Display;

/// Response envelope shared by every API endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: T,
}

/// Token endpoint response (password grant).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the token in seconds. B2C sends it as a string.
    #[serde(deserialize_with = "u64_or_string")]
    pub expires_in: u64,
}

/// A lock as returned by the inventory endpoint (`GET /my/lock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub device_revision: u32,
    #[serde(default)]
    pub software_versions: Vec<SoftwareVersion>,
    #[serde(default, rename = "deviceSettings", alias = "settings")]
    pub settings: Option<DeviceSettings>,
    #[serde(default, rename = "lockProperties", alias = "properties")]
    pub properties: Option<LockProperties>,
}

impl LockRecord {
    /// Firmware version of the lock itself (software type 0).
    pub fn firmware_version(&self) -> Option<&str> {
        self.software_versions
            .iter()
            .find(|s| s.software_type == 0)
            .map(|s| s.version.as_str())
    }

    /// Merge a partial sync payload into this record.
    ///
    /// Only the mutable properties travel over sync; a payload without
    /// properties leaves the record untouched and returns `false`.
    pub fn apply_sync(&mut self, sync: &LockSync) -> bool {
        let Some(properties) = sync.properties else {
            return false;
        };
        self.properties = Some(properties);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareVersion {
    pub software_type: u8,
    pub version: String,
}

/// Per-lock settings relevant to latch handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettings {
    #[serde(default)]
    pub pull_spring_enabled: bool,
    #[serde(default)]
    pub auto_pull_spring_enabled: bool,
}

/// Mutable lock state: the vendor status code and battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockProperties {
    /// Vendor status code, 0..=8.
    pub state: u8,
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_charging: bool,
}

/// Partial sync payload (`GET /my/lock/sync`, `GET /my/lock/{id}/sync`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSync {
    pub id: u64,
    #[serde(default, rename = "lockProperties", alias = "properties")]
    pub properties: Option<LockProperties>,
}

/// Handle for a vendor-side asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub operation_id: String,
    pub status: OperationStatus,
}

/// Body of `GET /my/device/operation/{operationId}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OperationState {
    pub status: OperationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Completed,
    #[serde(other)]
    Unknown,
}

/// The three commands the lock accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum LockOperation {
    Open,
    Close,
    PullSpring,
}

impl LockOperation {
    /// Path of the create-operation endpoint, relative to the API base.
    pub fn path(self) -> &'static str {
        match self {
            Self::Open => "my/lock/open",
            Self::Close => "my/lock/close",
            Self::PullSpring => "my/lock/pull-spring",
        }
    }
}

/// Older firmware reports `isCharging` as 0/1 instead of a boolean.
fn bool_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

fn u64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Int(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Int(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn lock_record_parses_vendor_payload() {
        let lock: LockRecord = serde_json::from_value(json!({
            "id": 1234,
            "name": "Front Door",
            "serialNumber": "17420103-000001",
            "deviceRevision": 2,
            "softwareVersions": [
                { "softwareType": 0, "version": "2.2.11046" },
                { "softwareType": 1, "version": "1.0.0" }
            ],
            "deviceSettings": { "pullSpringEnabled": true, "autoPullSpringEnabled": false },
            "lockProperties": { "state": 6, "batteryLevel": 80, "isCharging": false }
        }))
        .unwrap();

        assert_eq!(lock.firmware_version(), Some("2.2.11046"));
        assert_eq!(
            lock.settings,
            Some(DeviceSettings {
                pull_spring_enabled: true,
                auto_pull_spring_enabled: false,
            })
        );
        assert_eq!(lock.properties.unwrap().state, 6);
    }

    #[test]
    fn missing_blocks_deserialize_as_none() {
        let lock: LockRecord =
            serde_json::from_value(json!({ "id": 1, "name": "Back Door" })).unwrap();

        assert!(lock.settings.is_none());
        assert!(lock.properties.is_none());
        assert_eq!(lock.firmware_version(), None);
    }

    #[test]
    fn is_charging_accepts_numeric_flag() {
        let props: LockProperties =
            serde_json::from_value(json!({ "state": 2, "batteryLevel": 5, "isCharging": 1 }))
                .unwrap();
        assert!(props.is_charging);
    }

    #[test]
    fn apply_sync_without_properties_keeps_record() {
        let mut lock: LockRecord = serde_json::from_value(json!({
            "id": 1,
            "name": "Back Door",
            "lockProperties": { "state": 6, "batteryLevel": 50 }
        }))
        .unwrap();

        assert!(!lock.apply_sync(&LockSync {
            id: 1,
            properties: None
        }));
        assert_eq!(lock.properties.unwrap().state, 6);
    }

    #[test]
    fn token_lifetime_accepts_number_or_string() {
        let numeric: TokenResponse =
            serde_json::from_value(json!({ "access_token": "a", "expires_in": 3600 })).unwrap();
        assert_eq!(numeric.expires_in, 3600);

        let text: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","token_type":"Bearer","expires_in":"3600"}"#,
        )
        .unwrap();
        assert_eq!(text.expires_in, 3600);

        assert!(
            serde_json::from_value::<TokenResponse>(
                json!({ "access_token": "a", "expires_in": "soon" })
            )
            .is_err()
        );
    }

    #[test]
    fn operation_status_tolerates_unknown_values() {
        let handle: OperationHandle =
            serde_json::from_value(json!({ "operationId": "op-1", "status": "QUEUED" })).unwrap();
        assert_eq!(handle.status, OperationStatus::Unknown);
    }
}
