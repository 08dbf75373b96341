use serde::{Deserialize, Serialize};

use crate::error::MemloadError;

/// Device types the loader knows how to route.
pub const DEVICE_TYPES: [&str; 4] = ["idfa", "gaid", "adid", "dvid"];

/// One parsed log line: a device and the applications installed on it.
///
/// Only constructed by the parser once every field has validated, so a value
/// of this type always has a non-empty device type and id and finite
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AppsInstalled {
    pub dev_type: String,
    pub dev_id: String,
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<u32>,
}

impl AppsInstalled {
    /// Store key for this device: `{dev_type}:{dev_id}`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.dev_type, self.dev_id)
    }
}

/// Value stored under a device key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserApps {
    pub apps: Vec<u32>,
    pub lat: f64,
    pub lon: f64,
}

impl UserApps {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MemloadError> {
        rmp_serde::to_vec(self).map_err(|e| MemloadError::Serialize(e.to_string()))
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemloadError> {
        rmp_serde::from_slice(bytes).map_err(|e| MemloadError::Deserialize(e.to_string()))
    }
}

impl From<&AppsInstalled> for UserApps {
    fn from(record: &AppsInstalled) -> Self {
        Self {
            apps: record.apps.clone(),
            lat: record.lat,
            lon: record.lon,
        }
    }
}

/// A single store write: key plus encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub key: String,
    pub payload: Vec<u8>,
}

/// Tasks flushed together to one destination.
pub type Batch = Vec<Task>;
