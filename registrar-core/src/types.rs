use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque device identifier taken from a voucher file name.
///
/// No format is enforced: onboarding decides what a GUID looks like and the
/// registrar only ever compares them for equality. The value is untrusted, so
/// it must never be spliced into a shell command line.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceGuid(String);

impl DeviceGuid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceGuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceGuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceGuid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DeviceGuid {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A host as reported by the automation platform.
///
/// Only the fields the registrar reads are modelled; the platform returns
/// many more and they are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub inventory: Option<u64>,
    /// Raw YAML or JSON text, exactly as stored by the platform.
    #[serde(default)]
    pub variables: Option<String>,
}

impl HostRecord {
    /// Parse the variables payload. A missing or blank payload is an empty
    /// variable set, not an error.
    pub fn parsed_variables(&self) -> Result<HostVariables, serde_yaml::Error> {
        match self.variables.as_deref() {
            Some(raw) => HostVariables::parse(raw),
            None => Ok(HostVariables::default()),
        }
    }
}

/// Schema for a host's variables payload.
///
/// `guid` links the host back to its device. Every other key is kept in
/// `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostVariables {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl HostVariables {
    /// Variables written for a freshly registered device.
    pub fn for_device(guid: &DeviceGuid) -> Self {
        Self {
            guid: Some(guid.as_str().to_owned()),
            extra: BTreeMap::new(),
        }
    }

    /// Parse YAML (and therefore JSON) variables text.
    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "---" {
            return Ok(Self::default());
        }
        serde_yaml::from_str(trimmed)
    }

    pub fn claims(&self, guid: &DeviceGuid) -> bool {
        self.guid.as_deref() == Some(guid.as_str())
    }

    /// Render as JSON, which the platform accepts wherever it accepts YAML.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Request to append a host to the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHost {
    pub name: String,
    pub inventory_id: u64,
    pub variables: HostVariables,
}

impl NewHost {
    /// By convention the host is named after the device it represents.
    pub fn for_device(guid: &DeviceGuid, inventory_id: u64) -> Self {
        Self {
            name: guid.as_str().to_owned(),
            inventory_id,
            variables: HostVariables::for_device(guid),
        }
    }
}

/// Result of asking the inventory whether a GUID already has a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Registered,
    NotRegistered,
    /// The inventory could not be read; proceeding would risk a duplicate.
    Unknown,
}

/// Terminal outcome of one reconciliation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The GUID has no voucher.
    NotFound,
    AlreadyRegistered,
    Registered,
    /// Registration state could not be determined.
    CheckFailed,
    RegisterFailed,
}

impl ReconcileOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::AlreadyRegistered | Self::Registered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyRegistered => "already_registered",
            Self::Registered => "registered",
            Self::CheckFailed => "check_failed",
            Self::RegisterFailed => "register_failed",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
