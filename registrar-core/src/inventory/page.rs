use serde::Deserialize;
use tracing::warn;

use crate::error::{InventoryResult, InventoryUnavailable};
use crate::types::HostRecord;

/// One page of the platform's paginated host listing. The CLI prints the same
/// envelope as the REST API.
#[derive(Debug, Deserialize)]
pub(crate) struct HostPage {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

impl HostPage {
    pub(crate) fn parse(bytes: &[u8]) -> InventoryResult<Self> {
        serde_json::from_slice(bytes).map_err(|err| {
            InventoryUnavailable::new(format!("unparseable host list: {err}"))
        })
    }

    /// Decode each entry on its own so one odd record cannot hide the rest.
    pub(crate) fn into_hosts(self) -> Vec<HostRecord> {
        self.results
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<HostRecord>(raw) {
                Ok(host) => Some(host),
                Err(err) => {
                    warn!(error = %err, "skipping malformed host record");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_records_are_dropped_individually() {
        let body = br#"{
            "count": 3,
            "next": null,
            "results": [
                {"id": 1, "name": "abc123", "inventory": 1, "variables": "guid: abc123"},
                {"id": 2, "name": null},
                {"id": 3, "name": "def456", "inventory": 1, "variables": ""}
            ]
        }"#;
        let hosts = HostPage::parse(body).unwrap().into_hosts();
        let names: Vec<_> = hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["abc123", "def456"]);
    }

    #[test]
    fn garbage_is_unavailable() {
        let err = HostPage::parse(b"Error: not authenticated").unwrap_err();
        assert!(err.reason.contains("unparseable host list"));
    }
}
