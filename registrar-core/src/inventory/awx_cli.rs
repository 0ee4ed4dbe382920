//! Inventory backed by the platform's command-line client.
//!
//! Every call spawns the CLI with connection flags followed by the
//! subcommand. Arguments go straight to the process, never through a shell,
//! so a hostile GUID cannot escape its argument slot.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::page::HostPage;
use super::{DEFAULT_INVENTORY_TIMEOUT, InventoryClient};
use crate::error::{InventoryResult, InventoryUnavailable};
use crate::types::{HostRecord, NewHost};

#[derive(Clone)]
pub struct AwxCliConfig {
    /// Path to the CLI binary.
    pub program: PathBuf,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub insecure: bool,
    /// Upper bound for one CLI invocation; the child is killed past it.
    pub timeout: Duration,
}

impl AwxCliConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            endpoint: None,
            token: None,
            insecure: false,
            timeout: DEFAULT_INVENTORY_TIMEOUT,
        }
    }
}

impl fmt::Debug for AwxCliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwxCliConfig")
            .field("program", &self.program)
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AwxCliInventory {
    config: AwxCliConfig,
}

impl AwxCliInventory {
    pub fn new(config: AwxCliConfig) -> Self {
        Self { config }
    }

    fn connection_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(7);
        if let Some(endpoint) = &self.config.endpoint {
            args.push("--conf.host".into());
            args.push(endpoint.into());
        }
        if let Some(token) = &self.config.token {
            args.push("--conf.token".into());
            args.push(token.into());
        }
        if self.config.insecure {
            args.push("--conf.insecure".into());
        }
        args.push("-f".into());
        args.push("json".into());
        args
    }

    /// Run one subcommand to completion and return its stdout.
    async fn run(
        &self,
        operation: &str,
        subcommand: &[&str],
    ) -> InventoryResult<Vec<u8>> {
        let mut command = Command::new(&self.config.program);
        command
            .args(self.connection_args())
            .args(subcommand)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output =
            match tokio::time::timeout(self.config.timeout, command.output())
                .await
            {
                Ok(Ok(output)) => output,
                Ok(Err(err)) => {
                    return Err(InventoryUnavailable::new(format!(
                        "failed to run {}: {err}",
                        self.config.program.display()
                    )));
                }
                Err(_) => {
                    return Err(InventoryUnavailable::timeout(
                        operation,
                        self.config.timeout,
                    ));
                }
            };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InventoryUnavailable::new(format!(
                "{operation} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl InventoryClient for AwxCliInventory {
    async fn list_hosts(&self) -> InventoryResult<Vec<HostRecord>> {
        let stdout = self.run("host list", &["host", "list", "--all"]).await?;
        let hosts = HostPage::parse(&stdout)?.into_hosts();
        debug!(hosts = hosts.len(), "listed inventory hosts via cli");
        Ok(hosts)
    }

    async fn create_host(&self, host: &NewHost) -> bool {
        let variables = match host.variables.to_payload() {
            Ok(variables) => variables,
            Err(err) => {
                warn!(host = %host.name, error = %err, "could not encode host variables");
                return false;
            }
        };
        let inventory = host.inventory_id.to_string();

        match self
            .run(
                "host create",
                &[
                    "host",
                    "create",
                    "--name",
                    &host.name,
                    "--inventory",
                    &inventory,
                    "--variables",
                    &variables,
                ],
            )
            .await
        {
            Ok(stdout) => {
                let output = String::from_utf8_lossy(&stdout);
                debug!(
                    host = %host.name,
                    output = %output.trim(),
                    "created inventory host via cli"
                );
                true
            }
            Err(err) => {
                warn!(host = %host.name, error = %err, "cli host create failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_args_follow_config() {
        let mut config = AwxCliConfig::new("/usr/local/bin/awx");
        config.endpoint = Some("https://awx.example.com".into());
        config.token = Some("s3cret".into());
        config.insecure = true;
        let args = AwxCliInventory::new(config).connection_args();
        let args: Vec<_> =
            args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--conf.host",
                "https://awx.example.com",
                "--conf.token",
                "s3cret",
                "--conf.insecure",
                "-f",
                "json"
            ]
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let mut config = AwxCliConfig::new("awx");
        config.token = Some("s3cret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("********"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let inventory = AwxCliInventory::new(AwxCliConfig::new(
            "/nonexistent/registrar-test/awx",
        ));
        let err = inventory.list_hosts().await.unwrap_err();
        assert!(err.reason.contains("failed to run"));
        assert!(!inventory.create_host(&NewHost::for_device(&"abc".into(), 1)).await);
    }
}
