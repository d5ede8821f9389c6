//! Remote Command Executor
//!
//! Turns a (zone, name) pair into one administrative command for the remote
//! DNS server, runs it through a [`RemoteShell`] and classifies the output.
//!
//! The remote output is unstructured text. Success is inferred from the
//! absence of the [`ERROR_MARKER`] substring, nothing stricter.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::{CnameUpdater, RemoteShell};

/// Substring in command output that marks a failed update
pub const ERROR_MARKER: &str = "Error";

/// The `Add-DnsServerResourceRecordCName` invocation for one record
///
/// The record aliases the zone apex: `name.zone CNAME zone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameCommand {
    zone: String,
    name: String,
}

impl CnameCommand {
    /// Build the command, rejecting values that are not plain DNS names
    pub fn new(zone: &str, name: &str) -> Result<Self> {
        validate_dns_token("zone", zone)?;
        validate_dns_token("name", name)?;
        Ok(Self {
            zone: zone.to_string(),
            name: name.to_string(),
        })
    }

    /// The PowerShell cmdlet line
    pub fn cmdlet(&self) -> String {
        format!(
            "Add-DnsServerResourceRecordCName -ZoneName {} -Name {} -HostNameAlias {}",
            self.zone, self.name, self.zone
        )
    }

    /// The full shell line sent over the session
    pub fn render(&self) -> String {
        format!("powershell -Command \"{}\"", self.cmdlet())
    }
}

// The values are interpolated into a remote shell line.
fn validate_dns_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("{} cannot be empty", field)));
    }
    if value.len() > 253 {
        return Err(Error::invalid_input(format!(
            "{} too long: {} chars (max 253)",
            field,
            value.len()
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*' | '@')))
    {
        return Err(Error::invalid_input(format!(
            "{} '{}' contains invalid character {:?}",
            field, value, c
        )));
    }
    Ok(())
}

/// Classify remote output: the error marker anywhere means failure
pub fn classify_output(output: &str) -> Result<()> {
    if output.contains(ERROR_MARKER) {
        return Err(Error::update_rejected(output.trim()));
    }
    Ok(())
}

/// [`CnameUpdater`] that drives a [`RemoteShell`]
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the rendered command is logged and reported as a
/// success without opening a session.
pub struct ShellCnameUpdater<S> {
    shell: S,
    dry_run: bool,
}

impl<S: RemoteShell> ShellCnameUpdater<S> {
    /// Create an updater that runs commands for real
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            dry_run: false,
        }
    }

    /// Toggle dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether commands are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The wrapped shell
    pub fn shell(&self) -> &S {
        &self.shell
    }
}

#[async_trait]
impl<S: RemoteShell> CnameUpdater for ShellCnameUpdater<S> {
    async fn update_cname(&self, zone: &str, name: &str) -> Result<()> {
        let command = CnameCommand::new(zone, name)?;
        let line = command.render();

        if self.dry_run {
            info!(zone = %zone, name = %name, command = %line, "[DRY-RUN] Would run remote command");
            return Ok(());
        }

        debug!(zone = %zone, name = %name, shell = self.shell.shell_name(), "Running remote command");
        let output = self.shell.run(&line).await?;
        classify_output(&output)
    }

    fn updater_name(&self) -> &'static str {
        self.shell.shell_name()
    }
}
