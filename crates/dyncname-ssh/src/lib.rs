// # SSH Remote Shell
//
// This crate runs dyncname's administrative commands on the DNS server over
// SSH with password authentication.
//
// ## Session Lifetime
//
// Each `run()` is one full cycle: TCP connect, key exchange, password auth,
// one exec channel, collect output, disconnect. Nothing is pooled. The
// connection is closed on every exit path.
//
// ## Outcome Mapping
//
// - Cannot connect, host key rejected, auth rejected → `Error::Transport`
// - Cannot open the channel or exec, non-zero or missing exit status
//   → `Error::Session`
// - Otherwise the combined stdout + stderr is returned for classification
//
// ## Security Requirements
//
// - The password NEVER appears in logs or `Debug` output
// - When no host key fingerprint is configured any key is accepted, with a
//   warning on every connection

use async_trait::async_trait;
use dyncname_core::config::DnsServerConfig;
use dyncname_core::registry::Registry;
use dyncname_core::traits::{RemoteShell, RemoteShellFactory};
use dyncname_core::{Error, Result};
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect, Sig};
use russh_keys::key::PublicKey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shell type name used in `dns_server.type`
pub const SHELL_TYPE: &str = "ssh";

/// SSH remote shell
pub struct SshShell {
    host: String,
    port: u16,
    user: String,

    /// ⚠️ NEVER log this value
    password: String,

    /// Expected SHA-256 host key fingerprint (base64, no prefix)
    host_key_fingerprint: Option<String>,

    /// Bound on connect + authentication. The exec phase is not bounded.
    connect_timeout: Duration,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for SshShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshShell")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl SshShell {
    /// Create a shell for `user@host:port`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            host_key_fingerprint: None,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Build from the `dns_server` configuration
    pub fn from_config(config: &DnsServerConfig) -> Result<Self> {
        config.validate()?;

        let mut shell = Self::new(
            config.host.clone(),
            config.port,
            config.user.clone(),
            config.password.clone(),
        )
        .with_connect_timeout(config.connect_timeout());

        if let Some(fingerprint) = &config.host_key_fingerprint {
            shell = shell.with_host_key_fingerprint(fingerprint);
        }

        Ok(shell)
    }

    /// Pin the server's host key (`SHA256:...` or bare base64)
    pub fn with_host_key_fingerprint(mut self, fingerprint: &str) -> Self {
        self.host_key_fingerprint = Some(normalize_fingerprint(fingerprint));
        self
    }

    /// Set the connect + authentication timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Client settings. No inactivity timeout: a command may stay silent
    /// for as long as the server needs, only connect + auth is bounded.
    fn client_config(&self) -> client::Config {
        client::Config::default()
    }

    /// Connect and authenticate
    async fn connect(&self) -> Result<Handle<HostKeyPolicy>> {
        let config = Arc::new(self.client_config());
        let policy = HostKeyPolicy {
            address: self.address(),
            expected: self.host_key_fingerprint.clone(),
        };

        let connect = client::connect(config, (self.host.as_str(), self.port), policy);
        let mut session = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                Error::transport(format!(
                    "timed out after {:?} dialing {}",
                    self.connect_timeout,
                    self.address()
                ))
            })?
            .map_err(|e| Error::transport(format!("failed to dial {}: {}", self.address(), e)))?;

        let authenticated = tokio::time::timeout(
            self.connect_timeout,
            session.authenticate_password(self.user.as_str(), self.password.as_str()),
        )
        .await
        .map_err(|_| Error::transport(format!("timed out authenticating to {}", self.address())))?
        .map_err(|e| Error::transport(format!("failed to authenticate: {}", e)))?;

        if !authenticated {
            let _ = session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
            return Err(Error::transport(format!(
                "password authentication rejected for user {}",
                self.user
            )));
        }

        Ok(session)
    }
}

/// Run one command on an authenticated session and collect its output
async fn exec(session: &Handle<HostKeyPolicy>, command: &str) -> Result<String> {
    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| Error::session(format!("failed to create session: {}", e)))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| Error::session(format!("failed to run command: {}", e)))?;

    let mut output = Vec::new();
    let mut exit_status = None;
    let mut exit_signal = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => output.extend_from_slice(&data[..]),
            ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(&data[..]),
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            ChannelMsg::ExitSignal { signal_name, .. } => exit_signal = Some(signal_name),
            _ => {}
        }
    }

    exit_outcome(exit_status, exit_signal, String::from_utf8_lossy(&output).into_owned())
}

/// Map how the remote command ended to its result
fn exit_outcome(exit_status: Option<u32>, exit_signal: Option<Sig>, output: String) -> Result<String> {
    match (exit_status, exit_signal) {
        (Some(0), _) => Ok(output),
        (Some(code), _) => Err(Error::session(format!(
            "failed to run command: exit status {}, output: {}",
            code,
            output.trim()
        ))),
        (None, Some(signal)) => Err(Error::session(format!(
            "failed to run command: killed by signal {:?}, output: {}",
            signal,
            output.trim()
        ))),
        (None, None) => Err(Error::session(format!(
            "failed to run command: exited without status, output: {}",
            output.trim()
        ))),
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, command: &str) -> Result<String> {
        debug!(address = %self.address(), user = %self.user, "Opening SSH session");
        let session = self.connect().await?;

        let result = exec(&session, command).await;

        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(address = %self.address(), error = %e, "SSH disconnect failed");
        }

        result
    }

    fn shell_name(&self) -> &'static str {
        SHELL_TYPE
    }
}

/// Host key check performed during key exchange
struct HostKeyPolicy {
    address: String,
    expected: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();

        match &self.expected {
            Some(expected) if *expected == fingerprint => Ok(true),
            Some(expected) => {
                warn!(
                    address = %self.address,
                    expected = %expected,
                    actual = %fingerprint,
                    "SSH host key fingerprint mismatch"
                );
                Ok(false)
            }
            None => {
                warn!(
                    address = %self.address,
                    fingerprint = %fingerprint,
                    "Accepting unverified SSH host key; set a host key fingerprint to pin it"
                );
                Ok(true)
            }
        }
    }
}

fn normalize_fingerprint(fingerprint: &str) -> String {
    let trimmed = fingerprint.trim();
    trimmed
        .strip_prefix("SHA256:")
        .unwrap_or(trimmed)
        .trim_end_matches('=')
        .to_string()
}

/// Factory for creating SSH shells
pub struct SshFactory;

impl RemoteShellFactory for SshFactory {
    fn create(&self, config: &DnsServerConfig) -> Result<Box<dyn RemoteShell>> {
        if config.shell_type != SHELL_TYPE {
            return Err(Error::config(format!(
                "Invalid config for SSH shell: type '{}'",
                config.shell_type
            )));
        }
        Ok(Box::new(SshShell::from_config(config)?))
    }
}

/// Register the SSH shell with a registry
pub fn register(registry: &Registry) {
    registry.register_shell(SHELL_TYPE, Box::new(SshFactory));
}
