// # Remote Shell Trait
//
// Defines the transport used to reach the remote DNS authority.
//
// ## Implementations
//
// - SSH with password authentication: `dyncname-ssh` crate
//
// ## Usage
//
// ```rust,ignore
// use dyncname_core::RemoteShell;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let shell = /* RemoteShell implementation */;
//
//     let output = shell.run("powershell -Command \"Get-DnsServerZone\"").await?;
//     println!("{}", output);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for remote command transports
///
/// # Session Lifetime
///
/// Every call to [`RemoteShell::run`] opens a fresh authenticated session and
/// tears it down before returning, on success and on failure alike. No
/// connection is pooled or reused across calls.
///
/// # Forbidden Capabilities
/// - ❌ Retrying failed commands (the check interval is the only retry)
/// - ❌ Interpreting command output (owned by the updater)
/// - ❌ Spawning background tasks
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a single command and return its combined stdout and stderr
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The command ran; its output is returned unclassified
    /// - `Err(Error::Transport)`: Could not connect or authenticate
    /// - `Err(Error::Session)`: Could not open a channel or dispatch the command
    async fn run(&self, command: &str) -> Result<String, crate::Error>;

    /// Get the shell name (for logging/debugging)
    fn shell_name(&self) -> &'static str;
}

#[async_trait]
impl<T: RemoteShell + ?Sized> RemoteShell for Box<T> {
    async fn run(&self, command: &str) -> Result<String, crate::Error> {
        (**self).run(command).await
    }

    fn shell_name(&self) -> &'static str {
        (**self).shell_name()
    }
}

/// Helper trait for constructing remote shells from configuration
pub trait RemoteShellFactory: Send + Sync {
    /// Create a RemoteShell instance from configuration
    fn create(
        &self,
        config: &crate::config::DnsServerConfig,
    ) -> Result<Box<dyn RemoteShell>, crate::Error>;
}
