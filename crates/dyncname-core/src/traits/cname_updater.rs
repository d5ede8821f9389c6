// # CNAME Updater Trait
//
// The unit of work of a reconciliation pass: make `name` in `zone` an alias
// of the zone apex on the remote authority.

use async_trait::async_trait;

/// Trait for CNAME record updaters
///
/// Implementations must create the record when it is missing and overwrite it
/// when it exists, so that running the same update every pass is harmless.
///
/// The reconciler calls this once per target per pass, strictly one call at a
/// time. A returned error is logged by the reconciler and never stops the pass.
#[async_trait]
pub trait CnameUpdater: Send + Sync {
    /// Point `name` within `zone` at `zone`
    ///
    /// # Parameters
    ///
    /// - `zone`: The DNS zone (e.g., "example.com")
    /// - `name`: Local record name within the zone ("@" is the apex)
    async fn update_cname(&self, zone: &str, name: &str) -> Result<(), crate::Error>;

    /// Get the updater name (for logging/debugging)
    fn updater_name(&self) -> &'static str;
}
