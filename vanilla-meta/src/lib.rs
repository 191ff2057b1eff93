/*!
# Vanilla Meta

Keeps a local, queryable copy of the Vanilla application metadata feed and
uses it to claim, refine and install application records managed through
`apx` containers.

## Example

```rust,no_run
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vanilla_meta::{AppQuery, RefineFlags, RefreshFlags, VanillaMetaConfig, VanillaMetaPlugin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = VanillaMetaConfig::load("vanilla-meta.toml".as_ref())?;
    let plugin = VanillaMetaPlugin::new(config)?;
    let cancel = CancellationToken::new();

    plugin
        .refresh(Duration::from_secs(3600), RefreshFlags::default(), &cancel)
        .await?;
    let apps = plugin.list_apps(AppQuery::keywords(["gimp"]), &cancel).await?;
    let apps = plugin.refine(apps, RefineFlags::default(), &cancel).await?;
    for app in &apps {
        println!("{} {:?}", app.id, app.name);
    }
    Ok(())
}
```
*/

mod aliases;
mod config;
mod container;
mod error;
mod fetch;
mod plugin;
mod reconcile;
mod record;
mod store;
mod worker;

pub use aliases::wildcard_suggestions;
pub use config::{DEFAULT_ORIGIN, VanillaMetaConfig};
pub use container::{ApxRuntime, ContainerRuntime};
pub use error::{ConfigError, ContainerError, FetchError, Result, VanillaMetaError};
pub use fetch::{FetchProgress, Fetcher, ReqwestFetcher};
pub use plugin::VanillaMetaPlugin;
pub use reconcile::{InstallParams, Reconciler, RefineScope, container_flag, record_from_entry};
pub use record::{AppQuery, AppRecord, AppState, MetadataKey, RefineFlags, RefreshFlags};
pub use store::DocumentStore;
