use super::support::FEED;
use super::support::FakeFetcher;
use super::support::FakeRuntime;
use super::support::plugin_with_runtime;
use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vanilla_meta::AppRecord;
use vanilla_meta::AppState;
use vanilla_meta::ContainerError;
use vanilla_meta::DEFAULT_ORIGIN;
use vanilla_meta::MetadataKey;
use vanilla_meta::VanillaMetaError;

fn refined_record() -> AppRecord {
    let mut record = AppRecord {
        management_owner: Some(DEFAULT_ORIGIN.to_string()),
        launchable: Some("example.desktop".to_string()),
        state: AppState::Available,
        ..AppRecord::new("org.example.App").with_source("example-pkg")
    };
    record.set_metadata(MetadataKey::ContainerBinding, "--debian");
    record.set_metadata(MetadataKey::ContainerName, "apx_managed_debian");
    record
}

#[tokio::test]
async fn install_creates_missing_container_first() -> Result<()> {
    let dir = TempDir::new()?;
    let runtime = FakeRuntime::with_containers(&["apx_managed_arch"]);
    let plugin = plugin_with_runtime(dir.path(), FakeFetcher::new(FEED), runtime.clone());
    let mut record = refined_record();

    plugin.install(&mut record, &CancellationToken::new()).await?;

    assert_eq!(record.state, AppState::Installed);
    assert_eq!(
        runtime.commands(),
        vec!["list", "init --debian", "install --debian example-pkg"]
    );
    Ok(())
}

#[tokio::test]
async fn install_into_existing_container_skips_init() -> Result<()> {
    let dir = TempDir::new()?;
    let runtime = FakeRuntime::with_containers(&["apx_managed_debian"]);
    let plugin = plugin_with_runtime(dir.path(), FakeFetcher::new(FEED), runtime.clone());
    let mut record = refined_record();

    plugin.install(&mut record, &CancellationToken::new()).await?;

    assert_eq!(record.state, AppState::Installed);
    assert_eq!(
        runtime.commands(),
        vec!["list", "install --debian example-pkg"]
    );
    Ok(())
}

#[tokio::test]
async fn failed_install_returns_to_available() -> Result<()> {
    let dir = TempDir::new()?;
    let runtime = FakeRuntime::with_containers(&["apx_managed_debian"]);
    runtime.fail_installs();
    let plugin = plugin_with_runtime(dir.path(), FakeFetcher::new(FEED), runtime.clone());
    let mut record = refined_record();

    let err = plugin
        .install(&mut record, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VanillaMetaError::Container(ContainerError::Spawn { .. })
    ));
    assert_eq!(record.state, AppState::Available);
    Ok(())
}

#[tokio::test]
async fn unrefined_record_cannot_be_installed() -> Result<()> {
    let dir = TempDir::new()?;
    let runtime = FakeRuntime::with_containers(&[]);
    let plugin = plugin_with_runtime(dir.path(), FakeFetcher::new(FEED), runtime.clone());
    let mut record = AppRecord::new("org.example.App").with_source("example-pkg");
    assert_eq!(record.state, AppState::Unknown);

    let err = plugin
        .install(&mut record, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VanillaMetaError::InstallParams { .. }));
    assert_eq!(record.state, AppState::Available);
    assert!(runtime.commands().is_empty());
    Ok(())
}

#[tokio::test]
async fn launch_runs_launchable_in_container() -> Result<()> {
    let dir = TempDir::new()?;
    let runtime = FakeRuntime::with_containers(&[]);
    let plugin = plugin_with_runtime(dir.path(), FakeFetcher::new(FEED), runtime.clone());

    plugin.launch(&refined_record()).await?;

    assert_eq!(runtime.commands(), vec!["run --debian example"]);
    Ok(())
}
