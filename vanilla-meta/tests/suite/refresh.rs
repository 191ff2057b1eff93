use super::support::FEED;
use super::support::FakeFetcher;
use super::support::UPDATED_FEED;
use super::support::always;
use super::support::backdate;
use super::support::gzip;
use super::support::never;
use super::support::plugin;
use anyhow::Result;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vanilla_appstream_silo::CompileError;
use vanilla_meta::AppQuery;
use vanilla_meta::FetchError;
use vanilla_meta::RefreshFlags;
use vanilla_meta::VanillaMetaError;

#[tokio::test]
async fn missing_cache_is_always_fetched() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());

    plugin
        .refresh(never(), RefreshFlags::default(), &CancellationToken::new())
        .await?;

    assert_eq!(fetcher.calls(), 1);
    assert!(plugin.store().document_path().is_file());
    assert!(plugin.store().index_path().is_file());
    let silo = plugin.current_silo().expect("silo after refresh");
    assert_eq!(silo.len(), 4);
    Ok(())
}

#[tokio::test]
async fn fresh_cache_is_served_without_fetching() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    plugin.store().write(&gzip(FEED))?;
    backdate(&plugin.store().document_path(), Duration::from_secs(10));

    plugin
        .refresh(
            Duration::from_secs(3600),
            RefreshFlags::default(),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(fetcher.calls(), 0);
    let first = plugin.current_silo().expect("silo from cached document");

    plugin
        .refresh(
            Duration::from_secs(3600),
            RefreshFlags { interactive: true },
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(fetcher.calls(), 0);
    let second = plugin.current_silo().expect("silo still current");
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[tokio::test]
async fn persisted_silo_is_reused_across_instances() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let compiled = {
        let plugin = plugin(dir.path(), fetcher.clone());
        plugin
            .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
            .await?;
        plugin.current_silo().expect("compiled silo")
    };

    let restarted = plugin(dir.path(), fetcher.clone());
    assert!(restarted.current_silo().is_none());
    restarted
        .refresh(never(), RefreshFlags::default(), &CancellationToken::new())
        .await?;

    assert_eq!(fetcher.calls(), 1);
    let loaded = restarted.current_silo().expect("loaded silo");
    assert_eq!(*loaded, *compiled);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_keeps_previous_silo() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;
    let before = plugin.current_silo().expect("silo after first refresh");

    fetcher.fail_with_transport_error();
    let err = plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VanillaMetaError::Fetch(FetchError::Transport { .. })
    ));
    let after = plugin.current_silo().expect("previous silo still current");
    assert!(Arc::ptr_eq(&before, &after));

    let apps = plugin
        .list_apps(AppQuery::keywords(["example"]), &CancellationToken::new())
        .await?;
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].id, "org.example.App");
    Ok(())
}

#[tokio::test]
async fn malformed_document_keeps_previous_silo() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;
    let before = plugin.current_silo().expect("silo after first refresh");

    fetcher.set_body("<components><component><id>org.example.Broken</id>");
    let err = plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VanillaMetaError::Compile(CompileError::Parse { .. })
    ));
    let after = plugin.current_silo().expect("previous silo still current");
    assert!(Arc::ptr_eq(&before, &after));
    Ok(())
}

#[tokio::test]
async fn unwritable_index_keeps_previous_silo() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;
    let before = plugin.current_silo().expect("silo after first refresh");

    std::fs::create_dir_all(plugin.store().temp_index_path())?;
    fetcher.set_body(UPDATED_FEED);
    let err = plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VanillaMetaError::Silo(_)));
    let after = plugin.current_silo().expect("previous silo still current");
    assert!(Arc::ptr_eq(&before, &after));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_index_is_recompiled() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    let elsewhere = dir.path().join("elsewhere");
    std::fs::create_dir_all(&elsewhere)?;
    std::fs::create_dir_all(plugin.store().root())?;
    std::os::unix::fs::symlink(&elsewhere, plugin.store().index_path())?;

    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;

    let silo = plugin.current_silo().expect("silo compiled from document");
    assert_eq!(silo.len(), 4);
    assert!(plugin.store().index_path().is_file());
    Ok(())
}

#[tokio::test]
async fn new_document_replaces_silo() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;

    fetcher.set_body(UPDATED_FEED);
    plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await?;

    assert_eq!(fetcher.calls(), 2);
    let silo = plugin.current_silo().expect("recompiled silo");
    assert_eq!(silo.len(), 1);
    assert_eq!(silo.entries()[0].id, "org.example.Other");
    Ok(())
}

#[tokio::test]
async fn cancelled_refresh_changes_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let fetcher = FakeFetcher::new(FEED);
    let plugin = plugin(dir.path(), fetcher.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = plugin
        .refresh(always(), RefreshFlags::default(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, VanillaMetaError::Cancelled));
    assert_eq!(fetcher.calls(), 0);
    assert!(!plugin.store().document_path().exists());
    assert!(plugin.current_silo().is_none());
    Ok(())
}

#[tokio::test]
async fn requests_after_shutdown_fail() -> Result<()> {
    let dir = TempDir::new()?;
    let plugin = plugin(dir.path(), FakeFetcher::new(FEED));
    plugin.shutdown();

    let err = plugin
        .refresh(always(), RefreshFlags::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, VanillaMetaError::WorkerGone));
    Ok(())
}
