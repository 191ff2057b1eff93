use super::support::FEED;
use super::support::FakeFetcher;
use super::support::always;
use super::support::plugin;
use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vanilla_meta::AppQuery;
use vanilla_meta::DEFAULT_ORIGIN;
use vanilla_meta::Reconciler;
use vanilla_meta::RefineScope;
use vanilla_meta::RefreshFlags;

#[tokio::test]
async fn misspelled_competitor_yields_one_unclaimed_suggestion() -> Result<()> {
    let dir = TempDir::new()?;
    let plugin = plugin(dir.path(), FakeFetcher::new(FEED));
    let cancel = CancellationToken::new();
    plugin
        .refresh(always(), RefreshFlags::default(), &cancel)
        .await?;

    let mut results = plugin
        .list_apps(AppQuery::keywords(["fotoshop"]), &cancel)
        .await?;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_wildcard);
    assert_eq!(results[0].id, "org.gimp.GIMP");
    assert_eq!(results[0].management_owner, None);

    let before = results.clone();
    Reconciler::new(
        DEFAULT_ORIGIN,
        RefineScope {
            filter_by_origin: true,
        },
    )
    .claim(&mut results);
    assert_eq!(results, before);
    Ok(())
}

#[tokio::test]
async fn suggestions_are_offered_before_first_refresh() -> Result<()> {
    let dir = TempDir::new()?;
    let plugin = plugin(dir.path(), FakeFetcher::new(FEED));

    let results = plugin
        .list_apps(
            AppQuery::keywords(["photoshop", "illustrator"]),
            &CancellationToken::new(),
        )
        .await?;

    let ids: Vec<&str> = results.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["org.gimp.GIMP", "org.inkscape.Inkscape"]);
    assert!(results.iter().all(|record| record.is_wildcard));
    Ok(())
}
