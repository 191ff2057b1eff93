use crate::aliases::wildcard_suggestions;
use crate::config::VanillaMetaConfig;
use crate::container::ApxRuntime;
use crate::container::ContainerRuntime;
use crate::error::Result;
use crate::error::VanillaMetaError;
use crate::fetch::FetchProgress;
use crate::fetch::Fetcher;
use crate::fetch::ReqwestFetcher;
use crate::reconcile::InstallParams;
use crate::reconcile::Reconciler;
use crate::reconcile::RefineScope;
use crate::reconcile::record_from_entry;
use crate::record::AppQuery;
use crate::record::AppRecord;
use crate::record::AppState;
use crate::record::RefineFlags;
use crate::record::RefreshFlags;
use crate::store::DocumentStore;
use crate::worker::JobQueue;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use vanilla_appstream_silo::CompileFlags;
use vanilla_appstream_silo::Silo;
use vanilla_appstream_silo::SiloHeader;
use vanilla_appstream_silo::SiloLoad;
use vanilla_appstream_silo::TransformRule;
use vanilla_appstream_silo::compile;
use vanilla_appstream_silo::entries_by_id;
use vanilla_appstream_silo::find_alternates_of;
use vanilla_appstream_silo::load_silo;
use vanilla_appstream_silo::save_silo;
use vanilla_appstream_silo::search;

/// Host-facing surface of the metadata subsystem.
///
/// Refresh, listing and refining are queued on one FIFO worker; the current
/// silo is an atomically swapped snapshot that readers never see half built.
pub struct VanillaMetaPlugin {
    pipeline: Pipeline,
    runtime: Arc<dyn ContainerRuntime>,
    jobs: JobQueue,
}

/// State shared with queued jobs.
#[derive(Clone)]
struct Pipeline {
    config: Arc<VanillaMetaConfig>,
    store: DocumentStore,
    fetcher: Arc<dyn Fetcher>,
    reconciler: Arc<Reconciler>,
    silo: Arc<ArcSwapOption<Silo>>,
}

/// Outcome of bringing the silo in line with the cached document.
enum Rebuild {
    Current,
    Loaded(Silo),
    Compiled(Silo),
}

impl VanillaMetaPlugin {
    /// Production plugin: reqwest downloads and `apx` containers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: VanillaMetaConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = ReqwestFetcher::from_config(&config)?;
        Self::with_collaborators(config, Arc::new(fetcher), Arc::new(ApxRuntime::default()))
    }

    pub fn with_collaborators(
        config: VanillaMetaConfig,
        fetcher: Arc<dyn Fetcher>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self> {
        config.validate()?;
        let reconciler = Reconciler::new(
            config.origin.clone(),
            RefineScope {
                filter_by_origin: config.refine_filter_by_origin,
            },
        );
        let pipeline = Pipeline {
            store: DocumentStore::new(config.cache_dir.clone()),
            config: Arc::new(config),
            fetcher,
            reconciler: Arc::new(reconciler),
            silo: Arc::new(ArcSwapOption::empty()),
        };
        Ok(Self {
            pipeline,
            runtime,
            jobs: JobQueue::spawn(),
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.pipeline.store
    }

    /// Downloads the document when the cache is at least `max_age` old, then
    /// makes the silo compiled from the cached document current.
    ///
    /// On failure the previously current silo stays current.
    pub async fn refresh(
        &self,
        max_age: Duration,
        flags: RefreshFlags,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let pipeline = self.pipeline.clone();
        let cancel = cancel.clone();
        self.jobs
            .submit(move || async move { pipeline.refresh(max_age, flags, &cancel).await })
            .await
    }

    /// Claimed records for the entries matching `query`, followed by
    /// wildcard suggestions for the keywords.
    pub async fn list_apps(
        &self,
        query: AppQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<AppRecord>> {
        check_query(&query)?;
        let pipeline = self.pipeline.clone();
        let cancel = cancel.clone();
        self.jobs
            .submit(move || async move { pipeline.list_apps(&query, &cancel) })
            .await
    }

    /// Enriches our records from the current silo and hands them back.
    pub async fn refine(
        &self,
        records: Vec<AppRecord>,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> Result<Vec<AppRecord>> {
        let pipeline = self.pipeline.clone();
        let cancel = cancel.clone();
        self.jobs
            .submit(move || async move { pipeline.refine(records, flags, &cancel) })
            .await
    }

    /// Claims `record` when it carries a container binding.
    pub fn adopt(&self, record: &mut AppRecord) {
        self.pipeline.reconciler.adopt(record);
    }

    /// Installs a refined record into its container, creating the container
    /// first when it does not exist yet.
    pub async fn install(&self, record: &mut AppRecord, cancel: &CancellationToken) -> Result<()> {
        let params = match InstallParams::resolve(record) {
            Ok(params) => params,
            Err(err) => {
                record.state = AppState::Available;
                return Err(err);
            }
        };
        record.state = AppState::Installing;
        match self.install_with(&params, cancel).await {
            Ok(()) => {
                info!("installed {} into {}", params.package, params.container_name);
                record.state = AppState::Installed;
                Ok(())
            }
            Err(err) => {
                warn!("installing {} failed: {err}", params.package);
                record.state = AppState::Available;
                Err(err)
            }
        }
    }

    async fn install_with(&self, params: &InstallParams, cancel: &CancellationToken) -> Result<()> {
        let containers = self.runtime.list_containers(cancel).await?;
        if !containers.contains(&params.container_name) {
            info!("creating container {}", params.container_name);
            self.runtime
                .init_container(&params.container_flag, cancel)
                .await?;
        }
        self.runtime
            .install_package(&params.container_flag, &params.package, cancel)
            .await?;
        Ok(())
    }

    pub async fn launch(&self, record: &AppRecord) -> Result<()> {
        let params = InstallParams::resolve(record)?;
        let command = params.launch_command(record);
        self.runtime
            .launch(&params.container_flag, &command)
            .await?;
        Ok(())
    }

    pub fn current_silo(&self) -> Option<Arc<Silo>> {
        self.pipeline.silo.load_full()
    }

    /// Stops the worker; queued and later requests fail with
    /// [`VanillaMetaError::WorkerGone`].
    pub fn shutdown(&self) {
        self.jobs.shutdown();
    }
}

impl Drop for VanillaMetaPlugin {
    fn drop(&mut self) {
        self.jobs.shutdown();
    }
}

fn check_query(query: &AppQuery) -> Result<()> {
    if let Some(category) = &query.category {
        return Err(VanillaMetaError::UnsupportedQuery(format!(
            "category filter `{category}`"
        )));
    }
    if query.is_installed.is_some() {
        return Err(VanillaMetaError::UnsupportedQuery(
            "installed-state filter".to_string(),
        ));
    }
    let has_keywords = query.keywords.iter().any(|keyword| !keyword.trim().is_empty());
    if !has_keywords && query.alternate_of.is_none() {
        return Err(VanillaMetaError::UnsupportedQuery(
            "query needs keywords or an alternate reference".to_string(),
        ));
    }
    Ok(())
}

impl Pipeline {
    fn rules(&self) -> Vec<TransformRule> {
        let mut rules = vec![TransformRule::OriginTag {
            origin: self.config.origin.clone(),
        }];
        if self.config.tokenize {
            rules.push(TransformRule::Tokenize);
        }
        rules
    }

    fn locales(&self) -> Vec<String> {
        self.config
            .locales
            .iter()
            .map(|locale| locale.trim())
            .filter(|locale| !locale.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    async fn refresh(
        &self,
        max_age: Duration,
        flags: RefreshFlags,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(VanillaMetaError::Cancelled);
        }
        self.store.ensure_dirs()?;
        match self.store.age() {
            Some(age) if age < max_age => {
                debug!(
                    "metadata cache is only {} seconds old, skipping download",
                    age.as_secs()
                );
            }
            _ => self.download(flags, cancel).await?,
        }
        if cancel.is_cancelled() {
            return Err(VanillaMetaError::Cancelled);
        }
        self.rebuild(cancel).await
    }

    async fn download(&self, flags: RefreshFlags, cancel: &CancellationToken) -> Result<()> {
        let url = self.config.metadata_url.as_str();
        debug!("refreshing metadata from {url}");
        let on_progress = move |progress: FetchProgress| {
            let total = progress
                .total
                .map(|total| total.to_string())
                .unwrap_or_else(|| "?".to_string());
            if flags.interactive {
                info!("downloaded {} of {total} bytes", progress.bytes_so_far);
            } else {
                debug!("downloaded {} of {total} bytes", progress.bytes_so_far);
            }
        };
        if let Err(err) = self
            .fetcher
            .fetch(url, &self.store.document_path(), &on_progress, cancel)
            .await
        {
            warn!("metadata download failed: {err}");
            return Err(err.into());
        }
        info!("downloaded new metadata document");
        Ok(())
    }

    async fn rebuild(&self, cancel: &CancellationToken) -> Result<()> {
        let store = self.store.clone();
        let current = self.silo.load_full();
        let locales = self.locales();
        let rules = self.rules();
        let flags = CompileFlags {
            ignore_invalid: self.config.ignore_invalid,
        };
        let job_cancel = cancel.clone();
        let rebuilt = spawn_blocking(move || {
            rebuild_silo(&store, current.as_deref(), &locales, &rules, flags, &job_cancel)
        })
        .await??;

        if cancel.is_cancelled() {
            return Err(VanillaMetaError::Cancelled);
        }
        match rebuilt {
            Rebuild::Current => debug!("metadata silo already up to date"),
            Rebuild::Loaded(silo) => {
                info!("loaded metadata silo with {} components", silo.len());
                self.silo.store(Some(Arc::new(silo)));
            }
            Rebuild::Compiled(silo) => {
                info!("compiled metadata silo with {} components", silo.len());
                self.silo.store(Some(Arc::new(silo)));
            }
        }
        Ok(())
    }

    fn list_apps(&self, query: &AppQuery, cancel: &CancellationToken) -> Result<Vec<AppRecord>> {
        if cancel.is_cancelled() {
            return Err(VanillaMetaError::Cancelled);
        }
        let mut records: Vec<AppRecord> = Vec::new();
        match self.silo.load_full() {
            Some(silo) => {
                let mut push = |record: AppRecord| {
                    let duplicate = records.iter().any(|existing| {
                        existing.id == record.id
                            && existing.default_source() == record.default_source()
                    });
                    if !duplicate {
                        records.push(record);
                    }
                };
                if !query.keywords.is_empty() {
                    for entry in search(&silo, &query.keywords) {
                        push(record_from_entry(entry));
                    }
                }
                if let Some(reference) = &query.alternate_of {
                    for &position in entries_by_id(&silo, reference) {
                        for entry in find_alternates_of(&silo, position) {
                            push(record_from_entry(entry));
                        }
                    }
                }
            }
            None => debug!("no metadata silo yet, listing suggestions only"),
        }
        self.reconciler.claim(&mut records);

        for suggestion in wildcard_suggestions(&query.keywords) {
            if !records.iter().any(|record| record.id == suggestion.id) {
                records.push(suggestion);
            }
        }
        Ok(records)
    }

    fn refine(
        &self,
        mut records: Vec<AppRecord>,
        flags: RefineFlags,
        cancel: &CancellationToken,
    ) -> Result<Vec<AppRecord>> {
        if cancel.is_cancelled() {
            return Err(VanillaMetaError::Cancelled);
        }
        match self.silo.load_full() {
            Some(silo) => {
                let refined = self.reconciler.refine(&mut records, &silo, flags);
                debug!("refined {refined} of {} records", records.len());
            }
            None => debug!("no metadata silo yet, records left as they are"),
        }
        Ok(records)
    }
}

/// Reuses the current or persisted silo when it was compiled from the cached
/// document with the same locales and rules, compiling a new one otherwise.
fn rebuild_silo(
    store: &DocumentStore,
    current: Option<&Silo>,
    locales: &[String],
    rules: &[TransformRule],
    flags: CompileFlags,
    cancel: &CancellationToken,
) -> Result<Rebuild> {
    let expected = SiloHeader::new(store.digest()?, locales, rules);
    if current.is_some_and(|silo| silo.matches(&expected)) {
        return Ok(Rebuild::Current);
    }

    let index_path = store.index_path();
    match load_silo(&index_path) {
        Ok(SiloLoad::Loaded(silo)) if silo.matches(&expected) => {
            return Ok(Rebuild::Loaded(*silo));
        }
        Ok(SiloLoad::Loaded(_)) => debug!("persisted silo is out of date, recompiling"),
        Ok(SiloLoad::Missing) => debug!("no persisted silo, compiling"),
        Ok(SiloLoad::ResetAfterCorruption) => warn!("persisted silo was corrupt, recompiling"),
        Err(err) => warn!("failed to read persisted silo ({err}), recompiling"),
    }

    let silo = compile(&store.document_path(), locales, rules, flags, cancel)?;
    if cancel.is_cancelled() {
        return Err(VanillaMetaError::Cancelled);
    }
    save_silo(&index_path, &store.temp_index_path(), &silo)?;
    Ok(Rebuild::Compiled(silo))
}
