use crate::error::Result;
use crate::error::VanillaMetaError;
use crate::record::AppRecord;
use crate::record::AppState;
use crate::record::MetadataKey;
use crate::record::RefineFlags;
use tracing::debug;
use vanilla_appstream_silo::BundleQuery;
use vanilla_appstream_silo::IndexEntry;
use vanilla_appstream_silo::Silo;
use vanilla_appstream_silo::find_bundle_for;

const PACKAGING_FORMAT: &str = "Apx";
const PACKAGING_BASE_CSS_COLOR: &str = "warning_color";
const PACKAGING_ICON: &str = "org.vanillaos.FirstSetup-symbolic";

/// Which index entries a refine pass may draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefineScope {
    /// Only entries tagged with our own origin.
    pub filter_by_origin: bool,
}

/// Claims, refines and adopts records on behalf of one owner.
#[derive(Clone, Debug)]
pub struct Reconciler {
    owner: String,
    scope: RefineScope,
}

impl Reconciler {
    pub fn new(owner: impl Into<String>, scope: RefineScope) -> Self {
        Self {
            owner: owner.into(),
            scope,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Takes ownership of every unowned (or already ours) record that is not
    /// a wildcard, stamping our packaging metadata on it.
    pub fn claim(&self, records: &mut [AppRecord]) {
        for record in records.iter_mut() {
            if record.is_wildcard {
                continue;
            }
            if record
                .management_owner
                .as_deref()
                .is_some_and(|owner| owner != self.owner)
            {
                continue;
            }
            record.management_owner = Some(self.owner.clone());
            record.origin = Some(self.owner.clone());
            record.set_metadata(MetadataKey::PackagingFormat, PACKAGING_FORMAT);
            record.set_metadata(MetadataKey::PackagingBaseCssColor, PACKAGING_BASE_CSS_COLOR);
            record.set_metadata(MetadataKey::PackagingIcon, PACKAGING_ICON);
        }
    }

    /// Enriches our records from the bundle matching their default source.
    /// Records without a match keep their fields. Returns how many records
    /// were refined.
    pub fn refine(&self, records: &mut [AppRecord], silo: &Silo, flags: RefineFlags) -> usize {
        let mut refined = 0;
        for record in records.iter_mut() {
            if !record.is_owned_by(&self.owner) {
                continue;
            }
            let Some(package) = record.default_source() else {
                continue;
            };
            let query = BundleQuery {
                package,
                origin: self.scope.filter_by_origin.then_some(self.owner.as_str()),
                require_container: true,
            };
            let Some(found) = find_bundle_for(silo, &query) else {
                debug!("no bundle for {package}, leaving {} as is", record.id);
                continue;
            };
            let entry = found.entry;
            let container = found.bundle.container.clone();

            if flags.require_descriptive {
                copy_descriptive(record, entry);
            }
            if flags.require_setup
                && let Some(container) = container
            {
                record.set_metadata(MetadataKey::ContainerBinding, container_flag(&container));
                record.set_metadata(MetadataKey::ContainerName, container);
            }
            if record.state == AppState::Unknown {
                record.state = AppState::Available;
            }
            refined += 1;
        }
        refined
    }

    /// Re-asserts ownership of a record carrying a container binding.
    pub fn adopt(&self, record: &mut AppRecord) -> bool {
        if record.metadata(MetadataKey::ContainerBinding).is_none() {
            return false;
        }
        debug!("adopting {}", record.id);
        record.management_owner = Some(self.owner.clone());
        true
    }
}

fn copy_descriptive(record: &mut AppRecord, entry: &IndexEntry) {
    if let Some(name) = &entry.name {
        record.name = Some(name.clone());
    }
    if let Some(summary) = &entry.summary {
        record.summary = Some(summary.clone());
    }
    if let Some(description) = &entry.description {
        record.description = Some(description.clone());
    }
    if let Some(icon) = &entry.icon {
        record.icon = Some(icon.clone());
    }
    if let Some(launchable) = entry.launchables.first() {
        record.launchable = Some(launchable.clone());
    }
    if let Some(origin) = &entry.origin {
        record.origin = Some(origin.clone());
    }
}

/// `apx` flag selecting a container: `apx_managed_debian` -> `--debian`.
pub fn container_flag(container: &str) -> String {
    let name = container
        .strip_prefix("apx_managed_")
        .or_else(|| container.strip_prefix("apx_"))
        .unwrap_or(container);
    format!("--{name}")
}

/// Unowned record describing an index entry, as listed to the host.
pub fn record_from_entry(entry: &IndexEntry) -> AppRecord {
    let mut sources: Vec<String> = Vec::new();
    for package in entry
        .bundles
        .iter()
        .map(|bundle| &bundle.package)
        .chain(entry.pkgnames.iter())
    {
        if !sources.contains(package) {
            sources.push(package.clone());
        }
    }
    AppRecord {
        id: entry.id.clone(),
        name: entry.name.clone(),
        summary: entry.summary.clone(),
        description: entry.description.clone(),
        icon: entry.icon.clone(),
        launchable: entry.launchables.first().cloned(),
        sources,
        origin: entry.origin.clone(),
        ..AppRecord::default()
    }
}

/// Everything `apx` needs to install or run a refined record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallParams {
    pub container_flag: String,
    pub container_name: String,
    pub package: String,
}

impl InstallParams {
    pub fn resolve(record: &AppRecord) -> Result<Self> {
        let missing = |what: &str| VanillaMetaError::InstallParams {
            app: record.id.clone(),
            reason: format!("record has no {what}"),
        };
        let container_flag = record
            .metadata(MetadataKey::ContainerBinding)
            .ok_or_else(|| missing("container binding"))?;
        let container_name = record
            .metadata(MetadataKey::ContainerName)
            .ok_or_else(|| missing("container name"))?;
        let package = record
            .default_source()
            .ok_or_else(|| missing("default source"))?;
        Ok(Self {
            container_flag: container_flag.to_string(),
            container_name: container_name.to_string(),
            package: package.to_string(),
        })
    }

    /// Command run by `apx <flag> run`: the launchable without its
    /// `.desktop` suffix, or the package name.
    pub fn launch_command(&self, record: &AppRecord) -> String {
        record
            .launchable
            .as_deref()
            .map(|launchable| launchable.strip_suffix(".desktop").unwrap_or(launchable))
            .filter(|command| !command.is_empty())
            .unwrap_or(&self.package)
            .to_string()
    }
}
