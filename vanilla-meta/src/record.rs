use std::collections::BTreeMap;
use std::fmt;

/// Well-known metadata keys this subsystem reads or writes on a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    /// `--<container>` flag passed to `apx`; its presence marks adoptable
    /// records.
    ContainerBinding,
    ContainerName,
    PackagingFormat,
    PackagingBaseCssColor,
    PackagingIcon,
}

impl MetadataKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKey::ContainerBinding => "Vanilla::apx_container",
            MetadataKey::ContainerName => "Vanilla::container_name",
            MetadataKey::PackagingFormat => "GnomeSoftware::PackagingFormat",
            MetadataKey::PackagingBaseCssColor => "GnomeSoftware::PackagingBaseCssColor",
            MetadataKey::PackagingIcon => "GnomeSoftware::PackagingIcon",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Unknown,
    Available,
    Installing,
    Installed,
}

/// An application record as the host hands it over for claiming and
/// refining.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppRecord {
    pub id: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub launchable: Option<String>,
    /// Package names; the first one is the default source.
    pub sources: Vec<String>,
    pub management_owner: Option<String>,
    pub origin: Option<String>,
    pub state: AppState,
    /// Suggested but not provided by anyone.
    pub is_wildcard: bool,
    pub metadata: BTreeMap<MetadataKey, String>,
}

impl AppRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn default_source(&self) -> Option<&str> {
        self.sources.first().map(String::as_str)
    }

    pub fn metadata(&self, key: MetadataKey) -> Option<&str> {
        self.metadata.get(&key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: MetadataKey, value: impl Into<String>) {
        self.metadata.insert(key, value.into());
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.management_owner.as_deref() == Some(owner)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshFlags {
    pub interactive: bool,
}

/// Field groups a refine pass should fill in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefineFlags {
    /// Name, summary, description, icon, launchable and origin.
    pub require_descriptive: bool,
    /// Container binding needed to install or launch.
    pub require_setup: bool,
}

impl Default for RefineFlags {
    fn default() -> Self {
        Self {
            require_descriptive: true,
            require_setup: true,
        }
    }
}

/// A listing request. Only keyword and alternate lookups are answerable
/// from the metadata index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppQuery {
    pub keywords: Vec<String>,
    /// Record id whose alternates should be listed.
    pub alternate_of: Option<String>,
    pub category: Option<String>,
    pub is_installed: Option<bool>,
}

impl AppQuery {
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn alternates_of(id: impl Into<String>) -> Self {
        Self {
            alternate_of: Some(id.into()),
            ..Self::default()
        }
    }
}
