use crate::rules::Field;
use crate::rules::TOKENIZED_FIELDS;
use crate::rules::TransformRule;
use crate::rules::ordered_rules;
use crate::rules::tokenize;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Bumped whenever the persisted layout changes.
pub const SILO_FORMAT_VERSION: u32 = 1;

/// Identifies the inputs a silo was compiled from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiloHeader {
    pub format_version: u32,
    /// SHA-256 of the cached (compressed) document.
    pub document_digest: String,
    pub locales: Vec<String>,
    pub rules: Vec<TransformRule>,
}

impl SiloHeader {
    pub fn new(document_digest: String, locales: &[String], rules: &[TransformRule]) -> Self {
        Self {
            format_version: SILO_FORMAT_VERSION,
            document_digest,
            locales: locales.to_vec(),
            rules: ordered_rules(rules),
        }
    }
}

/// A package shipped inside a specific container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// The bundle `type` attribute, e.g. `apx`.
    pub kind: String,
    /// Container binding attribute, e.g. `apx_managed_debian`.
    pub container: Option<String>,
    /// Package identifier inside the container.
    pub package: String,
}

/// One advertised application (`<component>`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub origin: Option<String>,
    pub launchables: Vec<String>,
    pub mimetypes: Vec<String>,
    pub provides: Vec<String>,
    pub pkgnames: Vec<String>,
    pub icon: Option<String>,
    pub developer_name: Option<String>,
    pub homepage: Option<String>,
    pub bundles: Vec<Bundle>,
}

impl IndexEntry {
    pub fn field_values(&self, field: Field) -> Vec<&str> {
        match field {
            Field::Id => vec![self.id.as_str()],
            Field::Name => self.name.as_deref().into_iter().collect(),
            Field::Summary => self.summary.as_deref().into_iter().collect(),
            Field::Keyword => self.keywords.iter().map(String::as_str).collect(),
            Field::Launchable => self.launchables.iter().map(String::as_str).collect(),
            Field::Mimetype => self.mimetypes.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenHit {
    pub entry: u32,
    pub field: Field,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRef {
    pub entry: u32,
    pub bundle: u32,
}

/// The compiled, immutable, queryable form of one metadata document.
///
/// Lookup tables use ordered maps so two compiles of the same input
/// serialize to the same bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Silo {
    pub(crate) header: SiloHeader,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) packages: BTreeMap<String, Vec<BundleRef>>,
    pub(crate) ids: BTreeMap<String, Vec<u32>>,
    pub(crate) tokens: BTreeMap<String, Vec<TokenHit>>,
}

impl Silo {
    pub(crate) fn assemble(header: SiloHeader, entries: Vec<IndexEntry>) -> Self {
        let tokenized = header.rules.contains(&TransformRule::Tokenize);
        let mut packages: BTreeMap<String, Vec<BundleRef>> = BTreeMap::new();
        let mut ids: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        let mut tokens: BTreeMap<String, Vec<TokenHit>> = BTreeMap::new();

        for (pos, entry) in entries.iter().enumerate() {
            let pos = pos as u32;
            ids.entry(entry.id.clone()).or_default().push(pos);
            for (bundle_pos, bundle) in entry.bundles.iter().enumerate() {
                packages
                    .entry(bundle.package.clone())
                    .or_default()
                    .push(BundleRef {
                        entry: pos,
                        bundle: bundle_pos as u32,
                    });
            }
            if tokenized {
                for field in TOKENIZED_FIELDS {
                    for value in entry.field_values(field) {
                        for token in tokenize(value) {
                            let hits = tokens.entry(token).or_default();
                            let hit = TokenHit { entry: pos, field };
                            if !hits.contains(&hit) {
                                hits.push(hit);
                            }
                        }
                    }
                }
            }
        }

        Self {
            header,
            entries,
            packages,
            ids,
            tokens,
        }
    }

    pub fn header(&self) -> &SiloHeader {
        &self.header
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, pos: u32) -> Option<&IndexEntry> {
        self.entries.get(pos as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_tokenized(&self) -> bool {
        self.header.rules.contains(&TransformRule::Tokenize)
    }

    /// True when this silo was compiled from exactly these inputs.
    pub fn matches(&self, expected: &SiloHeader) -> bool {
        &self.header == expected
    }
}
