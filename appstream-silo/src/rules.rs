use serde::Deserialize;
use serde::Serialize;

const MIN_TOKEN_CHARS: usize = 2;

/// Rewrites applied to the parsed document while it is compiled.
///
/// Rules always run in a fixed order (origin tagging before tokenization),
/// whatever order the caller lists them in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformRule {
    /// Stamp every `components` root with this origin.
    OriginTag { origin: String },
    /// Pre-compute search tokens for [`TOKENIZED_FIELDS`].
    Tokenize,
}

impl TransformRule {
    fn rank(&self) -> u8 {
        match self {
            TransformRule::OriginTag { .. } => 0,
            TransformRule::Tokenize => 1,
        }
    }
}

/// Returns the rules in application order, dropping exact duplicates.
pub fn ordered_rules(rules: &[TransformRule]) -> Vec<TransformRule> {
    let mut ordered: Vec<TransformRule> = Vec::with_capacity(rules.len());
    for rule in rules {
        if !ordered.contains(rule) {
            ordered.push(rule.clone());
        }
    }
    ordered.sort_by_key(TransformRule::rank);
    ordered
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// Skip malformed components instead of failing the whole compile.
    pub ignore_invalid: bool,
}

/// Textual component fields that take part in keyword search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Id,
    Keyword,
    Launchable,
    Mimetype,
    Name,
    Summary,
}

pub const TOKENIZED_FIELDS: [Field; 6] = [
    Field::Id,
    Field::Keyword,
    Field::Launchable,
    Field::Mimetype,
    Field::Name,
    Field::Summary,
];

impl Field {
    pub fn weight(self) -> u32 {
        match self {
            Field::Name => 80,
            Field::Id => 60,
            Field::Keyword => 50,
            Field::Summary => 30,
            Field::Launchable => 20,
            Field::Mimetype => 10,
        }
    }
}

/// Splits a field value into lowercase search tokens.
///
/// The whole trimmed value is a token, as is every alphanumeric run of at
/// least two characters, so `org.example.App` yields `org.example.app`,
/// `org`, `example` and `app`.
pub fn tokenize(value: &str) -> Vec<String> {
    let lower = value.trim().to_lowercase();
    let mut tokens = Vec::new();
    if lower.chars().count() >= MIN_TOKEN_CHARS {
        tokens.push(lower.clone());
    }
    for run in lower.split(|ch: char| !ch.is_alphanumeric()) {
        if run.chars().count() >= MIN_TOKEN_CHARS && !tokens.iter().any(|t| t == run) {
            tokens.push(run.to_string());
        }
    }
    tokens
}

/// Normalizes a user supplied search keyword the same way tokens are.
pub fn normalize_keyword(keyword: &str) -> Option<String> {
    let normalized = keyword.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
