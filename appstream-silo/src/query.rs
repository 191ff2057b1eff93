use crate::model::Bundle;
use crate::model::IndexEntry;
use crate::model::Silo;
use crate::rules::Field;
use crate::rules::TOKENIZED_FIELDS;
use crate::rules::normalize_keyword;
use crate::rules::tokenize;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Structured bundle lookup, replacing a path query over the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleQuery<'a> {
    pub package: &'a str,
    /// Only consider entries tagged with this origin.
    pub origin: Option<&'a str>,
    /// Only consider bundles carrying a container binding attribute.
    pub require_container: bool,
}

impl<'a> BundleQuery<'a> {
    pub fn package(package: &'a str) -> Self {
        Self {
            package,
            origin: None,
            require_container: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BundleMatch<'s> {
    pub position: u32,
    pub entry: &'s IndexEntry,
    pub bundle: &'s Bundle,
}

/// Keyword search over the tokenized fields.
///
/// Every keyword must prefix-match a token of the entry. Results are ordered
/// by score, then id, then document position, so identical input always
/// yields identical output.
pub fn search<'s>(silo: &'s Silo, keywords: &[String]) -> Vec<&'s IndexEntry> {
    let keywords: Vec<String> = keywords
        .iter()
        .filter_map(|keyword| normalize_keyword(keyword))
        .collect();
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut totals: BTreeMap<u32, u32> = BTreeMap::new();
    for (idx, keyword) in keywords.iter().enumerate() {
        let scores = if silo.is_tokenized() {
            keyword_scores_from_tokens(silo, keyword)
        } else {
            keyword_scores_by_scan(silo, keyword)
        };
        if idx == 0 {
            totals = scores;
        } else {
            totals = totals
                .into_iter()
                .filter_map(|(pos, total)| scores.get(&pos).map(|score| (pos, total + score)))
                .collect();
        }
        if totals.is_empty() {
            return Vec::new();
        }
    }

    let mut ranked: Vec<(u32, &IndexEntry, u32)> = totals
        .into_iter()
        .filter_map(|(pos, score)| silo.entry(pos).map(|entry| (score, entry, pos)))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.id.cmp(&b.1.id))
            .then_with(|| a.2.cmp(&b.2))
    });
    ranked.into_iter().map(|(_, entry, _)| entry).collect()
}

fn hit_score(field: Field, token: &str, keyword: &str) -> u32 {
    if token == keyword {
        field.weight() * 2
    } else {
        field.weight()
    }
}

fn keyword_scores_from_tokens(silo: &Silo, keyword: &str) -> BTreeMap<u32, u32> {
    let mut scores: BTreeMap<u32, u32> = BTreeMap::new();
    let range = silo
        .tokens
        .range::<str, _>((Bound::Included(keyword), Bound::Unbounded));
    for (token, hits) in range {
        if !token.starts_with(keyword) {
            break;
        }
        for hit in hits {
            let score = hit_score(hit.field, token, keyword);
            let best = scores.entry(hit.entry).or_insert(0);
            *best = (*best).max(score);
        }
    }
    scores
}

fn keyword_scores_by_scan(silo: &Silo, keyword: &str) -> BTreeMap<u32, u32> {
    let mut scores = BTreeMap::new();
    for (pos, entry) in silo.entries.iter().enumerate() {
        let mut best = 0;
        for field in TOKENIZED_FIELDS {
            for value in entry.field_values(field) {
                for token in tokenize(value) {
                    if token.starts_with(keyword) {
                        best = best.max(hit_score(field, &token, keyword));
                    }
                }
            }
        }
        if best > 0 {
            scores.insert(pos as u32, best);
        }
    }
    scores
}

/// Entries describing the same application as the entry at `reference`:
/// the same id from another bundle or origin, or an id/launchable link via
/// `provides`. The reference itself is excluded; results follow document
/// order.
pub fn find_alternates_of(silo: &Silo, reference: u32) -> Vec<&IndexEntry> {
    let Some(subject) = silo.entry(reference) else {
        return Vec::new();
    };
    silo.entries
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos as u32 != reference)
        .filter(|(_, candidate)| is_alternate(subject, candidate))
        .map(|(_, candidate)| candidate)
        .collect()
}

fn is_alternate(subject: &IndexEntry, candidate: &IndexEntry) -> bool {
    candidate.id == subject.id
        || subject.provides.contains(&candidate.id)
        || candidate.provides.contains(&subject.id)
        || candidate
            .launchables
            .iter()
            .any(|launchable| subject.launchables.contains(launchable))
}

/// Positions of the entries with exactly this component id.
pub fn entries_by_id<'s>(silo: &'s Silo, id: &str) -> &'s [u32] {
    silo.ids.get(id).map(Vec::as_slice).unwrap_or_default()
}

/// Finds the first bundle, in document order, whose package identifier
/// equals `query.package`. No match is an ordinary `None`.
pub fn find_bundle_for<'s>(silo: &'s Silo, query: &BundleQuery<'_>) -> Option<BundleMatch<'s>> {
    silo.packages
        .get(query.package)?
        .iter()
        .filter_map(|bundle_ref| {
            let entry = silo.entry(bundle_ref.entry)?;
            let bundle = entry.bundles.get(bundle_ref.bundle as usize)?;
            Some(BundleMatch {
                position: bundle_ref.entry,
                entry,
                bundle,
            })
        })
        .find(|candidate| {
            let origin_ok = query
                .origin
                .is_none_or(|origin| candidate.entry.origin.as_deref() == Some(origin));
            let container_ok = !query.require_container || candidate.bundle.container.is_some();
            origin_ok && container_ok
        })
}
