//! Locale selection for translatable component text.

use std::collections::BTreeMap;

/// The pseudo-locale of untranslated text.
pub const UNTRANSLATED: &str = "C";

/// Expands `de_DE.UTF-8@euro` style locales into the fallbacks that
/// translations are commonly tagged with, preserving priority order.
///
/// `C` is appended when the caller did not place it explicitly, so
/// untranslated text is always the last resort.
pub fn expand_locales(locales: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |value: &str| {
        if !value.is_empty() && !expanded.iter().any(|existing| existing == value) {
            expanded.push(value.to_string());
        }
    };
    for locale in locales {
        let locale = locale.trim();
        push(locale);
        let without_modifier = locale.split('@').next().unwrap_or(locale);
        let without_encoding = without_modifier.split('.').next().unwrap_or(without_modifier);
        push(without_encoding);
        if let Some((language, _territory)) = without_encoding.split_once('_') {
            push(language);
        }
    }
    push(UNTRANSLATED);
    expanded
}

fn rank(lang: Option<&str>, locales: &[String]) -> Option<usize> {
    let lang = lang.unwrap_or(UNTRANSLATED);
    locales.iter().position(|locale| locale == lang)
}

/// Keeps the best-ranked translation of a single value.
#[derive(Debug, Default)]
pub(crate) struct LocalizedText {
    best: Option<(usize, String)>,
}

impl LocalizedText {
    pub(crate) fn offer(&mut self, lang: Option<&str>, value: String, locales: &[String]) {
        let Some(rank) = rank(lang, locales) else {
            return;
        };
        let better = match &self.best {
            Some((current, _)) => rank < *current,
            None => true,
        };
        if better {
            self.best = Some((rank, value));
        }
    }

    pub(crate) fn resolve(self) -> Option<String> {
        self.best.map(|(_, value)| value)
    }
}

/// Keeps the best-ranked translation of a list value such as keywords.
#[derive(Debug, Default)]
pub(crate) struct LocalizedList {
    by_rank: BTreeMap<usize, Vec<String>>,
}

impl LocalizedList {
    pub(crate) fn offer(&mut self, lang: Option<&str>, value: String, locales: &[String]) {
        if let Some(rank) = rank(lang, locales) {
            let values = self.by_rank.entry(rank).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }

    pub(crate) fn resolve(self) -> Vec<String> {
        self.by_rank.into_values().next().unwrap_or_default()
    }
}
