use crate::record::AppRecord;
use vanilla_appstream_silo::normalize_keyword;

/// Search terms for applications we do not ship, mapped to the component
/// we suggest in their place.
const WILDCARD_ALIASES: &[(&str, &str)] = &[
    ("fotoshop", "org.gimp.GIMP"),
    ("photoshop", "org.gimp.GIMP"),
    ("illustrator", "org.inkscape.Inkscape"),
    ("coreldraw", "org.inkscape.Inkscape"),
    ("lightroom", "org.darktable.Darktable"),
    ("premiere", "org.kde.kdenlive"),
    ("msword", "org.libreoffice.LibreOffice"),
    ("excel", "org.libreoffice.LibreOffice"),
];

/// Wildcard suggestions for `keywords`, one per suggested component, in
/// keyword order.
pub fn wildcard_suggestions(keywords: &[String]) -> Vec<AppRecord> {
    let mut suggestions: Vec<AppRecord> = Vec::new();
    for keyword in keywords.iter().filter_map(|keyword| normalize_keyword(keyword)) {
        for (_, id) in WILDCARD_ALIASES.iter().filter(|(alias, _)| *alias == keyword) {
            if suggestions.iter().any(|record| record.id == *id) {
                continue;
            }
            suggestions.push(AppRecord {
                is_wildcard: true,
                ..AppRecord::new(*id)
            });
        }
    }
    suggestions
}
