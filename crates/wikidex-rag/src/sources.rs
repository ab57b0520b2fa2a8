//! Source URL derivation for retrieved chunks (§4.8 addition).
//!
//! `original_source/askwikidata.py`'s `read_data` stamps every chunk with a
//! `source` metadata field of exactly this shape
//! (`f"https://www.wikidata.org/wiki/{q_id}"`); this module generalizes that
//! one hardcoded f-string into a configurable `{id}` template.

use std::collections::HashSet;

/// Default template, matching the Wikidata convention the original source
/// hardcodes.
pub const DEFAULT_SOURCE_URL_TEMPLATE: &str = "https://www.wikidata.org/wiki/{id}";

/// Render `template`'s `{id}` placeholder with `entity_id`.
pub fn source_url(template: &str, entity_id: &str) -> String {
    template.replace("{id}", entity_id)
}

/// The distinct source URLs for `entity_ids`, in first-seen order.
pub fn distinct_sources<I, S>(template: &str, entity_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in entity_ids {
        let id = id.as_ref();
        if seen.insert(id.to_string()) {
            out.push(source_url(template, id));
        }
    }
    out
}
