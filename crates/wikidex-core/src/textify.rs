//! Converts a single `Entity`'s claims into canonical `(entity_id, sentence)`
//! pairs. See § Textifier.

use std::collections::{BTreeMap, BTreeSet};

use crate::labels::LabelStore;
use crate::model::{Entity, Snak, SnakValue};

/// Qualifier property id marking the start of a time span.
const P_START_TIME: &str = "P580";
/// Qualifier property id marking the end of a time span.
const P_END_TIME: &str = "P582";
/// Qualifier property id marking a single point in time.
const P_POINT_IN_TIME: &str = "P585";

/// Sentinel meaning "no unit" on a quantity datavalue.
const NO_UNIT_SENTINEL: &str = "1";
/// "dimensionless quantity" entity: the other spelling of "no unit" seen on
/// real dumps, where `unit` is a full entity URL rather than the bare `"1"`.
const DIMENSIONLESS_QID: &str = "Q199";

/// Strips a Wikidata entity URL (`http://www.wikidata.org/entity/Q11573`)
/// down to its trailing Q-id, or returns `unit` unchanged if it is already
/// bare (e.g. the `"1"` sentinel).
fn unit_qid(unit: &str) -> &str {
    unit.rsplit('/').next().unwrap_or(unit)
}

/// Read-only access to property/entity labels and descriptions, used by the
/// textifier. Implemented by [`LabelStore`]; a test double only needs a
/// `HashMap`.
pub trait LabelLookup {
    fn get_label(&self, id: &str) -> Option<String>;
    fn get_description(&self, id: &str) -> Option<String>;
}

impl LabelLookup for LabelStore {
    fn get_label(&self, id: &str) -> Option<String> {
        self.get_label(id).ok().flatten()
    }

    fn get_description(&self, id: &str) -> Option<String> {
        self.get_description(id).ok().flatten()
    }
}

/// Configurable knobs for the textifier. The defaults are the ones held
/// stable in tests; see DESIGN.md open-question decisions.
#[derive(Debug, Clone)]
pub struct TextifyConfig {
    /// Cosmetic rewrites of property labels, e.g. "instance of" -> "is a".
    pub rewrites: BTreeMap<String, String>,
    /// Property labels that are never rendered.
    pub skip_set: BTreeSet<String>,
    /// Whether `wikibase-item` sentences include parenthetical glosses of
    /// the subject and object (`"<S> (<Sd>) <Pl> <O> (<Od>)."`). Default
    /// `false`: the plain form `"<S> <Pl> <O>."`.
    pub include_glosses: bool,
}

impl Default for TextifyConfig {
    fn default() -> Self {
        Self {
            rewrites: default_rewrites(),
            skip_set: default_skip_set(),
            include_glosses: false,
        }
    }
}

fn default_rewrites() -> BTreeMap<String, String> {
    [
        ("instance of", "is a"),
        ("postal code", "has postal code"),
        ("local dialing code", "has local dialing code"),
        ("licence plate code", "has license plate code"),
        ("enclave within", "is an enclave within"),
        ("located in time zone", "is located in time zone"),
        ("highest point", "has highest point"),
        ("continent", "is part of continent"),
        ("hashtag", "has hashtag"),
        ("award received", "has received award"),
        (
            "located in or next to body of water",
            "is next to river or lake or sea",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_skip_set() -> BTreeSet<String> {
    [
        "topic's main category",
        "topic's main wikimedia portal",
        "flag",
        "permanent duplicated item",
        "history of topic",
        "geography of topic",
        "related category",
        "demographics of topic",
        "economy of topic",
        "different from",
        "on focus list of wikimedia project",
        "open data portal",
        "commons category",
        "ipa transcription",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Turns entities into `(entity_id, sentence)` pairs.
pub struct Textifier<'a, L: LabelLookup> {
    labels: &'a L,
    config: TextifyConfig,
}

impl<'a, L: LabelLookup> Textifier<'a, L> {
    pub fn new(labels: &'a L) -> Self {
        Self {
            labels,
            config: TextifyConfig::default(),
        }
    }

    pub fn with_config(labels: &'a L, config: TextifyConfig) -> Self {
        Self { labels, config }
    }

    /// Render every claim of `entity` into zero or more sentences, in claim
    /// order. Scholar articles yield nothing.
    pub fn textify(&self, entity: &Entity) -> Vec<(String, String)> {
        if entity.is_scholar_article() {
            return Vec::new();
        }

        let Some(subject_label) = self.subject_label(entity) else {
            return Vec::new();
        };
        let subject_desc = self.labels.get_description(&entity.id);

        let mut out = Vec::new();
        for (property_id, statements) in &entity.claims {
            let Some(raw_property_label) = self.labels.get_label(property_id) else {
                continue;
            };
            if self.is_skipped(&raw_property_label) {
                continue;
            }
            let property_phrase = self
                .config
                .rewrites
                .get(&raw_property_label)
                .cloned()
                .unwrap_or(raw_property_label);

            for statement in statements {
                let span = time_span(&statement.qualifiers);
                let phrase = if span.is_closed() {
                    shift_to_past(&property_phrase)
                } else {
                    property_phrase.clone()
                };

                let Some(sentence) = self.render_statement(
                    entity,
                    &subject_label,
                    subject_desc.as_deref(),
                    &phrase,
                    &statement.mainsnak,
                    &span,
                ) else {
                    continue;
                };
                out.push((entity.id.clone(), sentence));
            }
        }
        out
    }

    fn subject_label(&self, entity: &Entity) -> Option<String> {
        entity
            .labels
            .get("en")
            .cloned()
            .or_else(|| self.labels.get_label(&entity.id))
    }

    fn is_skipped(&self, property_label: &str) -> bool {
        self.config.skip_set.contains(property_label) || property_label.starts_with("category")
    }

    fn render_statement(
        &self,
        _entity: &Entity,
        subject_label: &str,
        subject_desc: Option<&str>,
        phrase: &str,
        mainsnak: &Snak,
        span: &TimeSpan,
    ) -> Option<String> {
        let value = mainsnak.value()?;
        let span_suffix = span.phrase().map(|p| format!(" {p}")).unwrap_or_default();

        let body = match value {
            SnakValue::WikibaseItem { entity_id } => {
                let object_label = self.labels.get_label(entity_id)?;
                if self.config.include_glosses {
                    let subject_gloss = subject_desc
                        .map(|d| format!(" ({d})"))
                        .unwrap_or_default();
                    let object_gloss = self
                        .labels
                        .get_description(entity_id)
                        .map(|d| format!(" ({d})"))
                        .unwrap_or_default();
                    format!(
                        "{subject_label}{subject_gloss} {phrase} {object_label}{object_gloss}{span_suffix}."
                    )
                } else {
                    format!("{subject_label} {phrase} {object_label}{span_suffix}.")
                }
            }
            SnakValue::Time { iso_like_time } => {
                let date = format_date(iso_like_time.as_deref());
                format!("{subject_label} {phrase} on {date}{span_suffix}.")
            }
            SnakValue::String(text) => {
                format!("{subject_label} {phrase} {text}{span_suffix}.")
            }
            SnakValue::Quantity { amount, unit } => {
                let amount = amount.strip_prefix('+').unwrap_or(amount);
                let unit_qid = unit.as_deref().map(unit_qid);
                match unit_qid {
                    Some(qid) if qid != NO_UNIT_SENTINEL && qid != DIMENSIONLESS_QID => {
                        let unit_label = self.labels.get_label(qid)?;
                        format!("{subject_label} {phrase} {amount} {unit_label}{span_suffix}.")
                    }
                    _ => format!("{subject_label} {phrase} {amount}{span_suffix}."),
                }
            }
            SnakValue::Other => return None,
        };
        Some(body)
    }
}

/// One of the four time-span phrases the qualifiers can produce, or none.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TimeSpan {
    Since(String),
    FromUntil(String, String),
    Until(String),
    /// A bare point-in-time qualifier, with whether it names a past date.
    At(String, bool),
    None,
}

impl TimeSpan {
    fn phrase(&self) -> Option<String> {
        match self {
            TimeSpan::Since(d) => Some(format!("since {d} until today")),
            TimeSpan::FromUntil(from, until) => Some(format!("from {from} until {until}")),
            TimeSpan::Until(d) => Some(format!("until {d}")),
            TimeSpan::At(d, _) => Some(format!("in {d}")),
            TimeSpan::None => None,
        }
    }

    /// A statement is "closed" when it has an end date, or its point-in-time
    /// qualifier names a date already in the past.
    fn is_closed(&self) -> bool {
        match self {
            TimeSpan::FromUntil(..) | TimeSpan::Until(_) => true,
            TimeSpan::At(_, past) => *past,
            TimeSpan::Since(_) | TimeSpan::None => false,
        }
    }
}

fn time_span(qualifiers: &std::collections::HashMap<String, Vec<Snak>>) -> TimeSpan {
    let start = qualifier_date(qualifiers, P_START_TIME);
    let end = qualifier_date(qualifiers, P_END_TIME);
    let point = qualifier_raw_year(qualifiers, P_POINT_IN_TIME);

    match (start, end, point) {
        (Some(start), Some(end), _) => TimeSpan::FromUntil(start, end),
        (Some(start), None, _) => TimeSpan::Since(start),
        (None, Some(end), _) => TimeSpan::Until(end),
        (None, None, Some((formatted, year))) => {
            let current_year = current_year();
            TimeSpan::At(formatted, year < current_year)
        }
        (None, None, None) => TimeSpan::None,
    }
}

fn current_year() -> i64 {
    chrono::Utc::now().format("%Y").to_string().parse().unwrap_or(0)
}

fn qualifier_date(
    qualifiers: &std::collections::HashMap<String, Vec<Snak>>,
    property: &str,
) -> Option<String> {
    let snak = qualifiers.get(property)?.first()?;
    match snak.value()? {
        SnakValue::Time { iso_like_time } => Some(format_date(iso_like_time.as_deref())),
        _ => None,
    }
}

/// Like [`qualifier_date`] but also returns the parsed year, used to decide
/// whether a bare point-in-time qualifier is in the past.
fn qualifier_raw_year(
    qualifiers: &std::collections::HashMap<String, Vec<Snak>>,
    property: &str,
) -> Option<(String, i64)> {
    let snak = qualifiers.get(property)?.first()?;
    match snak.value()? {
        SnakValue::Time { iso_like_time } => {
            let raw = iso_like_time.as_deref()?;
            let year = parse_wikidata_time(raw)?.year;
            Some((format_date(Some(raw)), year))
        }
        _ => None,
    }
}

/// Shifts a property phrase from present to past tense when its governing
/// statement is closed ("is" -> "was", "has" -> "had").
fn shift_to_past(phrase: &str) -> String {
    if let Some(rest) = phrase.strip_prefix("is ") {
        format!("was {rest}")
    } else if let Some(rest) = phrase.strip_prefix("has ") {
        format!("had {rest}")
    } else {
        phrase.to_string()
    }
}

struct WikidataTime {
    year: i64,
    month: u32,
    day: u32,
}

fn parse_wikidata_time(raw: &str) -> Option<WikidataTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (sign, rest): (i64, &str) = match raw.as_bytes()[0] {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let date_part = rest.split('T').next().unwrap_or(rest);
    let mut parts = date_part.split('-');
    let year: i64 = parts.next()?.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(s) if !s.is_empty() => s.parse().ok()?,
        _ => 0,
    };
    let day: u32 = match parts.next() {
        Some(s) if !s.is_empty() => s.parse().ok()?,
        _ => 0,
    };
    Some(WikidataTime {
        year: sign * year,
        month,
        day,
    })
}

/// Formats a Wikidata `±YYYY[-MM[-DD]]T...Z` time value per § Date
/// formatting. Returns `"unknown date"` on any validation failure or when
/// `iso_like_time` is `None`.
pub fn format_date(iso_like_time: Option<&str>) -> String {
    let Some(raw) = iso_like_time else {
        return "unknown date".to_string();
    };
    let Some(parsed) = parse_wikidata_time(raw) else {
        return "unknown date".to_string();
    };
    let WikidataTime { year, month, day } = parsed;

    if month == 0 {
        return format!("{year:04}");
    }
    if !(1..=12).contains(&month) {
        return "unknown date".to_string();
    }
    if day == 0 {
        return format!("{year:04}-{month:02}");
    }
    if !(1..=31).contains(&day) {
        return "unknown date".to_string();
    }
    format!("{year:04}-{month:02}-{day:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeLabels(HashMap<&'static str, (&'static str, &'static str)>);

    impl LabelLookup for FakeLabels {
        fn get_label(&self, id: &str) -> Option<String> {
            self.0.get(id).map(|(l, _)| l.to_string())
        }
        fn get_description(&self, id: &str) -> Option<String> {
            self.0.get(id).map(|(_, d)| d.to_string())
        }
    }

    #[test]
    fn e3_date_formatting() {
        assert_eq!(format_date(Some("+2016-00-00T00:00:00Z")), "2016");
        assert_eq!(format_date(Some("+2016-07-00T00:00:00Z")), "2016-07");
        assert_eq!(format_date(Some("+2016-13-00T00:00:00Z")), "unknown date");
        assert_eq!(format_date(Some("")), "unknown date");
        assert_eq!(format_date(None), "unknown date");
        assert_eq!(format_date(Some("+2016-07-15T00:00:00Z")), "2016-07-15");
        assert_eq!(format_date(Some("+2016-07-32T00:00:00Z")), "unknown date");
    }

    fn entity_from(claims_json: &str) -> Entity {
        let json = format!(
            r#"{{"id": "Q64", "type": "item",
                "labels": {{"en": {{"language":"en","value":"Berlin"}}}},
                "descriptions": {{"en": {{"language":"en","value":"capital of Germany"}}}},
                "claims": {claims_json}}}"#
        );
        Entity::from_json_line(&json).unwrap()
    }

    #[test]
    fn e1_wikibase_item_sentence() {
        let labels = FakeLabels(HashMap::from([
            ("P6", ("head of government", "")),
            ("Q206", ("Kai Wegner", "")),
        ]));
        let entity = entity_from(
            r#"{"P6": [{"mainsnak": {"snaktype":"value","datatype":"wikibase-item","datavalue":{"value":{"id":"Q206"},"type":"wikibase-entityid"}}, "qualifiers": {}}]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].1.contains("Berlin"));
        assert!(sentences[0].1.contains("head of government"));
        assert!(sentences[0].1.contains("Kai Wegner"));
    }

    #[test]
    fn e2_scholar_article_yields_nothing() {
        let labels = FakeLabels(HashMap::new());
        let entity = entity_from(
            r#"{"P31": [{"mainsnak": {"snaktype":"value","datatype":"wikibase-item","datavalue":{"value":{"id":"Q13442814"},"type":"wikibase-entityid"}}, "qualifiers": {}}]}"#,
        );
        assert!(Textifier::new(&labels).textify(&entity).is_empty());
    }

    #[test]
    fn skip_set_and_category_prefix_are_honored() {
        let labels = FakeLabels(HashMap::from([
            ("P373", ("commons category", "")),
            ("P910", ("category combines topics", "")),
        ]));
        let entity = entity_from(
            r#"{
                "P373": [{"mainsnak": {"snaktype":"value","datatype":"string","datavalue":{"value":"Berlin","type":"string"}}, "qualifiers": {}}],
                "P910": [{"mainsnak": {"snaktype":"value","datatype":"string","datavalue":{"value":"Berlin","type":"string"}}, "qualifiers": {}}]
            }"#,
        );
        assert!(Textifier::new(&labels).textify(&entity).is_empty());
    }

    #[test]
    fn closed_statement_shifts_verb_to_past() {
        let labels = FakeLabels(HashMap::from([
            ("P6", ("head of government", "")),
            ("Q1", ("Someone", "")),
        ]));
        let entity = entity_from(
            r#"{"P6": [{
                "mainsnak": {"snaktype":"value","datatype":"wikibase-item","datavalue":{"value":{"id":"Q1"},"type":"wikibase-entityid"}},
                "qualifiers": {"P582": [{"snaktype":"value","datatype":"time","datavalue":{"value":{"time":"+2001-01-01T00:00:00Z"},"type":"time"}}]}
            }]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert_eq!(sentences.len(), 1);
        // "head of government" has no rewrite in this entity so stays present tense;
        // use instance-of to verify the was/had shift instead.
        let labels2 = FakeLabels(HashMap::from([
            ("P31", ("instance of", "")),
            ("Q5", ("human", "")),
        ]));
        let entity2 = entity_from(
            r#"{"P31": [{
                "mainsnak": {"snaktype":"value","datatype":"wikibase-item","datavalue":{"value":{"id":"Q5"},"type":"wikibase-entityid"}},
                "qualifiers": {"P582": [{"snaktype":"value","datatype":"time","datavalue":{"value":{"time":"+2001-01-01T00:00:00Z"},"type":"time"}}]}
            }]}"#,
        );
        let sentences2 = Textifier::new(&labels2).textify(&entity2);
        assert!(sentences2[0].1.contains("was a"));
    }

    #[test]
    fn open_statement_keeps_present_tense() {
        let labels = FakeLabels(HashMap::from([
            ("P31", ("instance of", "")),
            ("Q5", ("human", "")),
        ]));
        let entity = entity_from(
            r#"{"P31": [{
                "mainsnak": {"snaktype":"value","datatype":"wikibase-item","datavalue":{"value":{"id":"Q5"},"type":"wikibase-entityid"}},
                "qualifiers": {}
            }]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert!(sentences[0].1.contains("is a"));
    }

    #[test]
    fn quantity_with_unit() {
        let labels = FakeLabels(HashMap::from([
            ("P1082", ("population", "")),
            ("Q1", ("people", "")),
        ]));
        let entity = entity_from(
            r#"{"P1082": [{"mainsnak": {"snaktype":"value","datatype":"quantity","datavalue":{"value":{"amount":"+3769495","unit":"Q1"},"type":"quantity"}}, "qualifiers": {}}]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert!(sentences[0].1.contains("3769495"));
        assert!(sentences[0].1.contains("people"));
    }

    #[test]
    fn quantity_with_unit_as_entity_url() {
        let labels = FakeLabels(HashMap::from([
            ("P2044", ("elevation above sea level", "")),
            ("Q11573", ("metre", "")),
        ]));
        let entity = entity_from(
            r#"{"P2044": [{"mainsnak": {"snaktype":"value","datatype":"quantity","datavalue":{"value":{"amount":"+34","unit":"http://www.wikidata.org/entity/Q11573"},"type":"quantity"}}, "qualifiers": {}}]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].1.contains("34"));
        assert!(sentences[0].1.contains("metre"));
    }

    #[test]
    fn quantity_with_dimensionless_unit_url_is_bare() {
        let labels = FakeLabels(HashMap::from([("P1082", ("population", ""))]));
        let entity = entity_from(
            r#"{"P1082": [{"mainsnak": {"snaktype":"value","datatype":"quantity","datavalue":{"value":{"amount":"+3769495","unit":"http://www.wikidata.org/entity/Q199"},"type":"quantity"}}, "qualifiers": {}}]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert_eq!(sentences[0].1, "Berlin population 3769495.");
    }

    #[test]
    fn quantity_with_no_unit_sentinel() {
        let labels = FakeLabels(HashMap::from([("P1082", ("population", ""))]));
        let entity = entity_from(
            r#"{"P1082": [{"mainsnak": {"snaktype":"value","datatype":"quantity","datavalue":{"value":{"amount":"+3769495","unit":"1"},"type":"quantity"}}, "qualifiers": {}}]}"#,
        );
        let sentences = Textifier::new(&labels).textify(&entity);
        assert_eq!(sentences[0].1, "Berlin population 3769495.");
    }
}
