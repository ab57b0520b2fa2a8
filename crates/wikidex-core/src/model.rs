//! The Wikidata-style entity model: `Entity`, `Statement` and `Snak`.
//!
//! `Snak` values are duck-typed in the source data (the shape of `datavalue`
//! depends on the sibling `datatype` field), so this module decodes them by
//! hand from a [`serde_json::Value`] rather than leaning on a derived
//! `Deserialize` impl. Unknown datatypes decode to [`SnakValue::Other`]
//! instead of failing the whole entity.

use std::collections::HashMap;

use serde::de::Error as _;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Property id used for the "instance of" claim.
pub const INSTANCE_OF: &str = "P31";
/// Class id for scholarly articles, filtered out entirely by the textifier.
pub const SCHOLAR_ARTICLE_CLASS: &str = "Q13442814";

/// Coarse entity kind. Only `Item` and `Property` are meaningful to the
/// pipeline; anything else is carried through for completeness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityType {
    Item,
    Property,
    Other(String),
}

impl EntityType {
    fn from_str(s: &str) -> Self {
        match s {
            "item" => EntityType::Item,
            "property" => EntityType::Property,
            other => EntityType::Other(other.to_string()),
        }
    }
}

/// A single Wikidata-style entity: an item or property plus its claims.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub labels: HashMap<String, String>,
    pub descriptions: HashMap<String, String>,
    pub claims: HashMap<String, Vec<Statement>>,
}

/// A property-value assertion, optionally qualified by further snaks
/// (e.g. start/end time).
#[derive(Debug, Clone)]
pub struct Statement {
    pub mainsnak: Snak,
    pub qualifiers: HashMap<String, Vec<Snak>>,
}

/// The atomic value of a claim's main or qualifier slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Snak {
    Value(SnakValue),
    SomeValue,
    NoValue,
}

impl Snak {
    /// Returns the inner value snak, if any.
    pub fn value(&self) -> Option<&SnakValue> {
        match self {
            Snak::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Datatype-dependent payload of a `snaktype = value` snak.
#[derive(Debug, Clone, PartialEq)]
pub enum SnakValue {
    WikibaseItem { entity_id: String },
    Time { iso_like_time: Option<String> },
    String(String),
    Quantity { amount: String, unit: Option<String> },
    /// A recognized-but-unhandled datatype (dropped by the textifier, not
    /// treated as an error per the "duck-typed data values" guidance).
    Other,
}

impl Entity {
    /// Parse a single dump line (one JSON object, trailing comma already
    /// stripped) into an `Entity`.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|source| CoreError::Parse {
                line: line.to_string(),
                source,
            })?;
        Self::from_json_value(&value).ok_or_else(|| CoreError::Parse {
            line: line.to_string(),
            source: serde_json::Error::custom("malformed entity shape"),
        })
    }

    fn from_json_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let entity_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(EntityType::from_str)
            .unwrap_or(EntityType::Other(String::new()));

        let labels = string_map(value.get("labels"));
        let descriptions = string_map(value.get("descriptions"));
        let claims = parse_claims(value.get("claims"));

        Some(Entity {
            id,
            entity_type,
            labels,
            descriptions,
            claims,
        })
    }

    /// True if this entity's `instance of` (P31) claims include the
    /// scholar-article class. Such entities are skipped entirely by the
    /// textifier (§ scholar-article filter).
    pub fn is_scholar_article(&self) -> bool {
        self.claims
            .get(INSTANCE_OF)
            .map(|statements| {
                statements.iter().any(|s| {
                    matches!(
                        s.mainsnak.value(),
                        Some(SnakValue::WikibaseItem { entity_id }) if entity_id == SCHOLAR_ARTICLE_CLASS
                    )
                })
            })
            .unwrap_or(false)
    }
}

/// Decode a `labels`/`descriptions` object (`lang -> { language, value }`)
/// into a flat `lang -> value` map.
fn string_map(value: Option<&Value>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(Value::Object(map)) = value else {
        return out;
    };
    for (lang, entry) in map {
        if let Some(text) = entry.get("value").and_then(Value::as_str) {
            out.insert(lang.clone(), text.to_string());
        }
    }
    out
}

fn parse_claims(value: Option<&Value>) -> HashMap<String, Vec<Statement>> {
    let mut out = HashMap::new();
    let Some(Value::Object(map)) = value else {
        return out;
    };
    for (prop, statements) in map {
        let Some(array) = statements.as_array() else {
            continue;
        };
        let parsed: Vec<Statement> = array.iter().filter_map(parse_statement).collect();
        if !parsed.is_empty() {
            out.insert(prop.clone(), parsed);
        }
    }
    out
}

fn parse_statement(value: &Value) -> Option<Statement> {
    let mainsnak = parse_snak(value.get("mainsnak")?)?;
    let qualifiers = value
        .get("qualifiers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(prop, snaks)| {
                    let snaks = snaks
                        .as_array()
                        .map(|arr| arr.iter().filter_map(parse_snak).collect())
                        .unwrap_or_default();
                    (prop.clone(), snaks)
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Statement {
        mainsnak,
        qualifiers,
    })
}

fn parse_snak(value: &Value) -> Option<Snak> {
    match value.get("snaktype")?.as_str()? {
        "somevalue" => Some(Snak::SomeValue),
        "novalue" => Some(Snak::NoValue),
        "value" => {
            let datatype = value.get("datatype").and_then(Value::as_str).unwrap_or("");
            let datavalue = value.get("datavalue")?;
            Some(Snak::Value(parse_snak_value(datatype, datavalue)))
        }
        _ => None,
    }
}

fn parse_snak_value(datatype: &str, datavalue: &Value) -> SnakValue {
    let inner = datavalue.get("value");
    match datatype {
        "wikibase-item" | "wikibase-entityid" => inner
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
            .map(|id| SnakValue::WikibaseItem {
                entity_id: id.to_string(),
            })
            .unwrap_or(SnakValue::Other),
        "time" => SnakValue::Time {
            iso_like_time: inner
                .and_then(|v| v.get("time"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        "string" | "external-id" | "url" | "commonsMedia" | "monolingualtext" => inner
            .and_then(|v| {
                v.as_str()
                    .map(str::to_string)
                    .or_else(|| v.get("text").and_then(Value::as_str).map(str::to_string))
            })
            .map(SnakValue::String)
            .unwrap_or(SnakValue::Other),
        "quantity" => inner
            .and_then(|v| {
                let amount = v.get("amount")?.as_str()?.to_string();
                let unit = v.get("unit").and_then(Value::as_str).map(str::to_string);
                Some(SnakValue::Quantity { amount, unit })
            })
            .unwrap_or(SnakValue::Other),
        _ => SnakValue::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_json(claims: &str) -> String {
        format!(
            r#"{{
                "id": "Q64",
                "type": "item",
                "labels": {{"en": {{"language": "en", "value": "Berlin"}}}},
                "descriptions": {{"en": {{"language": "en", "value": "capital of Germany"}}}},
                "claims": {claims}
            }}"#
        )
    }

    #[test]
    fn parses_wikibase_item_claim() {
        let json = entity_json(
            r#"{
                "P31": [{
                    "mainsnak": {
                        "snaktype": "value",
                        "datatype": "wikibase-item",
                        "datavalue": {"value": {"id": "Q515"}, "type": "wikibase-entityid"}
                    },
                    "qualifiers": {}
                }]
            }"#,
        );
        let entity = Entity::from_json_line(&json).unwrap();
        assert_eq!(entity.id, "Q64");
        let stmt = &entity.claims["P31"][0];
        assert_eq!(
            stmt.mainsnak.value(),
            Some(&SnakValue::WikibaseItem {
                entity_id: "Q515".to_string()
            })
        );
    }

    #[test]
    fn detects_scholar_article() {
        let json = entity_json(
            r#"{
                "P31": [{
                    "mainsnak": {
                        "snaktype": "value",
                        "datatype": "wikibase-item",
                        "datavalue": {"value": {"id": "Q13442814"}, "type": "wikibase-entityid"}
                    },
                    "qualifiers": {}
                }]
            }"#,
        );
        let entity = Entity::from_json_line(&json).unwrap();
        assert!(entity.is_scholar_article());
    }

    #[test]
    fn parses_time_and_quantity() {
        let json = entity_json(
            r#"{
                "P571": [{
                    "mainsnak": {
                        "snaktype": "value",
                        "datatype": "time",
                        "datavalue": {"value": {"time": "+1237-01-01T00:00:00Z"}, "type": "time"}
                    },
                    "qualifiers": {}
                }],
                "P1082": [{
                    "mainsnak": {
                        "snaktype": "value",
                        "datatype": "quantity",
                        "datavalue": {"value": {"amount": "+3769495", "unit": "1"}, "type": "quantity"}
                    },
                    "qualifiers": {}
                }]
            }"#,
        );
        let entity = Entity::from_json_line(&json).unwrap();
        assert_eq!(
            entity.claims["P571"][0].mainsnak.value(),
            Some(&SnakValue::Time {
                iso_like_time: Some("+1237-01-01T00:00:00Z".to_string())
            })
        );
        assert_eq!(
            entity.claims["P1082"][0].mainsnak.value(),
            Some(&SnakValue::Quantity {
                amount: "+3769495".to_string(),
                unit: Some("1".to_string())
            })
        );
    }

    #[test]
    fn unknown_datatype_is_other_not_error() {
        let json = entity_json(
            r#"{
                "P18": [{
                    "mainsnak": {
                        "snaktype": "value",
                        "datatype": "globe-coordinate",
                        "datavalue": {"value": {}, "type": "globecoordinate"}
                    },
                    "qualifiers": {}
                }]
            }"#,
        );
        let entity = Entity::from_json_line(&json).unwrap();
        assert_eq!(entity.claims["P18"][0].mainsnak.value(), Some(&SnakValue::Other));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(Entity::from_json_line("not json").is_err());
    }
}
