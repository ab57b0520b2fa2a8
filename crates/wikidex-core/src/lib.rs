//! Wikidex Core - the Wikidata-style entity model plus the three
//! ingestion-time components that do not depend on embeddings or storage:
//! streaming dump reading, the label/description index, and textification.

pub mod dump;
pub mod error;
pub mod labels;
pub mod model;
pub mod textify;

pub use dump::DumpReader;
pub use error::{CoreError, Result};
pub use labels::{BuildStats, CachedLabelStore, LabelStore};
pub use model::{Entity, EntityType, Snak, SnakValue, Statement, INSTANCE_OF, SCHOLAR_ARTICLE_CLASS};
pub use textify::{format_date, LabelLookup, TextifyConfig, Textifier};
