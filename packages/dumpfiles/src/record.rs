//! Records parsed from dumps: JSON entity documents and XML page revisions.
//!
//! Records are kept close to their serialized form. Consumers that need a
//! richer model build it from the raw JSON value or the revision text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One parsed unit of dump content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Entity(EntityDocument),
    Revision(Revision),
}

impl Record {
    /// Project (wiki database name) the record belongs to.
    #[must_use]
    pub fn site(&self) -> &str {
        match self {
            Self::Entity(entity) => &entity.site,
            Self::Revision(revision) => &revision.site,
        }
    }

    /// Content model, e.g. `wikibase-item` or `wikitext`.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Entity(entity) => Some(entity.model()),
            Self::Revision(revision) => revision.model.as_deref(),
        }
    }

    /// Whether the record is the current state of its page or entity.
    ///
    /// Entity documents always are; revisions carry the flag set by the parser.
    #[must_use]
    pub fn is_current(&self) -> bool {
        match self {
            Self::Entity(_) => true,
            Self::Revision(revision) => revision.is_current,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&EntityDocument> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Revision(_) => None,
        }
    }

    #[must_use]
    pub fn as_revision(&self) -> Option<&Revision> {
        match self {
            Self::Revision(revision) => Some(revision),
            Self::Entity(_) => None,
        }
    }
}

/// An entity document from a JSON dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDocument {
    pub site: String,

    /// Entity id, e.g. `Q42` or `P31`.
    pub id: String,

    /// Entity type as written in the dump, e.g. `item`.
    pub entity_type: String,

    /// The full JSON document.
    pub json: Value,
}

impl EntityDocument {
    /// Build an entity from its JSON document.
    ///
    /// Returns a description of the problem if the document has no string `id`.
    pub fn from_json(site: impl Into<String>, json: Value) -> Result<Self, String> {
        let id = json
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| "entity document has no \"id\"".to_string())?
            .to_string();
        let entity_type = json
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("item")
            .to_string();

        Ok(Self {
            site: site.into(),
            id,
            entity_type,
            json,
        })
    }

    /// Content model of the entity, e.g. `wikibase-item`.
    #[must_use]
    pub fn model(&self) -> &str {
        match self.entity_type.as_str() {
            "item" => "wikibase-item",
            "property" => "wikibase-property",
            "lexeme" => "wikibase-lexeme",
            "mediainfo" => "wikibase-mediainfo",
            _ => "wikibase-entity",
        }
    }

    /// Label in the given language, if present.
    #[must_use]
    pub fn label(&self, language: &str) -> Option<&str> {
        self.json
            .get("labels")?
            .get(language)?
            .get("value")?
            .as_str()
    }
}

/// One revision of a page from an XML dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub site: String,
    pub page_id: u64,
    pub namespace: i32,
    pub title: String,
    pub revision_id: u64,
    pub parent_revision_id: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub contributor: Option<String>,
    pub contributor_id: Option<u64>,
    pub comment: Option<String>,
    pub minor: bool,

    /// Whether this is the latest revision of its page.
    pub is_current: bool,
    pub model: Option<String>,
    pub format: Option<String>,
    pub text: Option<String>,
}
