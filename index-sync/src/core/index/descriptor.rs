//! Index descriptor model.
//!
//! An [`IndexDescriptor`] is a read-only snapshot of one secondary index, either read from a
//! `listIndexes` reply or authored by hand (configuration, interactive session). Both origins go
//! through [`IndexDescriptor::from_document`] so they normalize the same way.

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the index the server maintains on `_id`. It is never compared, planned or created.
pub const ID_INDEX_NAME: &str = "_id_";

/// Fields of a listing document that describe the descriptor envelope rather than index configuration.
/// They are never forwarded as creation options.
pub const ENVELOPE_FIELDS: [&str; 3] = ["v", "ns", "key"];

const FIELD_KEY: &str = "key";
const FIELD_NAME: &str = "name";
const FIELD_UNIQUE: &str = "unique";
const FIELD_SPARSE: &str = "sparse";
const FIELD_EXPIRE_AFTER_SECONDS: &str = "expireAfterSeconds";
const FIELD_WEIGHTS: &str = "weights";
const FIELD_PARTIAL_FILTER_EXPRESSION: &str = "partialFilterExpression";
const FIELD_BACKGROUND: &str = "background";

const INTERPRETED_FIELDS: [&str; 8] = [
    FIELD_KEY,
    FIELD_NAME,
    FIELD_UNIQUE,
    FIELD_SPARSE,
    FIELD_EXPIRE_AFTER_SECONDS,
    FIELD_WEIGHTS,
    FIELD_PARTIAL_FILTER_EXPRESSION,
    FIELD_BACKGROUND,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("index document has no `key` document")]
    MissingKey,

    #[error("index key pattern is empty")]
    EmptyKeyPattern,

    #[error("invalid direction for key field `{field}`: {value}")]
    InvalidDirection { field: String, value: String },

    #[error("option `{option}` must be {expected}, found {found}")]
    InvalidOption { option: &'static str, expected: &'static str, found: String },
}

/// Direction or kind of one key field.
///
/// Numeric width is not significant: `1`, `1i64` and `1.0` are all [`IndexDirection::Ascending`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDirection {
    Ascending,
    Descending,
    Text,
    /// Any other special index kind, e.g. `2dsphere` or `hashed`
    Other(String),
}

impl IndexDirection {
    pub fn from_bson(field: &str, value: &Bson) -> Result<Self, DescriptorError> {
        let numeric = match value {
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            Bson::Double(v) => Some(*v),
            Bson::String(kind) if kind == "text" => return Ok(Self::Text),
            Bson::String(kind) if !kind.is_empty() => return Ok(Self::Other(kind.clone())),
            _ => None,
        };

        match numeric {
            Some(n) if n > 0.0 => Ok(Self::Ascending),
            Some(n) if n < 0.0 => Ok(Self::Descending),
            _ => Err(DescriptorError::InvalidDirection { field: field.to_string(), value: value.to_string() }),
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Ascending => Bson::Int32(1),
            Self::Descending => Bson::Int32(-1),
            Self::Text => Bson::String("text".to_string()),
            Self::Other(kind) => Bson::String(kind.clone()),
        }
    }
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "1"),
            Self::Descending => write!(f, "-1"),
            Self::Text => write!(f, "text"),
            Self::Other(kind) => write!(f, "{}", kind),
        }
    }
}

impl FromStr for IndexDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "asc" => Ok(Self::Ascending),
            "-1" | "desc" => Ok(Self::Descending),
            "text" => Ok(Self::Text),
            kind if !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(Self::Other(kind.to_string()))
            }
            other => Err(format!("unknown index direction `{}`", other)),
        }
    }
}

/// Ordered, non-empty mapping of field path to direction.
///
/// Field order is significant: `{a: 1, b: 1}` and `{b: 1, a: 1}` are different patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern(Vec<(String, IndexDirection)>);

impl KeyPattern {
    pub fn new(fields: Vec<(String, IndexDirection)>) -> Result<Self, DescriptorError> {
        if fields.is_empty() {
            return Err(DescriptorError::EmptyKeyPattern);
        }
        Ok(Self(fields))
    }

    pub fn from_document(doc: &Document) -> Result<Self, DescriptorError> {
        let fields = doc
            .iter()
            .map(|(field, value)| IndexDirection::from_bson(field, value).map(|dir| (field.clone(), dir)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    pub fn to_document(&self) -> Document {
        self.0.iter().map(|(field, dir)| (field.clone(), dir.to_bson())).collect()
    }

    pub fn fields(&self) -> &[(String, IndexDirection)] {
        &self.0
    }

    /// Server-side text indexes list as `{_fts: "text", _ftsx: 1}`, which also counts.
    pub fn has_text(&self) -> bool {
        self.0.iter().any(|(_, dir)| *dir == IndexDirection::Text)
    }

    /// Name the server would generate for this pattern, e.g. `email_1_created_at_-1`.
    pub fn default_index_name(&self) -> String {
        self.0.iter().map(|(field, dir)| format!("{}_{}", field, dir)).collect::<Vec<_>>().join("_")
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.0.iter().map(|(field, dir)| format!("{}: {}", field, dir)).collect::<Vec<_>>();
        write!(f, "{{ {} }}", fields.join(", "))
    }
}

/// One secondary index on one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Document", into = "Document")]
pub struct IndexDescriptor {
    pub name: String,
    pub key: KeyPattern,
    pub unique: bool,
    pub sparse: bool,
    /// `Some(0)` is a legal TTL and is distinct from `None`.
    pub expire_after_seconds: Option<u64>,
    /// Only meaningful when the key pattern contains a text field.
    pub weights: Option<Document>,
    pub partial_filter_expression: Option<Document>,
    /// Build hint only. Not part of the index identity.
    pub background: bool,
    /// Options this crate does not interpret, in listing order. May contain envelope fields.
    pub passthrough: Document,
}

impl IndexDescriptor {
    pub fn new(key: KeyPattern) -> Self {
        Self {
            name: key.default_index_name(),
            key,
            unique: false,
            sparse: false,
            expire_after_seconds: None,
            weights: None,
            partial_filter_expression: None,
            background: false,
            passthrough: Document::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn with_expire_after_seconds(mut self, seconds: Option<u64>) -> Self {
        self.expire_after_seconds = seconds;
        self
    }

    pub fn with_weights(mut self, weights: Document) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_partial_filter_expression(mut self, filter: Document) -> Self {
        self.partial_filter_expression = Some(filter);
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_passthrough(mut self, option: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.passthrough.insert(option.into(), value.into());
        self
    }

    /// Whether this is the server-managed `_id_` index.
    pub fn is_id_index(&self) -> bool {
        self.name == ID_INDEX_NAME
    }

    /// Read a descriptor from the `listIndexes` / `createIndexes` document shape.
    pub fn from_document(doc: &Document) -> Result<Self, DescriptorError> {
        let key = match doc.get(FIELD_KEY) {
            Some(Bson::Document(key)) => KeyPattern::from_document(key)?,
            _ => return Err(DescriptorError::MissingKey),
        };

        let name = match doc.get(FIELD_NAME) {
            None | Some(Bson::Null) => key.default_index_name(),
            Some(Bson::String(name)) => name.clone(),
            Some(other) => return Err(invalid_option(FIELD_NAME, "a string", other)),
        };

        let passthrough = doc
            .iter()
            .filter(|(field, _)| !INTERPRETED_FIELDS.contains(&field.as_str()))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        Ok(Self {
            name,
            key,
            unique: read_flag(doc, FIELD_UNIQUE)?,
            sparse: read_flag(doc, FIELD_SPARSE)?,
            expire_after_seconds: read_ttl(doc)?,
            weights: read_document(doc, FIELD_WEIGHTS)?,
            partial_filter_expression: read_document(doc, FIELD_PARTIAL_FILTER_EXPRESSION)?,
            background: read_flag(doc, FIELD_BACKGROUND)?,
            passthrough,
        })
    }

    /// Options document forwarded to index creation. The key pattern is passed separately and
    /// the envelope fields (`v`, `ns`, `key`) are never included.
    pub fn creation_options(&self) -> Document {
        let mut options = Document::new();
        options.insert(FIELD_NAME, self.name.clone());
        if self.unique {
            options.insert(FIELD_UNIQUE, true);
        }
        if self.sparse {
            options.insert(FIELD_SPARSE, true);
        }
        if let Some(seconds) = self.expire_after_seconds {
            options.insert(FIELD_EXPIRE_AFTER_SECONDS, ttl_to_bson(seconds));
        }
        if let Some(weights) = &self.weights {
            options.insert(FIELD_WEIGHTS, weights.clone());
        }
        if let Some(filter) = &self.partial_filter_expression {
            options.insert(FIELD_PARTIAL_FILTER_EXPRESSION, filter.clone());
        }
        if self.background {
            options.insert(FIELD_BACKGROUND, true);
        }
        for (option, value) in self.passthrough.iter() {
            if ENVELOPE_FIELDS.contains(&option.as_str()) || options.contains_key(option) {
                continue;
            }
            options.insert(option.clone(), value.clone());
        }
        options
    }

    /// Key pattern plus creation options, the shape persisted in configuration.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(FIELD_KEY, self.key.to_document());
        for (option, value) in self.creation_options() {
            doc.insert(option, value);
        }
        doc
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.key)?;
        if self.unique {
            write!(f, " unique")?;
        }
        if self.sparse {
            write!(f, " sparse")?;
        }
        if let Some(seconds) = self.expire_after_seconds {
            write!(f, " ttl={}s", seconds)?;
        }
        if let Some(filter) = &self.partial_filter_expression {
            write!(f, " partial={}", filter)?;
        }
        Ok(())
    }
}

impl TryFrom<Document> for IndexDescriptor {
    type Error = DescriptorError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        Self::from_document(&doc)
    }
}

impl From<IndexDescriptor> for Document {
    fn from(descriptor: IndexDescriptor) -> Self {
        descriptor.to_document()
    }
}

fn invalid_option(option: &'static str, expected: &'static str, found: &Bson) -> DescriptorError {
    DescriptorError::InvalidOption { option, expected, found: found.to_string() }
}

fn read_flag(doc: &Document, option: &'static str) -> Result<bool, DescriptorError> {
    match doc.get(option) {
        None | Some(Bson::Null) => Ok(false),
        Some(Bson::Boolean(flag)) => Ok(*flag),
        // older servers and drivers persisted flags as numbers
        Some(Bson::Int32(v)) => Ok(*v != 0),
        Some(Bson::Int64(v)) => Ok(*v != 0),
        Some(Bson::Double(v)) => Ok(*v != 0.0),
        Some(other) => Err(invalid_option(option, "a boolean", other)),
    }
}

fn read_document(doc: &Document, option: &'static str) -> Result<Option<Document>, DescriptorError> {
    match doc.get(option) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(inner)) => Ok(Some(inner.clone())),
        Some(other) => Err(invalid_option(option, "a document", other)),
    }
}

fn read_ttl(doc: &Document) -> Result<Option<u64>, DescriptorError> {
    let Some(value) = doc.get(FIELD_EXPIRE_AFTER_SECONDS) else { return Ok(None) };
    let seconds = match value {
        Bson::Null => return Ok(None),
        Bson::Int32(v) => u64::try_from(*v).ok(),
        Bson::Int64(v) => u64::try_from(*v).ok(),
        Bson::Double(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64 => Some(*v as u64),
        _ => None,
    };
    seconds.map(Some).ok_or_else(|| invalid_option(FIELD_EXPIRE_AFTER_SECONDS, "a non-negative integer", value))
}

fn ttl_to_bson(seconds: u64) -> Bson {
    match i32::try_from(seconds) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(seconds).unwrap_or(i64::MAX)),
    }
}
