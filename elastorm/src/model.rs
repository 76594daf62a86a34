//! Model metadata: the host ORM's description of a table
//!
//! A model file in TOML looks like:
//!
//! ```toml
//! db_table = "person"
//! pk_column = "id"
//!
//! [[fields]]
//! name = "id"
//! kind = "AutoField"
//!
//! [[fields]]
//! name = "name"
//! kind = "CharField"
//!
//! [[fields]]
//! name = "tags"
//! kind = "ListField:CharField"
//!
//! [index_options]
//! ignore = ["secret"]
//! ```

use crate::coerce::FieldType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const LIST_PREFIX: &str = "ListField:";

/// Field classes known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    AutoField,
    CharField,
    TextField,
    EmailField,
    UrlField,
    SlugField,
    TagField,
    CommaSeparatedIntegerField,
    IpAddressField,
    FileField,
    FilePathField,
    ImageField,
    XmlField,
    IntegerField,
    SmallIntegerField,
    PositiveIntegerField,
    PositiveSmallIntegerField,
    BigIntegerField,
    PositionField,
    FloatField,
    DecimalField,
    BooleanField,
    NullBooleanField,
    DateField,
    DateTimeField,
    /// Auto-stamped datetime fields from third-party apps
    /// (`CreationDateTimeField`, `ModificationDateTimeField`, ...)
    StampedDateTimeField(String),
    TimeField,
    /// Stores the referenced row's primary key
    ForeignKey,
    OneToOneField,
    ListField(Box<FieldKind>),
    Other(String),
}

impl FieldKind {
    pub fn parse(name: &str) -> Self {
        if let Some(sub) = name.strip_prefix(LIST_PREFIX) {
            return Self::ListField(Box::new(Self::parse(sub)));
        }
        match name {
            "AutoField" => Self::AutoField,
            "CharField" => Self::CharField,
            "TextField" => Self::TextField,
            "EmailField" => Self::EmailField,
            "URLField" => Self::UrlField,
            "SlugField" => Self::SlugField,
            "TagField" => Self::TagField,
            "CommaSeparatedIntegerField" => Self::CommaSeparatedIntegerField,
            "IPAddressField" => Self::IpAddressField,
            "FileField" => Self::FileField,
            "FilePathField" => Self::FilePathField,
            "ImageField" => Self::ImageField,
            "XMLField" => Self::XmlField,
            "IntegerField" => Self::IntegerField,
            "SmallIntegerField" => Self::SmallIntegerField,
            "PositiveIntegerField" => Self::PositiveIntegerField,
            "PositiveSmallIntegerField" => Self::PositiveSmallIntegerField,
            "BigIntegerField" => Self::BigIntegerField,
            "PositionField" => Self::PositionField,
            "FloatField" => Self::FloatField,
            "DecimalField" => Self::DecimalField,
            "BooleanField" => Self::BooleanField,
            "NullBooleanField" => Self::NullBooleanField,
            "DateField" => Self::DateField,
            "DateTimeField" => Self::DateTimeField,
            "CreationDateTimeField"
            | "ModificationDateTimeField"
            | "AddedDateTimeField"
            | "ModifiedDateTimeField" => Self::StampedDateTimeField(name.to_string()),
            "TimeField" => Self::TimeField,
            "ForeignKey" => Self::ForeignKey,
            "OneToOneField" => Self::OneToOneField,
            other => Self::Other(other.to_string()),
        }
    }

    /// Logical field type used for coercion.
    pub fn db_type(&self) -> FieldType {
        match self {
            Self::AutoField
            | Self::CharField
            | Self::TextField
            | Self::EmailField
            | Self::UrlField
            | Self::SlugField
            | Self::TagField
            | Self::CommaSeparatedIntegerField
            | Self::IpAddressField
            | Self::FileField
            | Self::FilePathField
            | Self::ImageField
            | Self::XmlField
            | Self::ForeignKey => FieldType::Unicode,
            Self::IntegerField
            | Self::SmallIntegerField
            | Self::PositiveIntegerField
            | Self::PositiveSmallIntegerField
            | Self::BigIntegerField
            | Self::PositionField
            | Self::OneToOneField => FieldType::Int,
            Self::FloatField | Self::DecimalField => FieldType::Float,
            Self::BooleanField | Self::NullBooleanField => FieldType::Bool,
            Self::DateField => FieldType::Date,
            Self::DateTimeField | Self::StampedDateTimeField(_) => FieldType::DateTime,
            Self::TimeField => FieldType::Time,
            Self::ListField(sub) => FieldType::List(Box::new(sub.db_type())),
            Self::Other(name) => FieldType::Other(name.clone()),
        }
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AutoField => "AutoField",
            Self::CharField => "CharField",
            Self::TextField => "TextField",
            Self::EmailField => "EmailField",
            Self::UrlField => "URLField",
            Self::SlugField => "SlugField",
            Self::TagField => "TagField",
            Self::CommaSeparatedIntegerField => "CommaSeparatedIntegerField",
            Self::IpAddressField => "IPAddressField",
            Self::FileField => "FileField",
            Self::FilePathField => "FilePathField",
            Self::ImageField => "ImageField",
            Self::XmlField => "XMLField",
            Self::IntegerField => "IntegerField",
            Self::SmallIntegerField => "SmallIntegerField",
            Self::PositiveIntegerField => "PositiveIntegerField",
            Self::PositiveSmallIntegerField => "PositiveSmallIntegerField",
            Self::BigIntegerField => "BigIntegerField",
            Self::PositionField => "PositionField",
            Self::FloatField => "FloatField",
            Self::DecimalField => "DecimalField",
            Self::BooleanField => "BooleanField",
            Self::NullBooleanField => "NullBooleanField",
            Self::DateField => "DateField",
            Self::DateTimeField => "DateTimeField",
            Self::StampedDateTimeField(name) => name.as_str(),
            Self::TimeField => "TimeField",
            Self::ForeignKey => "ForeignKey",
            Self::OneToOneField => "OneToOneField",
            Self::ListField(sub) => return write!(f, "{LIST_PREFIX}{sub}"),
            Self::Other(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    /// Storage column; the field name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub unique: bool,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            column: None,
            kind,
            unique: false,
        }
    }

    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Per-model indexing overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Fields left out of the mapping
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Mapping overrides keyed by field name, e.g. `index = "not_analyzed"`
    #[serde(default)]
    pub fields: BTreeMap<String, Map<String, Value>>,
    /// Mapped fields with no model counterpart, keyed by name
    #[serde(default)]
    pub extra_fields: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Document type the model's rows are stored under
    pub db_table: String,
    #[serde(default = "default_pk_column")]
    pub pk_column: String,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
    #[serde(default)]
    pub index_options: IndexOptions,
}

fn default_pk_column() -> String {
    "id".to_string()
}

impl ModelMeta {
    /// A model with an `AutoField` primary key named `id`.
    pub fn new(db_table: impl Into<String>) -> Self {
        Self {
            db_table: db_table.into(),
            pk_column: default_pk_column(),
            fields: vec![FieldMeta::new("id", FieldKind::AutoField)],
            index_options: IndexOptions::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldMeta::new(name, kind));
        self
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.column() == column)
    }

    /// Logical type of `column`; unknown columns coerce as identity.
    pub fn field_type(&self, column: &str) -> FieldType {
        self.field_by_column(column)
            .map(|f| f.kind.db_type())
            .unwrap_or_else(|| FieldType::Other(String::new()))
    }
}
