use std::{borrow::Borrow, collections::BTreeMap, hash::Hash};

use nutype::nutype;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::domain::{AttributeId, ItemTypeId};

/// An ItemType defines the fields of the value carried by a library item.
/// Example: "compound" with a required unique `name` and an optional `definition`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemType {
    pub id: ItemTypeId,
    pub info: ItemTypeInfo,
    pub options: ItemTypeOptions,
    pub fields: BTreeMap<AttributeId, ItemField>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypeInfo {
    pub title: ItemTypeTitle,
    pub description: Option<String>,
    /// Prefix of generated uids, e.g. "Compound" for "Compound_000001"
    pub uid_prefix: String,
}

#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct ItemTypeTitle(String);

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypeOptions {
    /// items of this type stay editable inside a non-editable library
    pub allow_edit_in_locked_library: bool,
}

/// A field of an item value.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemField {
    pub attribute_type: AttributeType,
    pub unique: bool,
    pub required: bool,
    pub constraints: Option<AttributeConstraints>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, serde::Deserialize)]
pub enum AttributeType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    /// text with `[parameter]` placeholders
    Template,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeConstraints {
    pub pattern: Option<Pattern>,
    pub minimal_length: Option<usize>,
    pub maximal_length: Option<usize>,
}

/// Compiled regex constraint, serialized as its source.
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// implementations

impl ItemType {
    /// Fields holding template text, whose parameters get locked once approved
    pub fn template_fields(&self) -> impl Iterator<Item = &AttributeId> {
        self.fields
            .iter()
            .filter(|(_, field)| field.attribute_type == AttributeType::Template)
            .map(|(id, _)| id)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &AttributeId> {
        self.fields
            .iter()
            .filter(|(_, field)| field.unique)
            .map(|(id, _)| id)
    }
}

impl PartialEq for ItemType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ItemType {}

impl PartialEq<ItemTypeId> for ItemType {
    fn eq(&self, other: &ItemTypeId) -> bool {
        self.id == *other
    }
}

impl Borrow<ItemTypeId> for ItemType {
    fn borrow(&self) -> &ItemTypeId {
        &self.id
    }
}

impl Hash for ItemType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Ordered `[parameter]` names of a template text.
pub fn extract_parameters(template: &str) -> Vec<&str> {
    let mut parameters = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        let after_open = &rest[open + 1..];
        match after_open.find(']') {
            Some(close) => {
                parameters.push(after_open[..close].trim());
                rest = &after_open[close + 1..];
            }
            None => break,
        }
    }
    parameters
}

/// Brackets are balanced, not nested, and every parameter has a name.
pub fn is_template_syntax_correct(template: &str) -> bool {
    let mut open: Option<usize> = None;
    for (idx, ch) in template.char_indices() {
        match ch {
            '[' if open.is_some() => return false,
            '[' => open = Some(idx),
            ']' => match open.take() {
                Some(start) if template[start + 1..idx].trim().is_empty() => return false,
                Some(_) => {}
                None => return false,
            },
            _ => {}
        }
    }
    open.is_none()
}
