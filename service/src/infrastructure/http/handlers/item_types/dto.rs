use cmdr_common::{
    AttributeConstraints, AttributeId, AttributeType, ItemField, ItemType, ItemTypeOptions,
};
use serde::Serialize;

/// Response for the refresh route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResponse {
    pub loaded: usize,
}

/// Response for list item types route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypeResponse {
    id: String,
    title: String,
    description: Option<String>,
    uid_prefix: String,
}

impl PartialEq for ItemTypeResponse {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl From<&ItemType> for ItemTypeResponse {
    fn from(value: &ItemType) -> Self {
        Self {
            id: value.id.to_string(),
            title: value.info.title.to_string(),
            description: value.info.description.clone(),
            uid_prefix: value.info.uid_prefix.clone(),
        }
    }
}

/// Response for one item type route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedItemTypeResponse {
    #[serde(flatten)]
    summary: ItemTypeResponse,
    options: ItemTypeOptions,
    fields: Vec<FieldResponse>,
}

/// Field of item type response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    id: String,
    #[serde(rename = "type")]
    attribute_type: AttributeType,
    unique: bool,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<AttributeConstraints>,
}

impl From<&ItemType> for DetailedItemTypeResponse {
    fn from(value: &ItemType) -> Self {
        Self {
            summary: value.into(),
            options: value.options.clone(),
            fields: value.fields.iter().map(FieldResponse::from).collect(),
        }
    }
}

impl From<(&AttributeId, &ItemField)> for FieldResponse {
    fn from((id, field): (&AttributeId, &ItemField)) -> Self {
        Self {
            id: id.to_string(),
            attribute_type: field.attribute_type,
            unique: field.unique,
            required: field.required,
            constraints: field.constraints.clone(),
        }
    }
}
