use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::domain::{
    AttributeId,
    error::ValidationError,
    item_types::{AttributeConstraints, AttributeType, ItemField, ItemType, is_template_syntax_correct},
};

/// The value types an item field can hold.
/// Stored tagged, so a stored value reads back with its exact type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// YYYY-MM-DD
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Null,
}

/// Field values of one library item version, keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemValue {
    fields: BTreeMap<AttributeId, FieldValue>,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Plain JSON, as exposed through the API
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(value) => Value::String(value.clone()),
            FieldValue::Integer(value) => Value::from(*value),
            FieldValue::Decimal(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            FieldValue::Boolean(value) => Value::Bool(*value),
            FieldValue::Date(value) => Value::String(value.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(value) => Value::String(value.to_rfc3339()),
            FieldValue::Null => Value::Null,
        }
    }

    fn from_json(id: &AttributeId, field: &ItemField, json: &Value) -> Result<Self, ValidationError> {
        if json.is_null() {
            return Ok(FieldValue::Null);
        }

        let invalid_type = || ValidationError::InvalidFieldType {
            field: id.clone(),
            expected: format!("{:?}", field.attribute_type),
        };

        let value = match field.attribute_type {
            AttributeType::Text | AttributeType::Template => {
                FieldValue::Text(json.as_str().ok_or_else(invalid_type)?.to_string())
            }
            AttributeType::Integer => FieldValue::Integer(json.as_i64().ok_or_else(invalid_type)?),
            AttributeType::Decimal => FieldValue::Decimal(json.as_f64().ok_or_else(invalid_type)?),
            AttributeType::Boolean => FieldValue::Boolean(json.as_bool().ok_or_else(invalid_type)?),
            AttributeType::Date => {
                let raw = json.as_str().ok_or_else(invalid_type)?;
                FieldValue::Date(
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid_type())?,
                )
            }
            AttributeType::DateTime => {
                let raw = json.as_str().ok_or_else(invalid_type)?;
                FieldValue::DateTime(
                    DateTime::parse_from_rfc3339(raw)
                        .map_err(|_| invalid_type())?
                        .with_timezone(&Utc),
                )
            }
        };

        if let FieldValue::Text(text) = &value {
            if field.attribute_type == AttributeType::Template && !is_template_syntax_correct(text) {
                return Err(ValidationError::ConstraintViolated {
                    field: id.clone(),
                    reason: "template syntax is incorrect".to_string(),
                });
            }
            if let Some(constraints) = &field.constraints {
                check_text_constraints(id, constraints, text)?;
            }
        }

        Ok(value)
    }
}

fn check_text_constraints(
    id: &AttributeId,
    constraints: &AttributeConstraints,
    text: &str,
) -> Result<(), ValidationError> {
    let length = text.chars().count();
    let violated = |reason: String| ValidationError::ConstraintViolated {
        field: id.clone(),
        reason,
    };

    if let Some(min) = constraints.minimal_length {
        if length < min {
            return Err(violated(format!("shorter than {} characters", min)));
        }
    }
    if let Some(max) = constraints.maximal_length {
        if length > max {
            return Err(violated(format!("longer than {} characters", max)));
        }
    }
    if let Some(pattern) = &constraints.pattern {
        if !pattern.is_match(text) {
            return Err(violated(format!("does not match pattern {}", pattern.as_str())));
        }
    }
    Ok(())
}

impl ItemValue {
    /// Validate a plain JSON object against the fields of `item_type`.
    pub fn from_json(item_type: &ItemType, json: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut fields = BTreeMap::new();

        for key in json.keys() {
            let known = AttributeId::try_new(key.as_str())
                .ok()
                .filter(|id| item_type.fields.contains_key(id));
            if known.is_none() {
                return Err(ValidationError::UnknownField(key.clone()));
            }
        }

        for (id, field) in item_type.fields.iter() {
            let value = match json.get(id.as_ref()) {
                Some(json) => FieldValue::from_json(id, field, json)?,
                None => FieldValue::Null,
            };
            if field.required && value.is_null() {
                return Err(ValidationError::MissingRequiredField(id.clone()));
            }
            if !value.is_null() {
                fields.insert(id.clone(), value);
            }
        }

        Ok(Self { fields })
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(id, value)| (id.to_string(), value.to_json()))
            .collect()
    }

    pub fn get(&self, id: &AttributeId) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub fn text(&self, id: &AttributeId) -> Option<&str> {
        self.get(id).and_then(FieldValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeId, &FieldValue)> {
        self.fields.iter()
    }

    pub fn with(mut self, id: AttributeId, value: FieldValue) -> Self {
        self.fields.insert(id, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::{attribute, make_type};

    fn compound() -> ItemType {
        make_type(
            "compound",
            vec![
                ("name", AttributeType::Text, true, true),
                ("is_sponsor", AttributeType::Boolean, false, false),
                ("approved_on", AttributeType::Date, false, false),
                ("definition", AttributeType::Template, false, false),
            ],
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn parses_typed_fields() {
        let value = ItemValue::from_json(
            &compound(),
            &object(json!({
                "name": "Aspirin",
                "is_sponsor": true,
                "approved_on": "2024-03-01",
                "definition": "Give [Dose] daily"
            })),
        )
        .unwrap();

        assert_eq!(value.text(&attribute("name")), Some("Aspirin"));
        assert_eq!(
            value.get(&attribute("approved_on")),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(value.to_json()["is_sponsor"], json!(true));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = ItemValue::from_json(&compound(), &object(json!({"is_sponsor": false}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingRequiredField(attribute("name")));
    }

    #[test]
    fn rejects_unknown_field() {
        let err = ItemValue::from_json(&compound(), &object(json!({"name": "x", "colour": "red"})))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("colour".to_string()));
    }

    #[test]
    fn rejects_wrong_type_and_bad_template() {
        let err = ItemValue::from_json(&compound(), &object(json!({"name": 12}))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFieldType { .. }));

        let err = ItemValue::from_json(
            &compound(),
            &object(json!({"name": "x", "definition": "broken [template"})),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintViolated { .. }));
    }

    #[test]
    fn null_optional_field_is_dropped() {
        let value =
            ItemValue::from_json(&compound(), &object(json!({"name": "x", "is_sponsor": null}))).unwrap();
        assert_eq!(value.get(&attribute("is_sponsor")), None);
    }

    #[test]
    fn stored_form_keeps_types() {
        let value = ItemValue::default()
            .with(attribute("name"), FieldValue::Text("2024-01-01".to_string()))
            .with(attribute("approved_on"), FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let stored = serde_json::to_value(&value).unwrap();
        let restored: ItemValue = serde_json::from_value(stored).unwrap();
        assert_eq!(restored, value);
    }
}
