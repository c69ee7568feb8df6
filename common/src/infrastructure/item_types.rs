use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{Context, anyhow, bail};
use serde::Deserialize;

use crate::domain::{
    AttributeId, ItemTypeId, ItemTypesRegistry,
    item_types::{
        AttributeConstraints, AttributeType, ItemField, ItemType, ItemTypeInfo, ItemTypeOptions,
        ItemTypeTitle, Pattern,
    },
};

type ItemTypes = BTreeMap<ItemTypeId, Arc<ItemType>>;

/// Item types read from a directory of JSON files, one file per type.
/// `refresh` re-reads the directory and swaps the whole set at once.
#[derive(Clone)]
pub struct ItemTypesRegistryAdapter {
    internal: Arc<Internal>,
}

struct Internal {
    schema_config_path: PathBuf,
    item_types: RwLock<Arc<ItemTypes>>,
}

impl ItemTypesRegistry for ItemTypesRegistryAdapter {
    fn iterate(&self) -> Vec<Arc<ItemType>> {
        self.snapshot().values().cloned().collect()
    }

    fn get(&self, id: &ItemTypeId) -> Option<Arc<ItemType>> {
        self.snapshot().get(id).cloned()
    }

    /// Re-read the configuration directory. On failure the current set stays in place.
    fn refresh(&self) -> Result<usize, anyhow::Error> {
        let item_types = match load_dir(&self.internal.schema_config_path) {
            Ok(item_types) => item_types,
            Err(err) => {
                tracing::warn!("Item types refresh failed, keeping current set: {:#}", err);
                return Err(err);
            }
        };

        let count = item_types.len();
        *self
            .internal
            .item_types
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(item_types);

        tracing::info!("Refreshed {} item types", count);
        Ok(count)
    }
}

impl fmt::Debug for ItemTypesRegistryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTypesRegistryAdapter")
            .field("schema_config_path", &self.internal.schema_config_path)
            .field("item_types", &self.snapshot().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ItemTypesRegistryAdapter {
    pub fn load(schema_config_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let schema_config_path = schema_config_path.as_ref().to_path_buf();
        let item_types = load_dir(&schema_config_path)?;

        tracing::info!(
            "Loaded {} item types from {}",
            item_types.len(),
            schema_config_path.to_string_lossy()
        );

        let internal = Arc::new(Internal {
            schema_config_path,
            item_types: RwLock::new(Arc::new(item_types)),
        });
        Ok(Self { internal })
    }

    fn snapshot(&self) -> Arc<ItemTypes> {
        self.internal
            .item_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn load_dir(dir_path: &Path) -> Result<ItemTypes, anyhow::Error> {
    use std::fs;

    tracing::debug!("Loading item types from {}", dir_path.to_string_lossy());

    let entries = fs::read_dir(dir_path).with_context(|| {
        format!(
            "failed to read item types config directory: {}",
            dir_path.to_string_lossy()
        )
    })?;

    let mut item_types = ItemTypes::new();
    for entry_res in entries {
        let entry = entry_res.map_err(|e| anyhow!("failed to read a directory entry: {}", e))?;
        let path = entry.path();
        if path.is_file() && is_json(&path) {
            let item_type = load_item_type(&path)?;
            item_types.insert(item_type.id.clone(), Arc::new(item_type));
        }
    }

    Ok(item_types)
}

fn load_item_type(path: &Path) -> Result<ItemType, anyhow::Error> {
    use std::fs;

    let path_str = path.to_string_lossy().into_owned();

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("item type config file '{}' has no name", path_str))?;
    let id = ItemTypeId::try_new(id)
        .with_context(|| format!("invalid item type id in file name '{}'", path_str))?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read item type config file '{}'", path_str))?;

    let record = serde_json::from_str::<ItemTypeRecord>(&content)
        .with_context(|| format!("failed to parse JSON item type config '{}'", path_str))?;

    record
        .into_item_type(id)
        .with_context(|| format!("invalid item type config '{}'", path_str))
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
}

// internal structs for Deserializing

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemTypeRecord {
    info: ItemTypeInfoRecord,
    #[serde(default)]
    options: ItemTypeOptionsRecord,
    fields: BTreeMap<String, FieldRecord>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemTypeInfoRecord {
    title: String,
    description: Option<String>,
    uid_prefix: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemTypeOptionsRecord {
    #[serde(default)]
    allow_edit_in_locked_library: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRecord {
    #[serde(alias = "type")]
    attribute_type: AttributeType,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    required: bool,
    constraints: Option<ConstraintsRecord>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintsRecord {
    pattern: Option<String>,
    minimal_length: Option<usize>,
    maximal_length: Option<usize>,
}

// conversion into item type model

impl ItemTypeRecord {
    fn into_item_type(self, id: ItemTypeId) -> Result<ItemType, anyhow::Error> {
        let info = ItemTypeInfo::try_from(self.info)?;
        let options = ItemTypeOptions {
            allow_edit_in_locked_library: self.options.allow_edit_in_locked_library,
        };

        let mut fields = BTreeMap::new();
        for (name, record) in self.fields.into_iter() {
            let field_id = AttributeId::try_new(name.as_str())
                .with_context(|| format!("invalid field name '{}'", name))?;
            let field = ItemField::try_from(record)
                .with_context(|| format!("invalid field '{}'", name))?;
            fields.insert(field_id, field);
        }

        if fields.is_empty() {
            bail!("item type '{}' defines no fields", id);
        }

        Ok(ItemType {
            id,
            info,
            options,
            fields,
        })
    }
}

impl TryFrom<ItemTypeInfoRecord> for ItemTypeInfo {
    type Error = anyhow::Error;

    fn try_from(value: ItemTypeInfoRecord) -> Result<Self, Self::Error> {
        let title = ItemTypeTitle::try_new(value.title)?;
        let uid_prefix = value.uid_prefix.trim();
        if uid_prefix.is_empty() || !uid_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            bail!("uid prefix '{}' must be a non-empty alphanumeric word", uid_prefix);
        }

        Ok(Self {
            title,
            description: value.description,
            uid_prefix: uid_prefix.to_string(),
        })
    }
}

impl TryFrom<FieldRecord> for ItemField {
    type Error = anyhow::Error;

    fn try_from(value: FieldRecord) -> Result<Self, Self::Error> {
        let is_text = matches!(
            value.attribute_type,
            AttributeType::Text | AttributeType::Template
        );
        if value.constraints.is_some() && !is_text {
            bail!("constraints are supported on text fields only");
        }

        let constraints = value
            .constraints
            .map(AttributeConstraints::try_from)
            .transpose()?;

        Ok(Self {
            attribute_type: value.attribute_type,
            unique: value.unique,
            required: value.required,
            constraints,
        })
    }
}

impl TryFrom<ConstraintsRecord> for AttributeConstraints {
    type Error = anyhow::Error;

    fn try_from(value: ConstraintsRecord) -> Result<Self, Self::Error> {
        let pattern = value
            .pattern
            .map(|source| {
                Pattern::new(&source).with_context(|| format!("invalid pattern '{}'", source))
            })
            .transpose()?;

        if let (Some(min), Some(max)) = (value.minimal_length, value.maximal_length) {
            if min > max {
                bail!("minimal length {} exceeds maximal length {}", min, max);
            }
        }

        Ok(Self {
            pattern,
            minimal_length: value.minimal_length,
            maximal_length: value.maximal_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const COMPOUND: &str = r#"{
        "info": { "title": "Compound", "description": "Active substance", "uidPrefix": "Compound" },
        "fields": {
            "name": { "type": "Text", "required": true, "unique": true,
                      "constraints": { "minimalLength": 2, "maximalLength": 200 } },
            "is_sponsor": { "type": "Boolean" }
        }
    }"#;

    const OBJECTIVE: &str = r#"{
        "info": { "title": "Objective template", "uidPrefix": "ObjectiveTemplate" },
        "options": { "allowEditInLockedLibrary": true },
        "fields": {
            "name": { "type": "Template", "required": true, "unique": true }
        }
    }"#;

    fn id(value: &str) -> ItemTypeId {
        ItemTypeId::try_new(value).unwrap()
    }

    #[test]
    fn loads_json_files_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("compound.json"), COMPOUND).unwrap();
        fs::write(dir.path().join("objective_template.json"), OBJECTIVE).unwrap();
        fs::write(dir.path().join("README.md"), "not a config").unwrap();

        let registry = ItemTypesRegistryAdapter::load(dir.path()).unwrap();

        let ids: Vec<String> = registry.iterate().iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["compound", "objective_template"]);

        let compound = registry.get(&id("compound")).unwrap();
        assert_eq!(compound.info.uid_prefix, "Compound");
        assert!(!compound.options.allow_edit_in_locked_library);
        let name = &compound.fields[&AttributeId::try_new("name").unwrap()];
        assert!(name.required && name.unique);
        assert_eq!(name.constraints.as_ref().unwrap().maximal_length, Some(200));

        let objective = registry.get(&id("objective_template")).unwrap();
        assert!(objective.options.allow_edit_in_locked_library);
        assert_eq!(objective.template_fields().count(), 1);
    }

    #[test]
    fn fails_on_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = ItemTypesRegistryAdapter::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
    }

    #[test]
    fn reads_escaped_strings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("unit.json"),
            r#"{ "info": { "title": "Unit \"of measure\" \u00e9", "uidPrefix": "Unit" },
                 "fields": { "na\u006de": { "type": "Text", "required": true } } }"#,
        )
        .unwrap();

        let registry = ItemTypesRegistryAdapter::load(dir.path()).unwrap();

        let unit = registry.get(&id("unit")).unwrap();
        assert_eq!(unit.info.title.as_ref(), "Unit \"of measure\" \u{e9}");
        assert!(unit.fields.contains_key(&AttributeId::try_new("name").unwrap()));
    }

    #[test]
    fn rejects_constraints_on_non_text_field() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dose.json"),
            r#"{ "info": { "title": "Dose", "uidPrefix": "Dose" },
                 "fields": { "amount": { "type": "Integer", "constraints": { "maximalLength": 3 } } } }"#,
        )
        .unwrap();

        assert!(ItemTypesRegistryAdapter::load(dir.path()).is_err());
    }

    #[test]
    fn refresh_swaps_set_and_keeps_it_on_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("compound.json"), COMPOUND).unwrap();
        let registry = ItemTypesRegistryAdapter::load(dir.path()).unwrap();
        assert_eq!(registry.iterate().len(), 1);

        fs::write(dir.path().join("objective_template.json"), OBJECTIVE).unwrap();
        assert_eq!(registry.refresh().unwrap(), 2);
        assert!(registry.get(&id("objective_template")).is_some());

        fs::write(dir.path().join("activity.json"), "[]").unwrap();
        assert!(registry.refresh().is_err());
        assert_eq!(registry.iterate().len(), 2);
        assert!(registry.get(&id("activity")).is_none());
    }

    #[test]
    fn shipped_item_types_are_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/item_types");
        let registry = ItemTypesRegistryAdapter::load(path).unwrap();

        let ct_term = registry.get(&id("ct_term")).unwrap();
        assert!(ct_term.options.allow_edit_in_locked_library);
        assert_eq!(ct_term.info.uid_prefix, "CTTerm");
        assert_eq!(registry.iterate().len(), 4);
    }
}
