use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{
    AttributeId, AuthorId, Clock, ItemTypeId, ItemTypesRegistry, Library, LibraryName,
    item_types::{AttributeType, ItemField, ItemType, ItemTypeInfo, ItemTypeOptions, ItemTypeTitle},
};

/// Simple registry storing a few item types.
///
/// Public so that other crates can reuse it for their own tests.
#[derive(Debug)]
pub struct SimpleRegistry {
    pub types: Vec<Arc<ItemType>>,
}

impl SimpleRegistry {
    pub fn new(types: Vec<ItemType>) -> Self {
        Self {
            types: types.into_iter().map(Arc::new).collect(),
        }
    }
}

impl ItemTypesRegistry for SimpleRegistry {
    fn iterate(&self) -> Vec<Arc<ItemType>> {
        let mut types = self.types.clone();
        types.sort_by(|a, b| a.id.cmp(&b.id));
        types
    }

    fn get(&self, id: &ItemTypeId) -> Option<Arc<ItemType>> {
        self.types.iter().find(|t| &t.id == id).cloned()
    }

    fn refresh(&self) -> Result<usize, anyhow::Error> {
        Ok(self.types.len())
    }
}

/// Helper for building an `ItemType` from `(field, type, required, unique)` tuples.
pub fn make_type(id: &str, fields: Vec<(&str, AttributeType, bool, bool)>) -> ItemType {
    let fields = fields
        .into_iter()
        .map(|(name, attribute_type, required, unique)| {
            let field = ItemField {
                attribute_type,
                unique,
                required,
                constraints: None,
            };
            (attribute(name), field)
        })
        .collect::<BTreeMap<_, _>>();

    let mut uid_prefix = id.replace(['-', '_'], "");
    if let Some(first) = uid_prefix.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    ItemType {
        id: ItemTypeId::try_new(id).unwrap(),
        info: ItemTypeInfo {
            title: ItemTypeTitle::try_new(id).unwrap(),
            description: None,
            uid_prefix,
        },
        options: ItemTypeOptions::default(),
        fields,
    }
}

/// Convenience for the usual `name` + `definition` item type.
pub fn make_named_type(id: &str) -> ItemType {
    make_type(
        id,
        vec![
            ("name", AttributeType::Text, true, true),
            ("definition", AttributeType::Template, false, false),
        ],
    )
}

pub fn attribute(id: &str) -> AttributeId {
    AttributeId::try_new(id).unwrap()
}

pub fn author(id: &str) -> AuthorId {
    AuthorId::try_new(id).unwrap()
}

pub fn library(name: &str, is_editable: bool) -> Library {
    Library::new(LibraryName::try_new(name).unwrap(), is_editable)
}

pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
}

/// Clock advancing one second on every reading, the first reading is `timestamp(1)`.
#[derive(Debug, Default)]
pub struct StepClock {
    ticks: Mutex<i64>,
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut ticks = self.ticks.lock().unwrap();
        *ticks += 1;
        timestamp(*ticks)
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
