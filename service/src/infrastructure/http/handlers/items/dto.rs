use chrono::{DateTime, Utc};
use cmdr_common::{LibraryItem, LibraryItemStatus, ObjectAction, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of the create route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub library: String,
    pub value: Map<String, Value>,
}

/// Body of the edit route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditItemRequest {
    pub value: Map<String, Value>,
    pub change_description: String,
}

/// Body of the new version route, the value defaults to the current one
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersionRequest {
    #[serde(default)]
    pub value: Option<Map<String, Value>>,
    #[serde(default)]
    pub change_description: Option<String>,
}

/// Optional body of approve, inactivate and reactivate routes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    #[serde(default)]
    pub change_description: Option<String>,
}

/// Query parameters of the list route
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub page: Option<u16>,
    #[serde(default)]
    pub page_size: Option<u16>,
}

/// Query parameters of the read route, at most one may be given
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadParams {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// RFC 3339 instant
    #[serde(default)]
    pub at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManyItemsResponse {
    data: Vec<ItemResponse>,
    meta: MetadataResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataResponse {
    /// matching items over all pages
    total: i64,
}

impl ManyItemsResponse {
    pub fn new(data: Vec<ItemResponse>, total: i64) -> Self {
        Self {
            data,
            meta: MetadataResponse { total },
        }
    }
}

/// One snapshot of a library item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    uid: String,
    item_type: String,
    library: String,
    status: LibraryItemStatus,
    version: Version,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    author_id: String,
    change_description: String,
    /// only on the current snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    possible_actions: Option<Vec<ObjectAction>>,
    value: Map<String, Value>,
}

impl PartialEq for ItemResponse {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && self.version == other.version
    }
}

impl From<&LibraryItem> for ItemResponse {
    fn from(item: &LibraryItem) -> Self {
        let metadata = item.metadata();
        Self {
            uid: item.uid().to_string(),
            item_type: item.item_type().id.to_string(),
            library: item.library().name.to_string(),
            status: metadata.status(),
            version: metadata.version(),
            start_date: metadata.start_date(),
            end_date: metadata.end_date(),
            author_id: metadata.author_id().to_string(),
            change_description: metadata.change_description().to_string(),
            possible_actions: metadata
                .is_current()
                .then(|| item.possible_actions().into_iter().collect()),
            value: item.value().to_json(),
        }
    }
}
