use serde::{Deserialize, Serialize};

use crate::domain::LibraryName;

/// Library a versioned item belongs to, e.g. "Sponsor" or "CDISC".
/// Items of a non-editable library are read-only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub name: LibraryName,
    pub is_editable: bool,
}

impl Library {
    pub fn new(name: LibraryName, is_editable: bool) -> Self {
        Self { name, is_editable }
    }
}
