use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use nutype::nutype;
use regex::Regex;

pub mod clock;
pub mod error;
pub mod item;
pub mod item_types;
pub mod library;
pub mod lifecycle;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use error::{ItemError, ValidationError};
pub use item::{EditOutcome, LibraryItem};
pub use item_types::{
    AttributeConstraints, AttributeType, ItemField, ItemType, ItemTypeInfo, ItemTypeOptions,
};
pub use library::Library;
pub use lifecycle::{
    InvalidTransitionError, LibraryItemStatus, MetadataError, MetadataRecord, ObjectAction,
    Version, VersionedItemMetadata,
};
pub use value::{FieldValue, ItemValue};

/// Configured item types, injected wherever item values are validated.
pub trait ItemTypesRegistry: Send + Sync + Debug + 'static {
    /// iterate all item types, ordered by id
    fn iterate(&self) -> Vec<Arc<ItemType>>;
    /// find item type by its id
    fn get(&self, id: &ItemTypeId) -> Option<Arc<ItemType>>;
    /// reload the configuration, returns the number of item types now known
    fn refresh(&self) -> Result<usize, anyhow::Error>;
}

// A regex for IDs/names that may contain only ASCII letters, digits, underscore, dash and slash.
// Example: "ct_term" or "activity-group" is valid; "ct term" is not.
pub const ELIGIBLE_SYMBOLS_REGEX: &str = r"^[A-Za-z0-9_/-]+$";

static ELIGIBLE_SYMBOLS_REGEX_COMPILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ELIGIBLE_SYMBOLS_REGEX).expect("ELIGIBLE_SYMBOLS_REGEX must be a valid regex")
});

pub fn is_eligible_id(id: &str) -> bool {
    !id.starts_with("cmdr_") && ELIGIBLE_SYMBOLS_REGEX_COMPILED.is_match(id)
}

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 40, predicate = is_eligible_id),
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
pub struct ItemTypeId(String);

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 40, predicate = is_eligible_id),
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
pub struct AttributeId(String);

#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
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
pub struct LibraryName(String);

#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
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
pub struct AuthorId(String);

static UID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("UID_REGEX must be a valid regex"));

#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64, regex = UID_REGEX),
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
pub struct ItemUid(String);

impl ItemUid {
    /// Uid in the `{prefix}_{sequence}` form, sequence zero padded to six digits.
    pub fn generate(prefix: &str, sequence: u64) -> Result<Self, ItemUidError> {
        Self::try_new(format!("{}_{:06}", prefix, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_id_is_normalized() {
        let id = ItemTypeId::try_new("  CT_Term ").unwrap();
        assert_eq!(id.as_ref(), "ct_term");
    }

    #[test]
    fn reserved_prefix_is_rejected() {
        assert!(ItemTypeId::try_new("cmdr_roots").is_err());
        assert!(AttributeId::try_new("has space").is_err());
    }

    #[test]
    fn uid_is_generated_with_padded_sequence() {
        let uid = ItemUid::generate("Compound", 42).unwrap();
        assert_eq!(uid.as_ref(), "Compound_000042");
    }
}
