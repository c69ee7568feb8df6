//! Version and status metadata of a library item.
//!
//! A [`VersionedItemMetadata`] is an immutable snapshot: every transition
//! returns a new snapshot and leaves the current one untouched. The state
//! machine is
//!
//! ```text
//! DRAFT --approve--> FINAL --inactivate--> RETIRED
//!   ^  \                |  ^                  |
//!   |   edit            |   \---reactivate----/
//!   \----new_version----/
//! ```
//!
//! Approving bumps the major version and resets the minor one, a new draft
//! from FINAL starts at minor 1, every draft edit bumps the minor version.
//! Inactivation and reactivation keep the version number.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::AuthorId;

pub const INITIAL_VERSION_LABEL: &str = "Initial version";
pub const NEW_VERSION_LABEL: &str = "New draft created";
pub const FINAL_VERSION_LABEL: &str = "Approved version";
pub const RETIRED_VERSION_LABEL: &str = "Inactivated version";
pub const REACTIVATED_VERSION_LABEL: &str = "Reactivated version";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LibraryItemStatus {
    Draft,
    Final,
    Retired,
}

impl LibraryItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Final => "Final",
            Self::Retired => "Retired",
        }
    }
}

impl fmt::Display for LibraryItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryItemStatus {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Final" => Ok(Self::Final),
            "Retired" => Ok(Self::Retired),
            _ => Err(MetadataError::UnknownStatus(s.to_string())),
        }
    }
}

/// Actions a client may perform on a library item, depending on its state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectAction {
    Approve,
    Edit,
    Delete,
    NewVersion,
    Inactivate,
    Reactivate,
}

impl ObjectAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::NewVersion => "new_version",
            Self::Inactivate => "inactivate",
            Self::Reactivate => "reactivate",
        }
    }
}

impl fmt::Display for ObjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `major.minor` version number, ordered numerically component by component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetadataError::InvalidVersion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for Version {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// Attempted transition is not legal from the current state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a library item in status {status} (version {version})")]
pub struct InvalidTransitionError {
    pub action: ObjectAction,
    pub status: LibraryItemStatus,
    pub version: Version,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("unknown library item status '{0}'")]
    UnknownStatus(String),
    #[error("invalid version '{0}', expected 'major.minor'")]
    InvalidVersion(String),
    #[error("inconsistent version metadata: {0}")]
    Inconsistent(String),
}

/// One snapshot of the version history of a library item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MetadataRecord", into = "MetadataRecord")]
pub struct VersionedItemMetadata {
    status: LibraryItemStatus,
    major_version: u32,
    minor_version: u32,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    author_id: AuthorId,
    change_description: String,
}

/// Storage representation of [`VersionedItemMetadata`], one row per snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub status: LibraryItemStatus,
    pub major_version: u32,
    pub minor_version: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub author_id: AuthorId,
    pub change_description: String,
}

impl VersionedItemMetadata {
    /// Metadata of a freshly created item: DRAFT 0.1.
    pub fn initial(author_id: AuthorId, now: DateTime<Utc>) -> Self {
        Self {
            status: LibraryItemStatus::Draft,
            major_version: 0,
            minor_version: 1,
            start_date: now,
            end_date: None,
            author_id,
            change_description: INITIAL_VERSION_LABEL.to_string(),
        }
    }

    /// Restore a snapshot read back from storage, rejecting impossible states.
    pub fn from_repository_values(record: MetadataRecord) -> Result<Self, MetadataError> {
        if record.major_version == 0 && record.minor_version == 0 {
            return Err(MetadataError::Inconsistent(
                "version 0.0 never exists".to_string(),
            ));
        }
        if record.status != LibraryItemStatus::Draft && record.minor_version != 0 {
            return Err(MetadataError::Inconsistent(format!(
                "{} version {}.{} must have minor version 0",
                record.status, record.major_version, record.minor_version
            )));
        }
        if record.status != LibraryItemStatus::Draft && record.major_version == 0 {
            return Err(MetadataError::Inconsistent(format!(
                "{} version must have been approved at least once",
                record.status
            )));
        }
        if let Some(end_date) = record.end_date {
            if end_date < record.start_date {
                return Err(MetadataError::Inconsistent(
                    "end date precedes start date".to_string(),
                ));
            }
        }

        Ok(Self {
            status: record.status,
            major_version: record.major_version,
            minor_version: record.minor_version,
            start_date: record.start_date,
            end_date: record.end_date,
            author_id: record.author_id,
            change_description: record.change_description,
        })
    }

    pub fn status(&self) -> LibraryItemStatus {
        self.status
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    pub fn version(&self) -> Version {
        Version::new(self.major_version, self.minor_version)
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn author_id(&self) -> &AuthorId {
        &self.author_id
    }

    pub fn change_description(&self) -> &str {
        &self.change_description
    }

    /// Whether the item was approved at least once.
    pub fn was_approved(&self) -> bool {
        self.major_version > 0
    }

    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }

    /// Draft edit (minor + 1) or new draft from FINAL (minor = 1).
    pub fn new_draft_version(
        &self,
        author_id: AuthorId,
        change_description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransitionError> {
        let version = match self.status {
            LibraryItemStatus::Draft => Version::new(self.major_version, self.minor_version + 1),
            LibraryItemStatus::Final => Version::new(self.major_version, 1),
            LibraryItemStatus::Retired => return Err(self.rejected(ObjectAction::NewVersion)),
        };
        Ok(self.successor(
            LibraryItemStatus::Draft,
            version,
            author_id,
            change_description.into(),
            now,
        ))
    }

    /// Approve the draft: major + 1, minor = 0.
    pub fn new_final_version(
        &self,
        author_id: AuthorId,
        change_description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransitionError> {
        if self.status != LibraryItemStatus::Draft {
            return Err(self.rejected(ObjectAction::Approve));
        }
        let version = Version::new(self.major_version + 1, 0);
        Ok(self.successor(
            LibraryItemStatus::Final,
            version,
            author_id,
            change_description.into(),
            now,
        ))
    }

    /// Retire the final version, keeping its number.
    pub fn new_retired_version(
        &self,
        author_id: AuthorId,
        change_description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransitionError> {
        if self.status != LibraryItemStatus::Final {
            return Err(self.rejected(ObjectAction::Inactivate));
        }
        Ok(self.successor(
            LibraryItemStatus::Retired,
            self.version(),
            author_id,
            change_description.into(),
            now,
        ))
    }

    /// Bring a retired item back to FINAL at the same version.
    pub fn reactivate(
        &self,
        author_id: AuthorId,
        change_description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransitionError> {
        if self.status != LibraryItemStatus::Retired {
            return Err(self.rejected(ObjectAction::Reactivate));
        }
        Ok(self.successor(
            LibraryItemStatus::Final,
            self.version(),
            author_id,
            change_description.into(),
            now,
        ))
    }

    pub fn possible_actions(&self) -> BTreeSet<ObjectAction> {
        possible_actions(self.status, self.major_version)
    }

    /// Copy of this snapshot superseded at `end_date`.
    pub fn closed(&self, end_date: DateTime<Utc>) -> Self {
        Self {
            end_date: Some(end_date),
            ..self.clone()
        }
    }

    pub(crate) fn rejected(&self, action: ObjectAction) -> InvalidTransitionError {
        InvalidTransitionError {
            action,
            status: self.status,
            version: self.version(),
        }
    }

    fn successor(
        &self,
        status: LibraryItemStatus,
        version: Version,
        author_id: AuthorId,
        change_description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            major_version: version.major,
            minor_version: version.minor,
            start_date: now,
            end_date: None,
            author_id,
            change_description,
        }
    }
}

/// Legal actions for an item in `status` with the given major version.
pub fn possible_actions(status: LibraryItemStatus, major_version: u32) -> BTreeSet<ObjectAction> {
    use ObjectAction::*;

    match status {
        LibraryItemStatus::Draft if major_version == 0 => BTreeSet::from([Approve, Edit, Delete]),
        LibraryItemStatus::Draft => BTreeSet::from([Approve, Edit]),
        LibraryItemStatus::Final => BTreeSet::from([NewVersion, Inactivate]),
        LibraryItemStatus::Retired => BTreeSet::from([Reactivate]),
    }
}

impl From<VersionedItemMetadata> for MetadataRecord {
    fn from(value: VersionedItemMetadata) -> Self {
        Self {
            status: value.status,
            major_version: value.major_version,
            minor_version: value.minor_version,
            start_date: value.start_date,
            end_date: value.end_date,
            author_id: value.author_id,
            change_description: value.change_description,
        }
    }
}

impl From<&VersionedItemMetadata> for MetadataRecord {
    fn from(value: &VersionedItemMetadata) -> Self {
        value.clone().into()
    }
}

impl TryFrom<MetadataRecord> for VersionedItemMetadata {
    type Error = MetadataError;

    fn try_from(value: MetadataRecord) -> Result<Self, Self::Error> {
        Self::from_repository_values(value)
    }
}
