use crate::domain::{
    AttributeId, ItemTypeId, LibraryName,
    lifecycle::{InvalidTransitionError, MetadataError},
};

/// Business rule violations of the library item aggregate.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),
    #[error("library '{0}' is not editable")]
    LibraryNotEditable(LibraryName),
    #[error("library item has been approved and cannot be deleted")]
    AlreadyApproved,
    #[error("cannot use deleted library item")]
    Deleted,
    #[error("template parameters of field '{field}' cannot be changed after approval")]
    TemplateParametersChanged { field: AttributeId },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// A value does not conform to the fields configured for its item type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown item type '{0}'")]
    UnknownItemType(ItemTypeId),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("missing required field '{0}'")]
    MissingRequiredField(AttributeId),
    #[error("field '{field}' expects a value of type {expected}")]
    InvalidFieldType { field: AttributeId, expected: String },
    #[error("field '{field}' is invalid: {reason}")]
    ConstraintViolated { field: AttributeId, reason: String },
    #[error("malformed value: {0}")]
    Malformed(String),
}
