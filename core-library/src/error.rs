use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("No {entity_type} found with the id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid filter on {field}: {message}")]
    InvalidFilter { field: String, message: String },

    #[error("Invalid sort key {key}: {message}")]
    InvalidSort { key: String, message: String },

    #[error("Duplicated {entity_type}: the slug {slug} is already in use")]
    DuplicateResource { entity_type: String, slug: String },

    #[error("Invalid relation on {entity_type}: {message}")]
    InvalidRelation { entity_type: String, message: String },

    #[error("No relation {relation} is declared on {entity_type}")]
    UnknownRelation { entity_type: String, relation: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// A state the storage layer should make impossible, e.g. a slug that
    /// both collides on insert and cannot be found afterwards.
    #[error("Internal inconsistency: {0}")]
    Inconsistency(String),
}

impl LibraryError {
    pub(crate) fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        LibraryError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_filter(field: impl Into<String>, message: impl Into<String>) -> Self {
        LibraryError::InvalidFilter {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_sort(key: impl Into<String>, message: impl Into<String>) -> Self {
        LibraryError::InvalidSort {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_relation(
        entity_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LibraryError::InvalidRelation {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this is the storage uniqueness signal raised by a write.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LibraryError::DuplicateResource { .. })
    }

    /// HTTP status the API layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LibraryError::NotFound { .. } => 404,
            LibraryError::InvalidFilter { .. }
            | LibraryError::InvalidSort { .. }
            | LibraryError::InvalidRelation { .. }
            | LibraryError::UnknownRelation { .. }
            | LibraryError::InvalidInput { .. } => 400,
            LibraryError::DuplicateResource { .. } => 409,
            LibraryError::Bridge(_)
            | LibraryError::Serialization(_)
            | LibraryError::Config(_)
            | LibraryError::Inconsistency(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(LibraryError::not_found("show", 3).status_code(), 404);
        assert_eq!(
            LibraryError::invalid_filter("title", "unknown operator").status_code(),
            400
        );
        assert_eq!(LibraryError::invalid_sort("status", "enum").status_code(), 400);
        assert_eq!(
            LibraryError::invalid_relation("season", "orphan").status_code(),
            400
        );
        assert_eq!(
            LibraryError::DuplicateResource {
                entity_type: "show".into(),
                slug: "anohana".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            LibraryError::Inconsistency("lost slug".into()).status_code(),
            500
        );
        assert_eq!(
            LibraryError::from(BridgeError::DatabaseError("disk".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_not_found_message_names_type_and_id() {
        let err = LibraryError::not_found("show", "anohana");
        assert_eq!(err.to_string(), "No show found with the id anohana");
    }
}
