use thiserror::Error;

/// Which kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Trip,
    Place,
    Card,
    Media,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Trip => "Trip",
            EntityKind::Place => "Place",
            EntityKind::Card => "Card",
            EntityKind::Media => "Media",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TokiError {
    #[error("Invalid geohash {hash:?}: character {ch:?} at position {position} is not in the base-32 alphabet")]
    Decode {
        hash: String,
        position: usize,
        ch: char,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Coordinates out of range: ({lat}, {lon})")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Bundle version {found} is newer than the supported version {supported}")]
    ImportConflict { found: u32, supported: u32 },

    #[error("Malformed archive: {0}")]
    Archive(String),

    #[error("Invalid id {id:?}: must be a plain name without path separators")]
    InvalidId { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(#[from] confique::Error),
}

impl TokiError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        TokiError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for failures of the underlying storage (disk, permissions, encoding).
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            TokiError::Io(_) | TokiError::Serialization(_) | TokiError::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TokiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = TokiError::not_found(EntityKind::Card, "abc");
        assert_eq!(err.to_string(), "Card not found: abc");
        assert!(!err.is_persistence());
    }

    #[test]
    fn test_io_is_persistence() {
        let err: TokiError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.is_persistence());
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_decode_display_names_offender() {
        let err = TokiError::Decode {
            hash: "xn7a".into(),
            position: 3,
            ch: 'a',
        };
        let msg = err.to_string();
        assert!(msg.contains("'a'"));
        assert!(msg.contains("position 3"));
    }
}
