use thiserror::Error;

use crate::types::ModelKey;

// ---------------------------------------------------------------------------
// Model build errors
// ---------------------------------------------------------------------------

/// Failure of a model build. Cloneable because a failed slot keeps its
/// error and hands a copy to every later requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid model definition for {key}: {message}")]
    Definition { key: ModelKey, message: String },

    #[error("unsupported type \"{type_name}\" for attribute \"{attribute}\" of {key}")]
    UnsupportedAttributeType {
        key: ModelKey,
        attribute: String,
        type_name: String,
    },

    #[error("build of {key} was aborted before it completed")]
    BuildAborted { key: ModelKey },
}

impl ModelError {
    pub(crate) fn definition(key: &ModelKey, message: impl Into<String>) -> Self {
        Self::Definition {
            key: key.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(key: &ModelKey, attribute: &str, type_name: impl Into<String>) -> Self {
        Self::UnsupportedAttributeType {
            key: key.clone(),
            attribute: attribute.to_string(),
            type_name: type_name.into(),
        }
    }

    /// Key of the model whose build failed.
    pub fn key(&self) -> &ModelKey {
        match self {
            Self::Definition { key, .. }
            | Self::UnsupportedAttributeType { key, .. }
            | Self::BuildAborted { key } => key,
        }
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, Self::Definition { .. })
    }

    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, Self::UnsupportedAttributeType { .. })
    }
}

// ---------------------------------------------------------------------------
// Schema document / configuration loading errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate class \"{name}\" in {origin} (first defined in {first})")]
    DuplicateClass {
        name: String,
        origin: String,
        first: String,
    },
}
