//! YAML/JSON schema documents: class descriptors plus optional global
//! configuration and message bundles, turned into a source and a factory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::error::SchemaError;
use crate::factory::ModelFactory;
use crate::messages::BundleMessageService;
use crate::source::{ClassDescriptor, StaticSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GlobalConfig>,
    /// locale -> message key -> text
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, BTreeMap<String, String>>,
    pub classes: Vec<ClassDescriptor>,
}

impl SchemaDocument {
    pub fn from_yaml_str(content: &str, origin: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(content).map_err(|source| SchemaError::Yaml {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(content).map_err(|source| SchemaError::Json {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: origin.clone(),
            source,
        })?;
        if path.extension().is_some_and(|e| e == "json") {
            Self::from_json_str(&content, &origin)
        } else {
            Self::from_yaml_str(&content, &origin)
        }
    }

    /// Combine documents in order. Class names must be unique across all of
    /// them; a later `config` replaces an earlier one and message bundles
    /// are merged key by key.
    pub fn merge(documents: Vec<(String, SchemaDocument)>) -> Result<Self, SchemaError> {
        let mut merged = SchemaDocument::default();
        let mut origins: HashMap<String, String> = HashMap::new();

        for (origin, document) in documents {
            for class in document.classes {
                if let Some(first) = origins.get(&class.name) {
                    return Err(SchemaError::DuplicateClass {
                        name: class.name,
                        origin,
                        first: first.clone(),
                    });
                }
                origins.insert(class.name.clone(), origin.clone());
                merged.classes.push(class);
            }
            if document.config.is_some() {
                merged.config = document.config;
            }
            for (locale, bundle) in document.messages {
                merged.messages.entry(locale).or_default().extend(bundle);
            }
        }

        Ok(merged)
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    /// Message bundles of this document with `default_locale` as fallback.
    pub fn message_service(&self, default_locale: &str) -> BundleMessageService {
        self.messages
            .iter()
            .fold(BundleMessageService::new(default_locale), |service, (locale, bundle)| {
                service.with_bundle(locale, bundle.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            })
    }

    pub fn to_source(&self) -> StaticSource {
        self.classes
            .iter()
            .cloned()
            .fold(StaticSource::new(), StaticSource::with_class)
    }

    /// Factory over this document. `config` overrides the embedded
    /// configuration section when given.
    pub fn into_factory(self, config: Option<GlobalConfig>) -> ModelFactory {
        let config = config.or_else(|| self.config.clone()).unwrap_or_default();
        let messages = self.message_service(&config.locale);
        ModelFactory::builder(self.to_source())
            .config(config)
            .messages(Arc::new(messages))
            .build()
    }
}
