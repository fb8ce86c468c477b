pub mod cache;
pub mod catalogs;
pub mod config;
pub mod error;
pub mod export;
pub mod factory;
pub mod groups;
pub mod messages;
pub mod schema;
pub mod source;
pub mod types;

mod builder;
mod extractor;

pub use cache::{CacheStats, EntityModelRef};
pub use catalogs::{ENGINE_VERSION, SNAPSHOT_VERSION};
pub use config::GlobalConfig;
pub use error::{ModelError, SchemaError};
pub use export::{model_to_json, snapshot, snapshot_to_json, EntitySnapshot};
pub use factory::{ModelFactory, ModelFactoryBuilder};
pub use messages::{BundleMessageService, MessageService, NoMessages, TextOverrideResolver};
pub use schema::SchemaDocument;
pub use source::{
    AttributeConfig, AttributeSource, ClassDescriptor, ClassKind, EntityConfig, GroupDecl,
    PropertyDescriptor, StaticSource, TypeRef,
};
pub use types::*;
