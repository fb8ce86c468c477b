//! Class and property descriptors, and the `AttributeSource` seam through
//! which the engine discovers them.
//!
//! Nothing else in the crate knows where declarations come from: hand-built
//! `StaticSource`s in tests and YAML/JSON schema documents both end up here.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::catalogs::COLLECTION_WRAPPERS;
use crate::types::{SelectMode, Tristate};

/// `list<Member>` / `set<Member>` style collection declarations.
static RE_COLLECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*<\s*(.+?)\s*>$").unwrap());

// ---------------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------------

/// Declared type of a property, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeRef {
    Named(String),
    Collection(Box<TypeRef>),
}

impl TypeRef {
    /// Parse a declared type. `list<T>`, `set<T>` and `T[]` are collections;
    /// everything else is taken as a name and classified later.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(member) = raw.strip_suffix("[]") {
            return Self::Collection(Box::new(Self::parse(member)));
        }
        if let Some(caps) = RE_COLLECTION.captures(raw) {
            let wrapper = caps[1].to_ascii_lowercase();
            if COLLECTION_WRAPPERS.contains(wrapper.as_str()) {
                return Self::Collection(Box::new(Self::parse(&caps[2])));
            }
        }
        Self::Named(raw.to_string())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Collection(member) => write!(f, "list<{member}>"),
        }
    }
}

impl From<String> for TypeRef {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for TypeRef {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<TypeRef> for String {
    fn from(type_ref: TypeRef) -> Self {
        type_ref.to_string()
    }
}

// ---------------------------------------------------------------------------
// Declarative configuration
// ---------------------------------------------------------------------------

/// Per-property declarations. Every field is optional; unset values fall
/// back to type-based and global defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeConfig {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub prompt: Option<String>,

    pub visible: Tristate,
    pub visible_in_grid: Tristate,
    pub searchable: Tristate,
    pub sortable: Tristate,
    pub editable: Tristate,
    pub read_only: Tristate,
    pub required: Tristate,
    pub main: bool,

    pub select_mode: Option<SelectMode>,
    pub search_select_mode: Option<SelectMode>,
    pub display_format: Option<String>,
    pub precision: Option<u8>,
    pub use_thousands_grouping: Tristate,
    pub percentage: bool,
    pub currency: bool,
    pub default_value: Option<String>,
    pub search_case_sensitive: Tristate,
    pub search_prefix_only: Tristate,
    pub allowed_extensions: Vec<String>,

    /// Flatten the properties of the referenced class into the owner.
    pub embedded: bool,
    /// Treat a scalar as a large object.
    pub lob: bool,
    /// Named variant to use for the nested model instead of the
    /// path-derived reference.
    pub nested_reference: Option<String>,

    pub id: bool,
    pub version: bool,
    pub ignore: bool,
}

impl AttributeConfig {
    /// Behaviour flags left at `Inherit` take the value declared on the
    /// embedding property.
    pub fn inherit_from(&self, embedding: &AttributeConfig) -> AttributeConfig {
        let mut merged = self.clone();
        merged.visible = self.visible.or(embedding.visible);
        merged.visible_in_grid = self.visible_in_grid.or(embedding.visible_in_grid);
        merged.searchable = self.searchable.or(embedding.searchable);
        merged.sortable = self.sortable.or(embedding.sortable);
        merged.editable = self.editable.or(embedding.editable);
        merged.read_only = self.read_only.or(embedding.read_only);
        merged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDecl {
    pub key: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl GroupDecl {
    pub fn new(key: impl Into<String>, attributes: &[&str]) -> Self {
        Self {
            key: key.into(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Class-level declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityConfig {
    pub display_name: Option<String>,
    pub display_name_plural: Option<String>,
    pub description: Option<String>,
    pub display_property: Option<String>,
    /// Default sort: `name`, `-name`, `name desc`.
    pub sort_order: Vec<String>,
    pub groups: Vec<GroupDecl>,
    pub attribute_order: Vec<String>,
    pub grid_order: Vec<String>,
    pub search_order: Vec<String>,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Entity,
    Embeddable,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: TypeRef,
    #[serde(flatten)]
    pub config: AttributeConfig,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            config: AttributeConfig::default(),
        }
    }

    pub fn with(mut self, config: AttributeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(mut self) -> Self {
        self.config.id = true;
        self
    }

    pub fn main(mut self) -> Self {
        self.config.main = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.config.searchable = Tristate::True;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Enumeration constants (enum classes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(flatten)]
    pub config: EntityConfig,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    fn with_kind(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            values: Vec::new(),
            config: EntityConfig::default(),
            properties: Vec::new(),
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Entity)
    }

    pub fn embeddable(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Embeddable)
    }

    pub fn enumeration(name: impl Into<String>, values: &[&str]) -> Self {
        let mut class = Self::with_kind(name, ClassKind::Enum);
        class.values = values.iter().map(|v| v.to_string()).collect();
        class
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_config(mut self, config: EntityConfig) -> Self {
        self.config = config;
        self
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Introspection seam: the engine asks a source about classes and their
/// declared properties and never looks anywhere else.
pub trait AttributeSource: Send + Sync {
    fn describe_class(&self, name: &str) -> Option<&ClassDescriptor>;

    /// All class names known to the source, sorted.
    fn class_names(&self) -> Vec<&str>;

    fn entity_class_names(&self) -> Vec<&str> {
        self.class_names()
            .into_iter()
            .filter(|name| {
                self.describe_class(name)
                    .is_some_and(|c| c.kind == ClassKind::Entity)
            })
            .collect()
    }
}

/// In-memory source built from descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    classes: BTreeMap<String, ClassDescriptor>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassDescriptor) -> Self {
        self.insert(class);
        self
    }

    /// Register a class, returning the descriptor it replaced.
    pub fn insert(&mut self, class: ClassDescriptor) -> Option<ClassDescriptor> {
        self.classes.insert(class.name.clone(), class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl AttributeSource for StaticSource {
    fn describe_class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    fn class_names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }
}
