use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::cache::EntityModelRef;
use crate::messages::{TextOverrideResolver, TextProperty};

// ---------------------------------------------------------------------------
// Model key
// ---------------------------------------------------------------------------

/// Cache identity of an entity model: a named variant (`reference`) of a class
/// at a nesting depth.
///
/// Root models and explicitly named variants sit at depth 0. A model reached
/// through an attribute path gets the path as its reference
/// (`Customer.region`) and one more level of depth than its owner. Depth is
/// carried, never parsed from the reference, so dots in class or variant
/// names are plain characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub reference: String,
    pub class: String,
    #[serde(default)]
    pub depth: usize,
}

impl ModelKey {
    /// Root-level variant `reference` of `class`.
    pub fn new(reference: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            class: class.into(),
            depth: 0,
        }
    }

    /// Default key of a class: the class name doubles as its reference.
    pub fn root(class: impl Into<String>) -> Self {
        let class = class.into();
        Self::new(class.clone(), class)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Key of the model reached through `attribute` of this model.
    pub fn nested(&self, attribute: &str, class: &str) -> Self {
        Self {
            reference: format!("{}.{}", self.reference, attribute),
            class: class.to_string(),
            depth: self.depth + 1,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference, self.class)
    }
}

// ---------------------------------------------------------------------------
// Three-state flags
// ---------------------------------------------------------------------------

/// Declared value of a behaviour flag. `Inherit` defers to the default
/// computed for the attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "TristateRepr")]
pub enum Tristate {
    True,
    False,
    #[default]
    Inherit,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TristateRepr {
    Flag(bool),
    Word(String),
}

impl TryFrom<TristateRepr> for Tristate {
    type Error = String;

    fn try_from(raw: TristateRepr) -> Result<Self, Self::Error> {
        match raw {
            TristateRepr::Flag(flag) => Ok(flag.into()),
            TristateRepr::Word(word) => match word.to_ascii_lowercase().as_str() {
                "true" => Ok(Self::True),
                "false" => Ok(Self::False),
                "inherit" => Ok(Self::Inherit),
                other => Err(format!(
                    "invalid flag value \"{other}\" (expected true, false or inherit)"
                )),
            },
        }
    }
}

impl Tristate {
    pub fn resolve(self, inherited: bool) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Inherit => inherited,
        }
    }

    pub fn is_inherit(self) -> bool {
        self == Self::Inherit
    }

    /// `self` unless it is `Inherit`, in which case `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        if self.is_inherit() {
            fallback
        } else {
            self
        }
    }
}

impl From<bool> for Tristate {
    fn from(flag: bool) -> Self {
        if flag {
            Self::True
        } else {
            Self::False
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeKind {
    Basic,
    Master,
    Detail,
    ElementCollection,
    Lob,
}

impl AttributeKind {
    /// Master and detail attributes point at another entity model.
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Master | Self::Detail)
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Self::Detail | Self::ElementCollection)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "BASIC",
            Self::Master => "MASTER",
            Self::Detail => "DETAIL",
            Self::ElementCollection => "ELEMENT_COLLECTION",
            Self::Lob => "LOB",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Text,
    Char,
    Short,
    Integer,
    Long,
    Decimal,
    Float,
    Double,
    Boolean,
    Date,
    Time,
    DateTime,
    Uuid,
    Binary,
}

impl ScalarType {
    pub fn is_numeric(self) -> bool {
        self.is_integral() || self.is_fractional()
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Self::Short | Self::Integer | Self::Long)
    }

    pub fn is_fractional(self) -> bool {
        matches!(self, Self::Decimal | Self::Float | Self::Double)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::DateTime)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::Text | Self::Char)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Char => "char",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
            Self::Binary => "binary",
        }
    }
}

/// Resolved value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    Enum(String),
    Entity(String),
    Collection(Box<ValueType>),
}

impl ValueType {
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    /// Referenced entity class, looking through collections.
    pub fn entity_class(&self) -> Option<&str> {
        match self {
            Self::Entity(class) => Some(class),
            Self::Collection(member) => member.entity_class(),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => f.write_str(scalar.name()),
            Self::Enum(name) | Self::Entity(name) => f.write_str(name),
            Self::Collection(member) => write!(f, "list<{member}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    Combo,
    List,
    Lookup,
    Token,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanMode {
    #[default]
    Checkbox,
    Switch,
    Combo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortOrder {
    /// Parse a declared sort entry: `name`, `-name`, `name asc` or `name desc`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(attribute) = raw.strip_prefix('-') {
            let attribute = attribute.trim();
            if attribute.is_empty() || attribute.contains(char::is_whitespace) {
                return None;
            }
            return Some(Self {
                attribute: attribute.to_string(),
                direction: SortDirection::Descending,
            });
        }

        let mut parts = raw.split_whitespace();
        let attribute = parts.next()?;
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Ascending,
            Some("desc") => SortDirection::Descending,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            attribute: attribute.to_string(),
            direction,
        })
    }
}

// ---------------------------------------------------------------------------
// Attribute model
// ---------------------------------------------------------------------------

/// Resolved metadata of one attribute, addressable by its (dotted) name.
#[derive(Debug, Clone)]
pub struct AttributeModel {
    pub name: String,
    pub kind: AttributeKind,
    pub value_type: ValueType,
    /// Model this attribute belongs to.
    pub owner: ModelKey,

    pub default_display_name: String,
    pub default_description: Option<String>,
    pub default_prompt: Option<String>,

    pub visible: bool,
    pub visible_in_grid: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub editable: bool,
    pub read_only: bool,
    pub required: bool,
    pub main: bool,

    pub select_mode: Option<SelectMode>,
    pub search_select_mode: Option<SelectMode>,
    pub display_format: Option<String>,
    pub precision: Option<u8>,
    pub use_thousands_grouping: bool,
    pub percentage: bool,
    pub currency: bool,
    pub default_value: Option<String>,
    pub boolean_mode: Option<BooleanMode>,
    pub search_case_sensitive: bool,
    pub search_prefix_only: bool,
    pub allowed_extensions: Vec<String>,

    /// Model of the referenced type; only for master/detail attributes of a
    /// model that is not a leaf.
    pub nested_entity_model: Option<EntityModelRef>,

    pub group: String,
    pub order: usize,

    pub(crate) texts: TextOverrideResolver,
}

impl AttributeModel {
    /// Display name in `locale` (`None` for the default locale).
    pub fn display_name(&self, locale: Option<&str>) -> String {
        self.texts
            .attribute_text(&self.owner, &self.name, TextProperty::DisplayName, locale)
            .unwrap_or_else(|| self.default_display_name.clone())
    }

    pub fn description(&self, locale: Option<&str>) -> Option<String> {
        self.texts
            .attribute_text(&self.owner, &self.name, TextProperty::Description, locale)
            .or_else(|| self.default_description.clone())
    }

    pub fn prompt(&self, locale: Option<&str>) -> Option<String> {
        self.texts
            .attribute_text(&self.owner, &self.name, TextProperty::Prompt, locale)
            .or_else(|| self.default_prompt.clone())
    }

    pub fn is_reference(&self) -> bool {
        self.kind.is_reference()
    }

    pub fn nested_entity_model(&self) -> Option<&EntityModelRef> {
        self.nested_entity_model.as_ref()
    }

    /// Published nested model, waiting for an in-flight build if needed.
    pub fn nested_model(&self) -> Option<&EntityModel> {
        self.nested_entity_model.as_ref().and_then(EntityModelRef::model)
    }
}

// ---------------------------------------------------------------------------
// Entity model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeGroup {
    pub key: String,
    pub attributes: Vec<String>,
}

/// Metadata of one (reference, class) pair. Only the builder creates it;
/// consumers receive it behind an `Arc` and read it through `&self`.
#[derive(Debug)]
pub struct EntityModel {
    pub(crate) key: ModelKey,
    pub(crate) default_display_name: String,
    pub(crate) default_display_name_plural: String,
    pub(crate) default_description: Option<String>,
    pub(crate) display_property: Option<String>,
    pub(crate) attributes: Vec<AttributeModel>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) id_attribute: Option<AttributeModel>,
    pub(crate) version_attribute: Option<AttributeModel>,
    pub(crate) main_attribute: Option<usize>,
    pub(crate) groups: Vec<AttributeGroup>,
    pub(crate) only_default_group: bool,
    pub(crate) sort_order: Vec<SortOrder>,
    pub(crate) grid_order: Vec<usize>,
    pub(crate) search_order: Vec<usize>,
    pub(crate) leaf: bool,
    pub(crate) texts: TextOverrideResolver,
}

impl EntityModel {
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn reference(&self) -> &str {
        &self.key.reference
    }

    pub fn entity_class(&self) -> &str {
        &self.key.class
    }

    pub fn depth(&self) -> usize {
        self.key.depth()
    }

    /// True when the nesting limit was reached: reference attributes of a
    /// leaf model carry no nested model.
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub fn display_name(&self, locale: Option<&str>) -> String {
        self.texts
            .entity_text(&self.key, TextProperty::DisplayName, locale)
            .unwrap_or_else(|| self.default_display_name.clone())
    }

    pub fn display_name_plural(&self, locale: Option<&str>) -> String {
        self.texts
            .entity_text(&self.key, TextProperty::DisplayNamePlural, locale)
            .unwrap_or_else(|| self.default_display_name_plural.clone())
    }

    pub fn description(&self, locale: Option<&str>) -> Option<String> {
        self.texts
            .entity_text(&self.key, TextProperty::Description, locale)
            .or_else(|| self.default_description.clone())
    }

    pub fn display_property(&self) -> Option<&str> {
        self.display_property.as_deref()
    }

    /// Ordinary attributes in their final order (technical slots excluded).
    pub fn attributes(&self) -> &[AttributeModel] {
        &self.attributes
    }

    pub fn id_attribute(&self) -> Option<&AttributeModel> {
        self.id_attribute.as_ref()
    }

    pub fn version_attribute(&self) -> Option<&AttributeModel> {
        self.version_attribute.as_ref()
    }

    pub fn main_attribute(&self) -> Option<&AttributeModel> {
        self.main_attribute.map(|idx| &self.attributes[idx])
    }

    pub fn groups(&self) -> &[AttributeGroup] {
        &self.groups
    }

    /// True when no groups were declared and every attribute sits in the
    /// synthesized default group.
    pub fn only_default_group(&self) -> bool {
        self.only_default_group
    }

    pub fn attributes_in_group(&self, key: &str) -> Vec<&AttributeModel> {
        self.groups
            .iter()
            .find(|g| g.key == key)
            .map(|g| {
                g.attributes
                    .iter()
                    .filter_map(|name| self.local_attribute(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sort_order(&self) -> &[SortOrder] {
        &self.sort_order
    }

    pub fn required_attributes(&self) -> Vec<&AttributeModel> {
        self.attributes.iter().filter(|a| a.required).collect()
    }

    pub fn attributes_of_kind(&self, kind: AttributeKind) -> Vec<&AttributeModel> {
        self.attributes.iter().filter(|a| a.kind == kind).collect()
    }

    /// Grid columns: attributes visible in grids, in grid order.
    pub fn grid_attributes(&self) -> Vec<&AttributeModel> {
        self.grid_order
            .iter()
            .map(|&idx| &self.attributes[idx])
            .filter(|a| a.visible_in_grid)
            .collect()
    }

    /// Search form fields: searchable attributes, in search order.
    pub fn search_attributes(&self) -> Vec<&AttributeModel> {
        self.search_order
            .iter()
            .map(|&idx| &self.attributes[idx])
            .filter(|a| a.searchable)
            .collect()
    }

    /// Look up an attribute by dotted path. A path segment that names a
    /// master/detail attribute continues in its nested model; flattened
    /// embedded attributes match by their full dotted name.
    pub fn get_attribute_model(&self, path: &str) -> Option<&AttributeModel> {
        if let Some(attribute) = self.local_attribute(path) {
            return Some(attribute);
        }

        for (idx, _) in path.match_indices('.') {
            let (head, rest) = (&path[..idx], &path[idx + 1..]);
            let nested = self
                .local_attribute(head)
                .and_then(AttributeModel::nested_model);
            if let Some(found) = nested.and_then(|model| model.get_attribute_model(rest)) {
                return Some(found);
            }
        }

        None
    }

    fn local_attribute(&self, name: &str) -> Option<&AttributeModel> {
        if let Some(&idx) = self.index.get(name) {
            return Some(&self.attributes[idx]);
        }
        self.id_attribute
            .iter()
            .chain(self.version_attribute.iter())
            .find(|a| a.name == name)
    }
}
