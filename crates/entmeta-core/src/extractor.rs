use tracing::{debug, trace};

use crate::builder::collect_properties;
use crate::catalogs::scalar_type;
use crate::error::ModelError;
use crate::factory::FactoryInner;
use crate::messages::humanize;
use crate::source::{AttributeConfig, AttributeSource, ClassKind, PropertyDescriptor, TypeRef};
use crate::types::{AttributeKind, AttributeModel, ModelKey, ScalarType, SelectMode, ValueType};

/// Result of extracting one declared property.
pub(crate) enum Extraction {
    Attribute(Box<AttributeModel>),
    /// Children of an embedded property, already prefixed with its name.
    Flattened(Vec<AttributeModel>),
    Id(Box<AttributeModel>),
    Version(Box<AttributeModel>),
    Skipped,
}

enum Classification {
    Attribute {
        kind: AttributeKind,
        value_type: ValueType,
    },
    Embedded(String),
}

/// Turns declared properties into resolved attribute models for one owner.
///
/// Layering, later wins: type-based defaults, global configuration, the
/// property's own declarations. Locale texts are applied on read.
pub(crate) struct AttributeMetadataExtractor<'a> {
    factory: &'a FactoryInner,
    owner: &'a ModelKey,
    leaf: bool,
}

impl<'a> AttributeMetadataExtractor<'a> {
    pub(crate) fn new(factory: &'a FactoryInner, owner: &'a ModelKey, leaf: bool) -> Self {
        Self {
            factory,
            owner,
            leaf,
        }
    }

    fn source(&self) -> &'a dyn AttributeSource {
        self.factory.source.as_ref()
    }

    fn definition(&self, message: impl Into<String>) -> ModelError {
        ModelError::definition(self.owner, message)
    }

    pub(crate) fn extract(&self, property: &PropertyDescriptor) -> Result<Extraction, ModelError> {
        let config = &property.config;
        if config.ignore {
            debug!(owner = %self.owner, attribute = %property.name, "property ignored");
            return Ok(Extraction::Skipped);
        }
        if config.id && config.version {
            return Err(self.definition(format!(
                "attribute \"{}\" cannot be both the id and the version attribute",
                property.name
            )));
        }

        match self.classify(&property.name, &property.declared_type, config)? {
            Classification::Embedded(class) => {
                if config.id || config.version || config.main {
                    return Err(self.definition(format!(
                        "embedded attribute \"{}\" cannot be an id, version or main attribute",
                        property.name
                    )));
                }
                self.flatten(property, &class).map(Extraction::Flattened)
            }
            Classification::Attribute { kind, value_type } => {
                let technical = config.id || config.version;
                if technical && kind != AttributeKind::Basic {
                    return Err(self.definition(format!(
                        "technical attribute \"{}\" must be a scalar, found {kind}",
                        property.name
                    )));
                }
                if technical && config.main {
                    return Err(self.definition(format!(
                        "technical attribute \"{}\" cannot be the main attribute",
                        property.name
                    )));
                }

                let attribute = Box::new(self.resolve(&property.name, kind, value_type, config)?);
                Ok(if config.id {
                    Extraction::Id(attribute)
                } else if config.version {
                    Extraction::Version(attribute)
                } else {
                    Extraction::Attribute(attribute)
                })
            }
        }
    }

    fn classify(
        &self,
        attribute: &str,
        declared: &TypeRef,
        config: &AttributeConfig,
    ) -> Result<Classification, ModelError> {
        let unsupported = || ModelError::unsupported(self.owner, attribute, declared.to_string());

        match declared {
            TypeRef::Named(name) => {
                if let Some(scalar) = scalar_type(name) {
                    if config.embedded {
                        return Err(self.definition(format!(
                            "scalar attribute \"{attribute}\" cannot be embedded"
                        )));
                    }
                    let kind = if scalar == ScalarType::Binary || config.lob {
                        AttributeKind::Lob
                    } else {
                        AttributeKind::Basic
                    };
                    return Ok(Classification::Attribute {
                        kind,
                        value_type: ValueType::Scalar(scalar),
                    });
                }

                let class = self.source().describe_class(name).ok_or_else(unsupported)?;
                match class.kind {
                    ClassKind::Enum if config.embedded => Err(self.definition(format!(
                        "enum attribute \"{attribute}\" cannot be embedded"
                    ))),
                    ClassKind::Enum => Ok(Classification::Attribute {
                        kind: AttributeKind::Basic,
                        value_type: ValueType::Enum(class.name.clone()),
                    }),
                    ClassKind::Entity if !config.embedded => Ok(Classification::Attribute {
                        kind: AttributeKind::Master,
                        value_type: ValueType::Entity(class.name.clone()),
                    }),
                    ClassKind::Entity | ClassKind::Embeddable => {
                        Ok(Classification::Embedded(class.name.clone()))
                    }
                }
            }
            TypeRef::Collection(member) => {
                if config.embedded {
                    return Err(self.definition(format!(
                        "collection attribute \"{attribute}\" cannot be embedded"
                    )));
                }
                let TypeRef::Named(name) = member.as_ref() else {
                    return Err(unsupported());
                };
                if let Some(scalar) = scalar_type(name) {
                    return Ok(Classification::Attribute {
                        kind: AttributeKind::ElementCollection,
                        value_type: ValueType::Collection(Box::new(ValueType::Scalar(scalar))),
                    });
                }
                match self.source().describe_class(name) {
                    Some(class) if class.kind == ClassKind::Enum => Ok(Classification::Attribute {
                        kind: AttributeKind::ElementCollection,
                        value_type: ValueType::Collection(Box::new(ValueType::Enum(
                            class.name.clone(),
                        ))),
                    }),
                    Some(class) if class.kind == ClassKind::Entity => Ok(Classification::Attribute {
                        kind: AttributeKind::Detail,
                        value_type: ValueType::Collection(Box::new(ValueType::Entity(
                            class.name.clone(),
                        ))),
                    }),
                    _ => Err(unsupported()),
                }
            }
        }
    }

    /// Emit the embedded type's properties as `<property>.<child>` attributes.
    /// Flattening is one level deep.
    fn flatten(
        &self,
        property: &PropertyDescriptor,
        class: &str,
    ) -> Result<Vec<AttributeModel>, ModelError> {
        let children = collect_properties(self.source(), self.owner, class)?;
        let mut flattened = Vec::with_capacity(children.len());

        for child in &children {
            let config = child.config.inherit_from(&property.config);
            if config.ignore || config.id || config.version {
                debug!(
                    owner = %self.owner,
                    attribute = %property.name,
                    child = %child.name,
                    "skipping technical or ignored property of embedded type"
                );
                continue;
            }

            let path = format!("{}.{}", property.name, child.name);
            match self.classify(&path, &child.declared_type, &config)? {
                Classification::Embedded(inner) => {
                    return Err(ModelError::unsupported(
                        self.owner,
                        &path,
                        format!("{inner} (embedded inside embedded {class})"),
                    ));
                }
                Classification::Attribute { kind, value_type } => {
                    flattened.push(self.resolve(&path, kind, value_type, &config)?);
                }
            }
        }

        Ok(flattened)
    }

    fn resolve(
        &self,
        name: &str,
        kind: AttributeKind,
        value_type: ValueType,
        config: &AttributeConfig,
    ) -> Result<AttributeModel, ModelError> {
        let global = &self.factory.config;
        let scalar = value_type.scalar();
        let numeric = scalar.is_some_and(ScalarType::is_numeric);

        // Type-based defaults, filled in from the global configuration.
        let default_format = match scalar {
            Some(ScalarType::Date) => Some(global.date_format.clone()),
            Some(ScalarType::Time) => Some(global.time_format.clone()),
            Some(ScalarType::DateTime) => Some(global.datetime_format.clone()),
            _ => None,
        };
        let default_precision = match scalar {
            Some(s) if s.is_fractional() => Some(global.decimal_precision),
            Some(s) if s.is_integral() => Some(0),
            _ => None,
        };
        let default_select = match (kind, &value_type) {
            (AttributeKind::Master, _) => Some(SelectMode::Combo),
            (AttributeKind::Detail, _) => Some(SelectMode::Lookup),
            (AttributeKind::ElementCollection, _) => Some(SelectMode::Token),
            (_, ValueType::Enum(_)) => Some(global.enum_select_mode),
            _ => None,
        };

        self.check_declarations(name, kind, numeric, default_select.is_some(), config)?;

        let visible = config.visible.resolve(true);
        let tabular = !matches!(
            kind,
            AttributeKind::Detail | AttributeKind::ElementCollection | AttributeKind::Lob
        );
        let read_only = config.read_only.resolve(false);
        let select_mode = config.select_mode.or(default_select);

        let nested_entity_model = match value_type.entity_class() {
            Some(class) if kind.is_reference() && !self.leaf => {
                let nested_key = match &config.nested_reference {
                    Some(reference) => ModelKey::new(reference.clone(), class),
                    None => self.owner.nested(name, class),
                };
                Some(self.factory.request_nested(self.owner, &nested_key)?)
            }
            _ => None,
        };

        trace!(owner = %self.owner, attribute = name, %kind, "attribute extracted");

        Ok(AttributeModel {
            name: name.to_string(),
            kind,
            owner: self.owner.clone(),
            default_display_name: config.display_name.clone().unwrap_or_else(|| humanize(name)),
            default_description: config.description.clone(),
            default_prompt: config.prompt.clone(),
            visible,
            visible_in_grid: config.visible_in_grid.resolve(visible && tabular),
            searchable: config.searchable.resolve(false),
            sortable: config.sortable.resolve(tabular),
            editable: config.editable.resolve(!read_only),
            read_only,
            required: config.required.resolve(false),
            main: config.main,
            select_mode,
            search_select_mode: config.search_select_mode.or(select_mode),
            display_format: config.display_format.clone().or(default_format),
            precision: config.precision.or(default_precision),
            use_thousands_grouping: numeric
                && config
                    .use_thousands_grouping
                    .resolve(global.use_thousands_grouping),
            percentage: config.percentage,
            currency: config.currency,
            default_value: config.default_value.clone(),
            boolean_mode: (scalar == Some(ScalarType::Boolean)).then_some(global.boolean_mode),
            search_case_sensitive: config
                .search_case_sensitive
                .resolve(global.search_case_sensitive),
            search_prefix_only: config.search_prefix_only.resolve(global.search_prefix_only),
            allowed_extensions: config.allowed_extensions.clone(),
            nested_entity_model,
            value_type,
            group: String::new(),
            order: 0,
            texts: self.factory.texts.clone(),
        })
    }

    /// Reject declarations that contradict each other or the attribute kind.
    fn check_declarations(
        &self,
        name: &str,
        kind: AttributeKind,
        numeric: bool,
        selectable: bool,
        config: &AttributeConfig,
    ) -> Result<(), ModelError> {
        if config.read_only.resolve(false) && config.editable.resolve(false) {
            return Err(self.definition(format!(
                "attribute \"{name}\" is declared both read-only and editable"
            )));
        }
        if config.percentage && config.currency {
            return Err(self.definition(format!(
                "attribute \"{name}\" is declared both percentage and currency"
            )));
        }
        if !numeric && (config.percentage || config.currency || config.precision.is_some()) {
            return Err(self.definition(format!(
                "numeric formatting declared on non-numeric attribute \"{name}\""
            )));
        }
        if !selectable && (config.select_mode.is_some() || config.search_select_mode.is_some()) {
            return Err(self.definition(format!(
                "select mode declared on attribute \"{name}\", which is not a reference, enum or collection"
            )));
        }
        if !config.allowed_extensions.is_empty() && kind != AttributeKind::Lob {
            return Err(self.definition(format!(
                "allowed file extensions declared on non-LOB attribute \"{name}\""
            )));
        }
        if config.nested_reference.is_some() && !kind.is_reference() {
            return Err(self.definition(format!(
                "nested reference declared on attribute \"{name}\", which is not a master or detail attribute"
            )));
        }
        Ok(())
    }
}
