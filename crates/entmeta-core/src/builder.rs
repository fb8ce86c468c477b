//! Assembly of one entity model from its class descriptor chain.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::ModelError;
use crate::extractor::{AttributeMetadataExtractor, Extraction};
use crate::factory::FactoryInner;
use crate::groups::{self, LayoutError};
use crate::messages::{humanize, pluralize};
use crate::source::{AttributeSource, ClassDescriptor, ClassKind, EntityConfig, PropertyDescriptor};
use crate::types::{AttributeGroup, AttributeModel, EntityModel, ModelKey, SortOrder};

// ---------------------------------------------------------------------------
// Inheritance
// ---------------------------------------------------------------------------

/// Ancestors of `class`, root first, ending with `class` itself.
fn ancestor_chain<'s>(
    source: &'s dyn AttributeSource,
    key: &ModelKey,
    class: &str,
) -> Result<Vec<&'s ClassDescriptor>, ModelError> {
    let mut chain = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = Some(class.to_string());

    while let Some(name) = current {
        if !visited.insert(name.clone()) {
            return Err(ModelError::definition(
                key,
                format!("inheritance cycle through class \"{name}\""),
            ));
        }
        let descriptor = source.describe_class(&name).ok_or_else(|| {
            ModelError::definition(key, format!("unknown class \"{name}\" in inheritance chain of \"{class}\""))
        })?;
        current = descriptor.parent.clone();
        chain.push(descriptor);
    }

    chain.reverse();
    Ok(chain)
}

/// Properties in declaration order, ancestors first. A property redeclared
/// by a subclass replaces the inherited one and takes the subclass position.
fn merge_properties(chain: &[&ClassDescriptor]) -> Vec<PropertyDescriptor> {
    let mut properties: Vec<PropertyDescriptor> = Vec::new();
    for class in chain {
        for property in &class.properties {
            properties.retain(|p| p.name != property.name);
            properties.push(property.clone());
        }
    }
    properties
}

/// Class-level declarations; a subclass overrides whatever it sets.
fn merge_entity_config(chain: &[&ClassDescriptor]) -> EntityConfig {
    let mut merged = EntityConfig::default();
    for class in chain {
        let own = &class.config;
        if own.display_name.is_some() {
            merged.display_name.clone_from(&own.display_name);
            // a renamed subclass should not keep the parent's plural
            merged.display_name_plural.clone_from(&own.display_name_plural);
        } else if own.display_name_plural.is_some() {
            merged.display_name_plural.clone_from(&own.display_name_plural);
        }
        if own.description.is_some() {
            merged.description.clone_from(&own.description);
        }
        if own.display_property.is_some() {
            merged.display_property.clone_from(&own.display_property);
        }
        for (target, declared) in [
            (&mut merged.sort_order, &own.sort_order),
            (&mut merged.attribute_order, &own.attribute_order),
            (&mut merged.grid_order, &own.grid_order),
            (&mut merged.search_order, &own.search_order),
        ] {
            if !declared.is_empty() {
                target.clone_from(declared);
            }
        }
        if !own.groups.is_empty() {
            merged.groups.clone_from(&own.groups);
        }
    }
    merged
}

pub(crate) fn collect_properties(
    source: &dyn AttributeSource,
    key: &ModelKey,
    class: &str,
) -> Result<Vec<PropertyDescriptor>, ModelError> {
    let chain = ancestor_chain(source, key, class)?;
    Ok(merge_properties(&chain))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds the model for one key. Nested models are requested through the
/// factory, which hands back cached handles or builds them first.
pub(crate) struct EntityModelBuilder<'a> {
    factory: &'a FactoryInner,
    key: &'a ModelKey,
}

impl<'a> EntityModelBuilder<'a> {
    pub(crate) fn new(factory: &'a FactoryInner, key: &'a ModelKey) -> Self {
        Self { factory, key }
    }

    fn definition(&self, message: impl Into<String>) -> ModelError {
        ModelError::definition(self.key, message)
    }

    fn layout_error(&self, err: LayoutError) -> ModelError {
        self.definition(err.to_string())
    }

    pub(crate) fn build(&self) -> Result<EntityModel, ModelError> {
        let source = self.factory.source.as_ref();
        let class = source
            .describe_class(&self.key.class)
            .ok_or_else(|| self.definition(format!("unknown class \"{}\"", self.key.class)))?;
        if class.kind != ClassKind::Entity {
            return Err(self.definition(format!(
                "class \"{}\" is not an entity and has no model of its own",
                class.name
            )));
        }

        let leaf = self.key.depth() >= self.factory.config.max_nesting_depth;
        let chain = ancestor_chain(source, self.key, &class.name)?;
        let entity = merge_entity_config(&chain);
        let properties = merge_properties(&chain);
        debug!(key = %self.key, properties = properties.len(), leaf, "building entity model");

        // Extraction
        let extractor = AttributeMetadataExtractor::new(self.factory, self.key, leaf);
        let mut attributes: Vec<AttributeModel> = Vec::with_capacity(properties.len());
        let mut id_attribute: Option<AttributeModel> = None;
        let mut version_attribute: Option<AttributeModel> = None;

        for property in &properties {
            match extractor.extract(property)? {
                Extraction::Attribute(attribute) => attributes.push(*attribute),
                Extraction::Flattened(children) => attributes.extend(children),
                Extraction::Id(attribute) => {
                    if let Some(existing) = &id_attribute {
                        return Err(self.definition(format!(
                            "more than one id attribute: \"{}\" and \"{}\"",
                            existing.name, attribute.name
                        )));
                    }
                    id_attribute = Some(*attribute);
                }
                Extraction::Version(attribute) => {
                    if let Some(existing) = &version_attribute {
                        return Err(self.definition(format!(
                            "more than one version attribute: \"{}\" and \"{}\"",
                            existing.name, attribute.name
                        )));
                    }
                    version_attribute = Some(*attribute);
                }
                Extraction::Skipped => {}
            }
        }

        self.check_names(&attributes, id_attribute.as_ref(), version_attribute.as_ref())?;
        if id_attribute.is_none() && self.key.depth() == 0 {
            return Err(self.definition(format!(
                "class \"{}\" declares no id attribute",
                class.name
            )));
        }
        let mains: Vec<&str> = attributes
            .iter()
            .filter(|a| a.main)
            .map(|a| a.name.as_str())
            .collect();
        if mains.len() > 1 {
            return Err(self.definition(format!(
                "multiple main attributes: {}",
                mains.join(", ")
            )));
        }

        // Layout, computed on natural positions
        let names: Vec<String> = attributes.iter().map(|a| a.name.clone()).collect();
        let natural: Vec<&str> = names.iter().map(String::as_str).collect();
        let default_group = &self.factory.config.default_group;
        let layout = groups::resolve_layout(&natural, &entity.groups, &entity.attribute_order, default_group)
            .map_err(|e| self.layout_error(e))?;
        let grid = groups::apply_order(&natural, &entity.grid_order, "grid order")
            .map_err(|e| self.layout_error(e))?;
        let search = groups::apply_order(&natural, &entity.search_order, "search order")
            .map_err(|e| self.layout_error(e))?;

        let mut group_of: Vec<&str> = vec![default_group.as_str(); names.len()];
        for group in &layout.groups {
            for &idx in &group.members {
                group_of[idx] = group.key.as_str();
            }
        }
        let mut rank = vec![0; names.len()];
        for (position, &idx) in layout.order.iter().enumerate() {
            rank[idx] = position;
        }

        let mut slots: Vec<Option<AttributeModel>> = attributes.into_iter().map(Some).collect();
        let mut ordered: Vec<AttributeModel> = Vec::with_capacity(slots.len());
        for &idx in &layout.order {
            if let Some(mut attribute) = slots[idx].take() {
                attribute.order = ordered.len();
                attribute.group = group_of[idx].to_string();
                ordered.push(attribute);
            }
        }

        let groups: Vec<AttributeGroup> = layout
            .groups
            .iter()
            .map(|g| AttributeGroup {
                key: g.key.clone(),
                attributes: g.members.iter().map(|&idx| names[idx].clone()).collect(),
            })
            .collect();

        let index: HashMap<String, usize> = ordered
            .iter()
            .enumerate()
            .map(|(position, a)| (a.name.clone(), position))
            .collect();
        let main_attribute = ordered.iter().position(|a| a.main);

        // Technical attributes always sit in the default group, ahead of it.
        for technical in id_attribute.iter_mut().chain(version_attribute.iter_mut()) {
            technical.group = default_group.clone();
        }

        let sort_order = self.sort_order(&entity, &ordered, &index, id_attribute.as_ref(), version_attribute.as_ref())?;
        let display_property = match &entity.display_property {
            Some(name) => {
                let known = index.contains_key(name)
                    || id_attribute.as_ref().is_some_and(|a| &a.name == name);
                if !known {
                    return Err(self.definition(format!(
                        "display property \"{name}\" is not an attribute of \"{}\"",
                        class.name
                    )));
                }
                Some(name.clone())
            }
            None => main_attribute.map(|idx| ordered[idx].name.clone()),
        };

        let default_display_name = entity
            .display_name
            .clone()
            .unwrap_or_else(|| humanize(&class.name));
        let default_display_name_plural = entity
            .display_name_plural
            .clone()
            .unwrap_or_else(|| pluralize(&default_display_name));

        Ok(EntityModel {
            key: self.key.clone(),
            default_display_name,
            default_display_name_plural,
            default_description: entity.description.clone(),
            display_property,
            grid_order: grid.iter().map(|&idx| rank[idx]).collect(),
            search_order: search.iter().map(|&idx| rank[idx]).collect(),
            attributes: ordered,
            index,
            id_attribute,
            version_attribute,
            main_attribute,
            groups,
            only_default_group: layout.only_default_group,
            sort_order,
            leaf,
            texts: self.factory.texts.clone(),
        })
    }

    /// Attribute names must be unique across ordinary and technical slots.
    fn check_names(
        &self,
        attributes: &[AttributeModel],
        id: Option<&AttributeModel>,
        version: Option<&AttributeModel>,
    ) -> Result<(), ModelError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for attribute in attributes.iter().chain(id).chain(version) {
            if !seen.insert(attribute.name.as_str()) {
                return Err(self.definition(format!(
                    "duplicate attribute name \"{}\"",
                    attribute.name
                )));
            }
        }
        Ok(())
    }

    /// Parse declared sort entries. Each must name a local attribute, or
    /// a dotted path whose head is a local master/detail attribute.
    fn sort_order(
        &self,
        entity: &EntityConfig,
        attributes: &[AttributeModel],
        index: &HashMap<String, usize>,
        id: Option<&AttributeModel>,
        version: Option<&AttributeModel>,
    ) -> Result<Vec<SortOrder>, ModelError> {
        let is_local = |name: &str| {
            index.contains_key(name) || id.iter().chain(version.iter()).any(|a| a.name == name)
        };

        let mut sort_order = Vec::with_capacity(entity.sort_order.len());
        for raw in &entity.sort_order {
            let order = SortOrder::parse(raw)
                .ok_or_else(|| self.definition(format!("invalid sort declaration \"{raw}\"")))?;
            let through_reference = order.attribute.match_indices('.').any(|(idx, _)| {
                index
                    .get(&order.attribute[..idx])
                    .is_some_and(|&pos| attributes[pos].is_reference())
            });
            if !is_local(&order.attribute) && !through_reference {
                return Err(self.definition(format!(
                    "sort order names unknown attribute \"{}\"",
                    order.attribute
                )));
            }
            sort_order.push(order);
        }
        Ok(sort_order)
    }
}
