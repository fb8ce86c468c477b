//! Serializable views of built models, for REST payloads and tooling.
//!
//! Snapshots are plain data: nested models are referenced by key rather
//! than inlined, so cyclic model graphs serialize without recursion.

use serde::Serialize;

use crate::catalogs::{ENGINE_VERSION, SNAPSHOT_VERSION};
use crate::factory::ModelFactory;
use crate::types::{
    AttributeGroup, AttributeKind, AttributeModel, BooleanMode, EntityModel, SelectMode, SortOrder,
};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedSnapshot {
    pub reference: String,
    pub entity_class: String,
    /// Published successfully at snapshot time.
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSnapshot {
    pub name: String,
    pub kind: AttributeKind,
    pub value_type: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub group: String,
    pub order: usize,
    pub visible: bool,
    pub visible_in_grid: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub editable: bool,
    pub read_only: bool,
    pub required: bool,
    pub main: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_mode: Option<SelectMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_select_mode: Option<SelectMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    pub use_thousands_grouping: bool,
    pub percentage: bool,
    pub currency: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_mode: Option<BooleanMode>,
    pub search_case_sensitive: bool,
    pub search_prefix_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub snapshot_version: &'static str,
    pub engine_version: &'static str,
    pub reference: String,
    pub entity_class: String,
    pub depth: usize,
    pub leaf: bool,
    pub display_name: String,
    pub display_name_plural: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_attribute: Option<AttributeSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_attribute: Option<AttributeSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_attribute: Option<String>,
    pub attributes: Vec<AttributeSnapshot>,
    pub groups: Vec<AttributeGroup>,
    pub only_default_group: bool,
    pub sort_order: Vec<SortOrder>,
    pub grid_columns: Vec<String>,
    pub search_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportResult<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn attribute_snapshot(attribute: &AttributeModel, locale: Option<&str>) -> AttributeSnapshot {
    AttributeSnapshot {
        name: attribute.name.clone(),
        kind: attribute.kind,
        value_type: attribute.value_type.to_string(),
        display_name: attribute.display_name(locale),
        description: attribute.description(locale),
        prompt: attribute.prompt(locale),
        group: attribute.group.clone(),
        order: attribute.order,
        visible: attribute.visible,
        visible_in_grid: attribute.visible_in_grid,
        searchable: attribute.searchable,
        sortable: attribute.sortable,
        editable: attribute.editable,
        read_only: attribute.read_only,
        required: attribute.required,
        main: attribute.main,
        select_mode: attribute.select_mode,
        search_select_mode: attribute.search_select_mode,
        display_format: attribute.display_format.clone(),
        precision: attribute.precision,
        use_thousands_grouping: attribute.use_thousands_grouping,
        percentage: attribute.percentage,
        currency: attribute.currency,
        default_value: attribute.default_value.clone(),
        boolean_mode: attribute.boolean_mode,
        search_case_sensitive: attribute.search_case_sensitive,
        search_prefix_only: attribute.search_prefix_only,
        allowed_extensions: attribute.allowed_extensions.clone(),
        nested: attribute.nested_entity_model().map(|nested| NestedSnapshot {
            reference: nested.reference().to_string(),
            entity_class: nested.entity_class().to_string(),
            ready: nested.is_ready(),
        }),
    }
}

/// Snapshot of `model` with texts resolved for `locale` (`None` for the
/// default locale). Never blocks on nested builds.
pub fn snapshot(model: &EntityModel, locale: Option<&str>) -> EntitySnapshot {
    let names = |attributes: Vec<&AttributeModel>| -> Vec<String> {
        attributes.into_iter().map(|a| a.name.clone()).collect()
    };

    EntitySnapshot {
        snapshot_version: SNAPSHOT_VERSION,
        engine_version: ENGINE_VERSION,
        reference: model.reference().to_string(),
        entity_class: model.entity_class().to_string(),
        depth: model.depth(),
        leaf: model.is_leaf(),
        display_name: model.display_name(locale),
        display_name_plural: model.display_name_plural(locale),
        description: model.description(locale),
        display_property: model.display_property().map(str::to_string),
        id_attribute: model.id_attribute().map(|a| attribute_snapshot(a, locale)),
        version_attribute: model.version_attribute().map(|a| attribute_snapshot(a, locale)),
        main_attribute: model.main_attribute().map(|a| a.name.clone()),
        attributes: model
            .attributes()
            .iter()
            .map(|a| attribute_snapshot(a, locale))
            .collect(),
        groups: model.groups().to_vec(),
        only_default_group: model.only_default_group(),
        sort_order: model.sort_order().to_vec(),
        grid_columns: names(model.grid_attributes()),
        search_fields: names(model.search_attributes()),
    }
}

pub fn snapshot_to_json(model: &EntityModel, locale: Option<&str>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&snapshot(model, locale))
}

fn failure_json(message: String) -> String {
    serde_json::json!({ "success": false, "error": message }).to_string()
}

/// Build (or fetch) a model and return it as an `ExportResult` JSON string.
/// Build failures are reported in the `error` field.
pub fn model_to_json(
    factory: &ModelFactory,
    reference: &str,
    class: &str,
    locale: Option<&str>,
) -> String {
    let model = match factory.get_model_variant(reference, class) {
        Ok(model) => model,
        Err(err) => return failure_json(err.to_string()),
    };

    let result = ExportResult {
        success: true,
        data: Some(snapshot(&model, locale)),
        error: None,
    };
    serde_json::to_string(&result)
        .unwrap_or_else(|e| failure_json(format!("JSON serialization error: {e}")))
}
