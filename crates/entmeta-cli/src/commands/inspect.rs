use std::path::Path;

use entmeta_core::{snapshot_to_json, AttributeModel, EntityModel, SortDirection};

use crate::build_factory;

pub fn run_inspect(
    input_path: &Path,
    class: &str,
    reference: Option<&str>,
    locale: Option<&str>,
    format: &str,
) -> Result<String, String> {
    let factory = build_factory(input_path)?;
    let reference = reference.unwrap_or(class);
    let model = factory
        .get_model_variant(reference, class)
        .map_err(|e| e.to_string())?;

    if format == "json" {
        return snapshot_to_json(&model, locale)
            .map_err(|e| format!("JSON serialization error: {e}"));
    }

    Ok(render_human(&model, locale))
}

fn render_human(model: &EntityModel, locale: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "{} ({}): {} / {}",
        model.reference(),
        model.entity_class(),
        model.display_name(locale),
        model.display_name_plural(locale)
    ));
    if let Some(description) = model.description(locale) {
        lines.push(format!("  {description}"));
    }
    if let Some(id) = model.id_attribute() {
        lines.push(format!("  id: {} ({})", id.name, id.value_type));
    }
    if let Some(version) = model.version_attribute() {
        lines.push(format!("  version: {} ({})", version.name, version.value_type));
    }
    if let Some(display) = model.display_property() {
        lines.push(format!("  display property: {display}"));
    }
    if !model.sort_order().is_empty() {
        let sort: Vec<String> = model
            .sort_order()
            .iter()
            .map(|s| match s.direction {
                SortDirection::Ascending => format!("{} asc", s.attribute),
                SortDirection::Descending => format!("{} desc", s.attribute),
            })
            .collect();
        lines.push(format!("  sort: {}", sort.join(", ")));
    }
    if model.is_leaf() {
        lines.push("  leaf model (nesting limit reached)".to_string());
    }

    for group in model.groups() {
        lines.push(String::new());
        lines.push(format!("[{}]", group.key));
        for attribute in model.attributes_in_group(&group.key) {
            lines.push(render_attribute(attribute, locale));
        }
    }

    let attribute_count = model.attributes().len();
    let group_count = model.groups().len();
    let attribute_word = if attribute_count == 1 { "attribute" } else { "attributes" };
    let group_word = if group_count == 1 { "group" } else { "groups" };
    lines.push(String::new());
    lines.push(format!(
        "{attribute_count} {attribute_word} in {group_count} {group_word}."
    ));

    lines.join("\n")
}

fn render_attribute(attribute: &AttributeModel, locale: Option<&str>) -> String {
    let mut flags: Vec<String> = Vec::new();
    if attribute.main {
        flags.push("main".into());
    }
    if attribute.required {
        flags.push("required".into());
    }
    if attribute.searchable {
        flags.push("searchable".into());
    }
    if attribute.read_only {
        flags.push("read-only".into());
    }
    if !attribute.visible {
        flags.push("hidden".into());
    }
    if let Some(nested) = attribute.nested_entity_model() {
        flags.push(format!("-> {}", nested.reference()));
    }

    format!(
        "  {:<24} {:<18} {:<16} \"{}\"{}",
        attribute.name,
        attribute.kind.to_string(),
        attribute.value_type.to_string(),
        attribute.display_name(locale),
        if flags.is_empty() {
            String::new()
        } else {
            format!("  {}", flags.join(" "))
        }
    )
}
