use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use entmeta_core::{AttributeSource, ClassKind, PropertyDescriptor, TypeRef};

use crate::build_factory;

/// (source class, target class, relation)
type Edge = (String, String, &'static str);

pub fn run_graph(input_path: &Path, format: &str) -> Result<String, String> {
    let factory = build_factory(input_path)?;
    let source = factory.source();

    let names: BTreeSet<String> = source
        .class_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut edges: Vec<Edge> = Vec::new();
    for name in &names {
        let Some(class) = source.describe_class(name) else {
            continue;
        };

        // Inheritance edges
        if let Some(parent) = &class.parent {
            if names.contains(parent) {
                edges.push((name.clone(), parent.clone(), "inherits"));
            }
        }

        for property in &class.properties {
            if let Some((target, relation)) = property_edge(source, property) {
                edges.push((name.clone(), target, relation));
            }
        }
    }

    // Deduplicate edges
    edges.sort();
    edges.dedup();

    match format {
        "dot" => Ok(render_dot(&names, &edges)),
        _ => Ok(render_mermaid(&names, &edges)),
    }
}

fn property_edge(source: &dyn AttributeSource, property: &PropertyDescriptor) -> Option<(String, &'static str)> {
    if property.config.ignore {
        return None;
    }

    let (target, collection) = match &property.declared_type {
        TypeRef::Named(name) => (name, false),
        TypeRef::Collection(member) => match member.as_ref() {
            TypeRef::Named(name) => (name, true),
            TypeRef::Collection(_) => return None,
        },
    };
    let class = source.describe_class(target)?;

    let relation = match (class.kind, collection) {
        (ClassKind::Enum, _) => "enum",
        (ClassKind::Embeddable, _) => "embeds",
        (ClassKind::Entity, false) if property.config.embedded => "embeds",
        (ClassKind::Entity, false) => "master",
        (ClassKind::Entity, true) => "detail",
    };
    Some((class.name.clone(), relation))
}

fn render_mermaid(names: &BTreeSet<String>, edges: &[Edge]) -> String {
    let mut lines = vec!["graph LR".to_string()];

    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    for (src, tgt, _) in edges {
        referenced.insert(src);
        referenced.insert(tgt);
    }

    // Add isolated nodes
    for name in names {
        if !referenced.contains(name.as_str()) {
            lines.push(format!("    {name}"));
        }
    }

    for (src, tgt, rel) in edges {
        lines.push(format!("    {src} -->|{rel}| {tgt}"));
    }

    lines.push(format!("%% {} nodes, {} edges", names.len(), edges.len()));
    lines.join("\n")
}

fn render_dot(names: &BTreeSet<String>, edges: &[Edge]) -> String {
    let mut lines = vec![
        "digraph entmeta {".to_string(),
        "    rankdir=LR;".to_string(),
        "    node [shape=box, style=filled, fillcolor=lightyellow];".to_string(),
    ];

    for name in names {
        lines.push(format!("    \"{name}\";"));
    }

    let edge_styles: HashMap<&str, &str> = HashMap::from([
        ("inherits", "style=dashed, color=blue"),
        ("master", "color=black"),
        ("detail", "color=red"),
        ("embeds", "style=dotted, color=gray40"),
        ("enum", "color=green"),
    ]);

    for (src, tgt, rel) in edges {
        let style = edge_styles.get(rel).unwrap_or(&"color=gray");
        lines.push(format!(
            "    \"{src}\" -> \"{tgt}\" [label=\"{rel}\", {style}];",
        ));
    }

    lines.push("}".to_string());
    lines.join("\n")
}
