//! Group membership and explicit attribute ordering.
//!
//! Works on attribute names in their natural (enumeration) order and returns
//! indices into that list, so the builder can permute its attributes once.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::source::GroupDecl;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{list} names unknown attribute \"{name}\"")]
    UnknownAttribute { list: String, name: String },

    #[error("{list} names attribute \"{name}\" more than once")]
    DuplicateInOrder { list: String, name: String },

    #[error("group \"{group}\" names unknown attribute \"{name}\"")]
    UnknownGroupMember { group: String, name: String },

    #[error("attribute \"{name}\" is assigned to both group \"{first}\" and group \"{second}\"")]
    MultipleGroups {
        name: String,
        first: String,
        second: String,
    },

    #[error("group \"{0}\" is declared more than once")]
    DuplicateGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub key: String,
    /// Indices into the natural order, listed in final attribute order.
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Final attribute order as indices into the natural order.
    pub order: Vec<usize>,
    pub groups: Vec<ResolvedGroup>,
    /// Only the synthesized default group is in use.
    pub only_default_group: bool,
}

/// Explicitly listed names first, in the listed order; everything else
/// keeps its natural position relative to the rest.
pub fn apply_order(natural: &[&str], explicit: &[String], list: &str) -> Result<Vec<usize>, LayoutError> {
    let positions: HashMap<&str, usize> = natural.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut order = Vec::with_capacity(natural.len());

    for name in explicit {
        let idx = *positions
            .get(name.as_str())
            .ok_or_else(|| LayoutError::UnknownAttribute {
                list: list.to_string(),
                name: name.clone(),
            })?;
        if !seen.insert(idx) {
            return Err(LayoutError::DuplicateInOrder {
                list: list.to_string(),
                name: name.clone(),
            });
        }
        order.push(idx);
    }

    order.extend((0..natural.len()).filter(|idx| !seen.contains(idx)));
    Ok(order)
}

/// Resolve the final attribute order and the ordered group mapping.
///
/// Declared groups keep their declaration order; unassigned attributes land
/// in `default_group`, which is appended last (or merged into a declared
/// group of the same key).
pub fn resolve_layout(
    natural: &[&str],
    groups: &[GroupDecl],
    attribute_order: &[String],
    default_group: &str,
) -> Result<Layout, LayoutError> {
    let order = apply_order(natural, attribute_order, "attribute order")?;

    let mut rank = vec![0; natural.len()];
    for (position, &idx) in order.iter().enumerate() {
        rank[idx] = position;
    }

    if groups.is_empty() {
        return Ok(Layout {
            groups: vec![ResolvedGroup {
                key: default_group.to_string(),
                members: order.clone(),
            }],
            order,
            only_default_group: true,
        });
    }

    let positions: HashMap<&str, usize> = natural.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut assigned: HashMap<usize, &str> = HashMap::new();
    let mut declared_keys: HashSet<&str> = HashSet::new();
    let mut resolved: Vec<ResolvedGroup> = Vec::with_capacity(groups.len() + 1);

    for decl in groups {
        if !declared_keys.insert(decl.key.as_str()) {
            return Err(LayoutError::DuplicateGroup(decl.key.clone()));
        }

        let mut members = Vec::with_capacity(decl.attributes.len());
        for name in &decl.attributes {
            let idx = *positions
                .get(name.as_str())
                .ok_or_else(|| LayoutError::UnknownGroupMember {
                    group: decl.key.clone(),
                    name: name.clone(),
                })?;
            if let Some(first) = assigned.insert(idx, decl.key.as_str()) {
                return Err(LayoutError::MultipleGroups {
                    name: name.clone(),
                    first: first.to_string(),
                    second: decl.key.clone(),
                });
            }
            members.push(idx);
        }
        members.sort_by_key(|&idx| rank[idx]);
        resolved.push(ResolvedGroup {
            key: decl.key.clone(),
            members,
        });
    }

    let unassigned: Vec<usize> = order
        .iter()
        .copied()
        .filter(|idx| !assigned.contains_key(idx))
        .collect();

    if !unassigned.is_empty() {
        match resolved.iter_mut().find(|g| g.key == default_group) {
            Some(group) => {
                group.members.extend(unassigned);
                group.members.sort_by_key(|&idx| rank[idx]);
            }
            None => resolved.push(ResolvedGroup {
                key: default_group.to_string(),
                members: unassigned,
            }),
        }
    }

    let only_default_group = resolved.iter().all(|g| g.key == default_group);

    Ok(Layout {
        order,
        groups: resolved,
        only_default_group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_order_wins() {
        let order = apply_order(&["a", "b", "c"], &names(&["b", "a", "c"]), "order").unwrap();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn unlisted_names_keep_natural_order() {
        let order = apply_order(&["a", "b", "c", "d"], &names(&["c"]), "order").unwrap();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn unknown_and_duplicate_names_are_rejected() {
        let err = apply_order(&["a"], &names(&["z"]), "grid order").unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownAttribute {
                list: "grid order".into(),
                name: "z".into()
            }
        );
        let err = apply_order(&["a", "b"], &names(&["a", "a"]), "order").unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateInOrder { .. }));
    }

    #[test]
    fn no_groups_means_default_only() {
        let layout = resolve_layout(&["a", "b"], &[], &[], "default").unwrap();
        assert!(layout.only_default_group);
        assert_eq!(layout.groups.len(), 1);
        assert_eq!(layout.groups[0].members, vec![0, 1]);
    }

    #[test]
    fn declared_groups_then_default() {
        let groups = vec![
            GroupDecl::new("contact", &["email", "phone"]),
            GroupDecl::new("general", &["name"]),
        ];
        let natural = ["name", "phone", "email", "notes"];
        let layout = resolve_layout(&natural, &groups, &names(&["email"]), "default").unwrap();

        assert!(!layout.only_default_group);
        assert_eq!(layout.order, vec![2, 0, 1, 3]);
        let keys: Vec<&str> = layout.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["contact", "general", "default"]);
        // members follow final attribute order: email was moved first
        assert_eq!(layout.groups[0].members, vec![2, 1]);
        assert_eq!(layout.groups[2].members, vec![3]);
    }

    #[test]
    fn declared_default_group_absorbs_unassigned() {
        let groups = vec![GroupDecl::new("default", &["b"]), GroupDecl::new("x", &["c"])];
        let layout = resolve_layout(&["a", "b", "c"], &groups, &[], "default").unwrap();
        assert_eq!(layout.groups.len(), 2);
        assert_eq!(layout.groups[0].members, vec![0, 1]);
    }

    #[test]
    fn conflicting_group_declarations() {
        let twice = vec![GroupDecl::new("g1", &["a"]), GroupDecl::new("g2", &["a"])];
        assert!(matches!(
            resolve_layout(&["a"], &twice, &[], "default"),
            Err(LayoutError::MultipleGroups { .. })
        ));

        let dup = vec![GroupDecl::new("g", &["a"]), GroupDecl::new("g", &[])];
        assert_eq!(
            resolve_layout(&["a"], &dup, &[], "default"),
            Err(LayoutError::DuplicateGroup("g".into()))
        );

        let unknown = vec![GroupDecl::new("g", &["zzz"])];
        assert!(matches!(
            resolve_layout(&["a"], &unknown, &[], "default"),
            Err(LayoutError::UnknownGroupMember { .. })
        ));
    }
}
