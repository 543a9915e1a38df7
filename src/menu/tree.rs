use std::collections::HashMap;

use super::types::{MenuAccess, MenuItem, MenuNode};

/// Nests entries by `parent_id`, orders siblings by `sort_order` then id, and
/// drops entries that have neither a path nor any remaining children.
///
/// Entries whose parent is not part of `entries` are unreachable and dropped.
pub fn build_menu_tree(entries: Vec<(MenuItem, MenuAccess)>) -> Vec<MenuNode> {
    let mut by_parent: HashMap<Option<i32>, Vec<MenuNode>> = HashMap::new();
    for (item, access) in entries {
        by_parent
            .entry(item.parent_id)
            .or_default()
            .push(MenuNode::new(item, access));
    }
    attach_children(None, &mut by_parent)
}

fn attach_children(
    parent: Option<i32>,
    by_parent: &mut HashMap<Option<i32>, Vec<MenuNode>>,
) -> Vec<MenuNode> {
    let Some(mut level) = by_parent.remove(&parent) else {
        return Vec::new();
    };

    for node in &mut level {
        node.children = attach_children(Some(node.id), by_parent);
    }

    level.retain(|node| node.has_path() || !node.children.is_empty());
    level.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
    level
}

/// Normalizes a request path: drops query and fragment, collapses a trailing slash.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn governs(item_path: &str, path: &str) -> bool {
    if item_path == "/" {
        return path == "/";
    }
    path == item_path
        || path
            .strip_prefix(item_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// The menu item with the longest path that equals `path` or is a `/`-delimited prefix of it.
pub fn governing_item<'a>(items: &'a [MenuItem], path: &str) -> Option<&'a MenuItem> {
    let path = normalize_path(path);
    items
        .iter()
        .filter_map(|item| {
            let item_path = item.path.as_deref().map(normalize_path)?;
            governs(&item_path, &path).then_some((item_path.len(), item))
        })
        .max_by(|(len_a, a), (len_b, b)| len_a.cmp(len_b).then(b.id.cmp(&a.id)))
        .map(|(_, item)| item)
}
