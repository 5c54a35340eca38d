//! Category hierarchy reconstruction from flat coded categories.
//!
//! Every two digits of a category code add one level: `10` is a root,
//! `1001` its child, `100101` a grandchild. A code whose parent code is
//! not among the input is kept as an orphan root.

use crate::constants::CATEGORY_LEVEL_WIDTH;
use crate::models::{Category, CategoryNode};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Parent code of `code`, or `None` for root-level and malformed codes
pub fn parent_code(code: &str) -> Option<&str> {
    let parent_len = code.len().checked_sub(CATEGORY_LEVEL_WIDTH)?;
    if parent_len == 0 {
        return None;
    }
    code.get(..parent_len)
}

/// Build the category forest.
///
/// Roots and children keep input order. A code that occurs more than once
/// is placed once, at its first position, with the name of its last
/// occurrence. Appending once per row would list such a code repeatedly;
/// that is deliberately not done here.
pub fn build_category_tree(categories: &[Category]) -> Vec<CategoryNode> {
    let mut order: Vec<&str> = Vec::with_capacity(categories.len());
    let mut names: HashMap<&str, &str> = HashMap::with_capacity(categories.len());

    for category in categories {
        let code = category.id.as_str();
        if names.insert(code, category.name.as_str()).is_some() {
            warn!(
                "Duplicate category code {}, keeping name '{}'",
                code, category.name
            );
        } else {
            order.push(code);
        }
    }

    let mut roots: Vec<&str> = Vec::new();
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

    for &code in &order {
        if code.len() == CATEGORY_LEVEL_WIDTH {
            roots.push(code);
            continue;
        }
        match parent_code(code) {
            Some(parent) if names.contains_key(parent) => {
                children.entry(parent).or_default().push(code);
            }
            _ => {
                warn!("Parent not found for category {}, adding as root", code);
                roots.push(code);
            }
        }
    }

    let tree: Vec<CategoryNode> = roots
        .into_iter()
        .map(|code| materialize(code, &names, &children))
        .collect();
    debug!(
        "Built category tree: {} roots from {} categories",
        tree.len(),
        order.len()
    );
    tree
}

fn materialize(
    code: &str,
    names: &HashMap<&str, &str>,
    children: &HashMap<&str, Vec<&str>>,
) -> CategoryNode {
    let mut node = CategoryNode::new(code, names.get(code).copied().unwrap_or_default());
    if let Some(kids) = children.get(code) {
        node.children = kids
            .iter()
            .map(|child| materialize(child, names, children))
            .collect();
    }
    node
}
