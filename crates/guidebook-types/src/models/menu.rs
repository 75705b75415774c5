//! Menu tree of regions, cities and sights

use serde::{Deserialize, Serialize};

/// Kind of menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuItemKind {
    Region,
    City,
    Sight,
}

/// Format of the content a menu item points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Markdown,
    Pdf,
}

/// A node of a country's navigation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: MenuItemKind,

    pub title: String,
    pub slug: String,

    #[serde(default)]
    pub content_type: ContentType,

    /// Path of the content blob, relative to the country
    pub content_path: String,

    /// Sibling display order (ties keep insertion order)
    #[serde(default)]
    pub order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MenuItem>>,
}

impl MenuItem {
    pub fn children(&self) -> &[MenuItem] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Stable sort of siblings by `order`, recursively
    pub fn sort_tree(items: &mut [MenuItem]) {
        items.sort_by_key(|item| item.order);
        for item in items.iter_mut() {
            if let Some(children) = item.children.as_mut() {
                Self::sort_tree(children);
            }
        }
    }

    /// Rewrite `order` to match current positions, recursively
    pub fn renumber(items: &mut [MenuItem]) {
        for (index, item) in items.iter_mut().enumerate() {
            item.order = index as i64;
            if let Some(children) = item.children.as_mut() {
                Self::renumber(children);
            }
        }
    }

    /// Depth-first search for an item by slug
    pub fn find_by_slug<'a>(items: &'a [MenuItem], slug: &str) -> Option<&'a MenuItem> {
        for item in items {
            if item.slug == slug {
                return Some(item);
            }
            if let Some(found) = Self::find_by_slug(item.children(), slug) {
                return Some(found);
            }
        }
        None
    }

    /// Pre-order walk of the tree as `(depth, item)` pairs
    pub fn walk(items: &[MenuItem]) -> Vec<(usize, &MenuItem)> {
        fn visit<'a>(items: &'a [MenuItem], depth: usize, out: &mut Vec<(usize, &'a MenuItem)>) {
            for item in items {
                out.push((depth, item));
                visit(item.children(), depth + 1, out);
            }
        }

        let mut out = Vec::new();
        visit(items, 0, &mut out);
        out
    }
}
