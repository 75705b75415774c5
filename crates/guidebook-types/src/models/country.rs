//! Country documents as stored in the backend index

use super::{ColorPalette, MenuItem};
use serde::{Deserialize, Serialize};

/// A travel guide for one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: String,
    pub name: String,

    /// Unique, URL-safe identifier
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Content path shown when the country page opens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,

    #[serde(default)]
    pub palette: ColorPalette,

    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
}

impl Country {
    /// Menu items sorted for display
    pub fn sorted_menu(&self) -> Vec<MenuItem> {
        let mut items = self.menu_items.clone();
        MenuItem::sort_tree(&mut items);
        items
    }
}

/// Payload for creating a country (the backend assigns the id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCountry {
    pub name: String,
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,

    #[serde(default)]
    pub palette: ColorPalette,

    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
}

impl NewCountry {
    /// Country with a slug derived from its name and the default palette
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            description: None,
            image_url: None,
            landing_page: None,
            palette: ColorPalette::default(),
            menu_items: Vec::new(),
        }
    }

    pub fn into_country(self, id: String) -> Country {
        Country {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            image_url: self.image_url,
            landing_page: self.landing_page,
            palette: self.palette,
            menu_items: self.menu_items,
        }
    }
}

/// Partial update, shallow-merged over an existing country
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<ColorPalette>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_items: Option<Vec<MenuItem>>,
}

impl CountryPatch {
    pub fn menu(items: Vec<MenuItem>) -> Self {
        Self {
            menu_items: Some(items),
            ..Default::default()
        }
    }

    pub fn palette(palette: ColorPalette) -> Self {
        Self {
            palette: Some(palette),
            ..Default::default()
        }
    }

    /// Overwrite every field present in the patch; `id` is never touched
    pub fn apply_to(self, country: &mut Country) {
        if let Some(name) = self.name {
            country.name = name;
        }
        if let Some(slug) = self.slug {
            country.slug = slug;
        }
        if let Some(description) = self.description {
            country.description = Some(description);
        }
        if let Some(image_url) = self.image_url {
            country.image_url = Some(image_url);
        }
        if let Some(landing_page) = self.landing_page {
            country.landing_page = Some(landing_page);
        }
        if let Some(palette) = self.palette {
            country.palette = palette;
        }
        if let Some(menu_items) = self.menu_items {
            country.menu_items = menu_items;
        }
    }
}

/// Derive a URL slug from a display name
///
/// Lowercases ASCII alphanumerics and collapses every other run of
/// characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
