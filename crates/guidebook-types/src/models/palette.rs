//! Country color palettes

use serde::{Deserialize, Serialize};

/// Five-color theme applied to a country's pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
}

impl Default for ColorPalette {
    /// The fixed palette substituted whenever a country has none
    fn default() -> Self {
        Self {
            primary: "#3b82f6".to_string(),
            secondary: "#1e40af".to_string(),
            accent: "#f59e0b".to_string(),
            background: "#1f2937".to_string(),
            text: "#f3f4f6".to_string(),
        }
    }
}

impl ColorPalette {
    /// Iterate over `(field, color)` pairs in display order
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("primary", self.primary.as_str()),
            ("secondary", self.secondary.as_str()),
            ("accent", self.accent.as_str()),
            ("background", self.background.as_str()),
            ("text", self.text.as_str()),
        ]
    }

    /// Returns the names of fields that are not `#rgb` / `#rrggbb` hex colors
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, color)| !is_hex_color(color))
            .map(|(name, _)| name)
            .collect()
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
