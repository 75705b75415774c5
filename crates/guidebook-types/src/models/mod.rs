//! Data models for countries, menus, palettes and content

pub mod content;
pub mod country;
pub mod menu;
pub mod palette;

pub use content::ContentData;
pub use country::{slugify, Country, CountryPatch, NewCountry};
pub use menu::{ContentType, MenuItem, MenuItemKind};
pub use palette::ColorPalette;
