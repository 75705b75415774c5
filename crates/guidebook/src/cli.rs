//! Output formatting for CLI commands

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use guidebook_core::{CacheStats, ContentRecord};
use guidebook_types::{ColorPalette, ContentType, Country, MenuItem, MenuItemKind};
use std::path::Path;

/// Format countries as table (human) or JSON
pub fn format_country_table(countries: &[Country], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(countries).unwrap_or_else(|_| "[]".to_string());
    }

    if countries.is_empty() {
        return "No countries found.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let headers = ["Slug", "Name", "Menu items", "Landing page", "Description"];
    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }

    for country in countries {
        let items = MenuItem::walk(&country.menu_items).len().to_string();
        let landing = country.landing_page.as_deref().unwrap_or("-");
        let description = country
            .description
            .as_deref()
            .map(|d| truncate(d, 40))
            .unwrap_or_default();

        table.add_row(Row::from(vec![
            country.slug.as_str(),
            country.name.as_str(),
            items.as_str(),
            landing,
            description.as_str(),
        ]));
    }

    table.to_string()
}

/// Format a single country with its menu tree (human or JSON)
pub fn format_country_info(country: &Country, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(country).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    lines.push(format!("Country:          {}", country.name));
    lines.push(format!("Slug:             {}", country.slug));
    lines.push(format!("ID:               {}", country.id));
    lines.push(format!(
        "Description:      {}",
        country.description.as_deref().unwrap_or("-")
    ));
    lines.push(format!(
        "Landing page:     {}",
        country.landing_page.as_deref().unwrap_or("-")
    ));
    lines.push(format!("Palette:          {}", format_palette(&country.palette)));

    let menu = country.sorted_menu();
    if menu.is_empty() {
        lines.push("Menu:             (empty)".to_string());
    } else {
        lines.push("Menu:".to_string());
        for (depth, item) in MenuItem::walk(&menu) {
            lines.push(format_menu_line(depth, item));
        }
    }

    lines.join("\n")
}

fn format_menu_line(depth: usize, item: &MenuItem) -> String {
    let kind = match item.kind {
        MenuItemKind::Region => "region",
        MenuItemKind::City => "city",
        MenuItemKind::Sight => "sight",
    };
    let format = match item.content_type {
        ContentType::Markdown => "md",
        ContentType::Pdf => "pdf",
    };
    format!(
        "  {}{} [{kind}] -> {} ({format})",
        "  ".repeat(depth),
        item.title,
        item.content_path
    )
}

pub fn format_palette(palette: &ColorPalette) -> String {
    palette
        .fields()
        .iter()
        .map(|(name, color)| format!("{name}={color}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line provenance note printed next to a loaded page
pub fn format_load_note(record: &ContentRecord, from_cache: bool) -> String {
    let source = if from_cache { "cache" } else { "network" };
    format!(
        "{}/{} (from {source}, version {}, modified {})",
        record.country_slug,
        record.content_path,
        display_version(&record.version_tag),
        record.last_modified.format("%Y-%m-%d %H:%M UTC"),
    )
}

pub fn format_cache_stats(stats: &CacheStats, path: &Path, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    lines.push(format!("Location:         {}", path.display()));
    lines.push(format!("Entries:          {}", stats.count));
    lines.push(format!("Countries:        {}", stats.country_count));
    lines.push(format!(
        "Approximate size: {}",
        format_size(stats.approximate_bytes as u64)
    ));
    lines.join("\n")
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.1}KB", bytes as f64 / 1_024.0)
    } else {
        format!("{}B", bytes)
    }
}

fn display_version(tag: &str) -> &str {
    if tag.is_empty() {
        "-"
    } else {
        tag.trim_matches('"')
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guidebook_types::NewCountry;

    fn item(slug: &str, order: i64, children: Option<Vec<MenuItem>>) -> MenuItem {
        MenuItem {
            id: slug.to_string(),
            kind: if children.is_some() {
                MenuItemKind::Region
            } else {
                MenuItemKind::City
            },
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            content_type: ContentType::Markdown,
            content_path: format!("{slug}.md"),
            order,
            children,
        }
    }

    fn italy() -> Country {
        let mut country = NewCountry::named("Italy").into_country("id-1".to_string());
        country.menu_items = vec![
            item("south", 1, Some(vec![item("naples", 0, None)])),
            item("lazio", 0, Some(vec![item("ostia", 1, None), item("rome", 0, None)])),
        ];
        country
    }

    #[test]
    fn test_country_info_renders_sorted_tree() {
        let info = format_country_info(&italy(), false);
        let menu: Vec<&str> = info
            .lines()
            .skip_while(|l| *l != "Menu:")
            .skip(1)
            .collect();

        assert_eq!(
            menu,
            vec![
                "  LAZIO [region] -> lazio.md (md)",
                "    ROME [city] -> rome.md (md)",
                "    OSTIA [city] -> ostia.md (md)",
                "  SOUTH [region] -> south.md (md)",
                "    NAPLES [city] -> naples.md (md)",
            ]
        );
        assert!(info.contains("primary=#3b82f6"));
    }

    #[test]
    fn test_country_table() {
        assert_eq!(format_country_table(&[], false, true), "No countries found.");

        let table = format_country_table(&[italy()], false, true);
        assert!(table.contains("italy"));
        assert!(table.contains("Italy"));
        assert!(table.contains('5'));

        let json = format_country_table(&[italy()], true, true);
        let parsed: Vec<Country> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].slug, "italy");
    }

    #[test]
    fn test_load_note() {
        let record = ContentRecord {
            country_slug: "italy".to_string(),
            content_path: "rome.md".to_string(),
            body: String::new(),
            version_tag: "\"abc\"".to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            cached_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 31, 0).unwrap(),
        };
        assert_eq!(
            format_load_note(&record, true),
            "italy/rome.md (from cache, version abc, modified 2024-05-01 09:30 UTC)"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2_048), "2.0KB");
        assert_eq!(format_size(3_145_728), "3.0MB");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("Città eterna", 40), "Città eterna");
        assert_eq!(truncate("Città eterna", 6), "Città…");
    }
}
