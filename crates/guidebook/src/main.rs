//! guidebook - Travel guide CMS client and backend

mod cli;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use guidebook_core::{ApiClient, ClientConfig, ContentCache, ContentError, ContentLoader, LoadSource};
use guidebook_server::ServerConfig;
use guidebook_types::{ColorPalette, CountryPatch, MenuItem, NewCountry};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "guidebook",
    version,
    about = "Travel guide CMS client and backend",
    long_about = "Browse and edit travel guides served by a guidebook backend.\n\
                  \n\
                  Content is cached locally and served stale-while-revalidate: a cached\n\
                  page prints immediately while a background check fetches newer revisions.\n\
                  \n\
                  Examples:\n\
                    guidebook serve --port 8080                 # Run the backend\n\
                    guidebook countries                         # List countries\n\
                    guidebook country italy                     # Country details and menu\n\
                    guidebook show italy lazio/rome.md --wait   # Print a page\n\
                    guidebook cache stats                       # Local cache usage\n\
                    guidebook admin create-country \"New Zealand\"\n\
                    guidebook admin set-menu italy -f menu.json\n\
                  \n\
                  Environment Variables:\n\
                    GUIDEBOOK_API_URL                # Backend base URL\n\
                    GUIDEBOOK_CACHE_DIR              # Local content cache directory\n\
                    GUIDEBOOK_CONFIG                 # Path to guidebook.toml\n\
                    GUIDEBOOK_ADMIN_PASSWORD         # Password for admin commands\n\
                    RUST_LOG                         # Log filter (e.g. guidebook_core=debug)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL
    #[arg(long, global = true, env = "GUIDEBOOK_API_URL")]
    api_url: Option<String>,

    /// Local content cache directory
    #[arg(long, global = true, env = "GUIDEBOOK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/guidebook/guidebook.toml)
    #[arg(long, global = true, env = "GUIDEBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Bypass the local content cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, global = true, env = "GUIDEBOOK_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the backend HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, env = "GUIDEBOOK_PORT")]
        port: Option<u16>,
        /// Directory holding the blob store
        #[arg(long, env = "GUIDEBOOK_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
    /// List countries
    Countries {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a country and its menu
    Country {
        slug: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a content page
    Show {
        country: String,
        path: String,
        /// Wait for the background check and print a newer revision if one exists
        #[arg(long)]
        wait: bool,
    },
    /// Manage the local content cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Privileged operations against the backend
    Admin(AdminArgs),
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show cache usage
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every cached page
    Clear,
    /// Remove cached pages of a country (or a single page)
    Invalidate { country: String, path: Option<String> },
}

#[derive(Args)]
struct AdminArgs {
    /// Admin password
    #[arg(long, env = "GUIDEBOOK_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: AdminCommand,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Create a country (slug derived from the name unless given)
    CreateCountry {
        name: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Edit country details (only the given fields change)
    UpdateCountry {
        slug: String,
        #[arg(long)]
        name: Option<String>,
        /// Rename the country's slug
        #[arg(long)]
        new_slug: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        /// Content path shown on the country's landing page
        #[arg(long)]
        landing_page: Option<String>,
    },
    /// Replace the menu tree from a JSON array (file, or stdin when omitted or `-`)
    ///
    /// Sibling `order` values are rewritten from the array positions.
    SetMenu {
        slug: String,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Delete a country and all of its content
    DeleteCountry { slug: String },
    /// Save markdown content (from a file, or stdin when omitted or `-`)
    SaveContent {
        country: String,
        path: String,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Delete a content page
    DeleteContent { country: String, path: String },
    /// Upload a PDF (`.pdf` is appended to the path when missing)
    UploadPdf {
        country: String,
        path: String,
        file: PathBuf,
    },
    /// Change palette colors of a country
    SetPalette {
        slug: String,
        #[arg(long)]
        primary: Option<String>,
        #[arg(long)]
        secondary: Option<String>,
        #[arg(long)]
        accent: Option<String>,
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        text: Option<String>,
        /// Start from the default palette instead of the current one
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::Serve { .. }), cli.no_color);

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    if let Some(dir) = cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    config.validate()?;

    let no_color = cli.no_color;
    let use_cache = !cli.no_cache;

    match cli.command {
        Command::Serve { port, data_dir } => run_serve(port, data_dir).await?,
        Command::Countries { json } => run_countries(&config, json, no_color).await?,
        Command::Country { slug, json } => run_country(&config, &slug, json).await?,
        Command::Show {
            country,
            path,
            wait,
        } => run_show(&config, use_cache, &country, &path, wait).await?,
        Command::Cache { command } => run_cache(&config, command)?,
        Command::Admin(args) => run_admin(&config, use_cache, args).await?,
    }

    Ok(())
}

/// Logs go to stderr; `serve` defaults to `info`, other commands to `warn`
fn init_tracing(serving: bool, no_color: bool) {
    let default = if serving { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

async fn run_serve(port: Option<u16>, data_dir: Option<PathBuf>) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(dir) = data_dir {
        config = config.with_data_dir(dir);
    }
    guidebook_server::run(config).await
}

async fn run_countries(config: &ClientConfig, json: bool, no_color: bool) -> Result<()> {
    let api = ApiClient::new(config)?;
    let countries = api.countries().await.context("Failed to list countries")?;
    println!("{}", cli::format_country_table(&countries, json, no_color));
    Ok(())
}

async fn run_country(config: &ClientConfig, slug: &str, json: bool) -> Result<()> {
    let api = ApiClient::new(config)?;
    let country = api.country(slug).await?;
    println!("{}", cli::format_country_info(&country, json));
    Ok(())
}

async fn run_show(
    config: &ClientConfig,
    use_cache: bool,
    country: &str,
    path: &str,
    wait: bool,
) -> Result<()> {
    let api = Arc::new(ApiClient::new(config)?);
    let cache = if use_cache { open_cache(config) } else { None };
    let loader = ContentLoader::new(cache, api);

    let load = loader
        .load_content(country, path)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    eprintln!(
        "{}",
        cli::format_load_note(&load.record, load.source == LoadSource::Cache)
    );
    println!("{}", load.record.body);

    let Some(revalidation) = load.revalidation else {
        return Ok(());
    };

    // Let the background check land in the cache before the runtime exits
    let updated = tokio::time::timeout(config.request_timeout, revalidation.updated())
        .await
        .unwrap_or_default();

    if wait {
        match updated {
            Some(record) => {
                eprintln!("Newer revision available:");
                eprintln!("{}", cli::format_load_note(&record, false));
                println!("{}", record.body);
            }
            None => eprintln!("Cached page is current."),
        }
    }

    Ok(())
}

fn run_cache(config: &ClientConfig, command: CacheCommand) -> Result<()> {
    let cache = ContentCache::open(&config.cache_dir, config.cache_config())
        .context("Failed to open content cache")?;

    match command {
        CacheCommand::Stats { json } => {
            let stats = cache.stats()?;
            println!("{}", cli::format_cache_stats(&stats, cache.path(), json));
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            cache.vacuum()?;
            println!("Cache cleared ({removed} entries removed)");
            println!("   Location: {}", cache.path().display());
        }
        CacheCommand::Invalidate { country, path } => {
            let removed = cache.invalidate(&country, path.as_deref())?;
            println!("Invalidated {removed} cached entries");
        }
    }

    Ok(())
}

async fn run_admin(config: &ClientConfig, use_cache: bool, args: AdminArgs) -> Result<()> {
    let api = ApiClient::new(config)?;
    let session = api.login(&args.password).await.map_err(|e| match e {
        ContentError::InvalidCredentials => anyhow::anyhow!("Invalid admin password"),
        other => other.into(),
    })?;

    let cache = if use_cache { open_cache(config) } else { None };
    let invalidate = |country: &str, path: Option<&str>| {
        if let Some(cache) = &cache {
            if let Err(e) = cache.invalidate(country, path) {
                warn!(country, error = %e, "Failed to invalidate local cache");
            }
        }
    };

    match args.command {
        AdminCommand::CreateCountry {
            name,
            slug,
            description,
        } => {
            let mut new = NewCountry::named(name);
            if let Some(slug) = slug {
                new.slug = slug;
            }
            new.description = description;

            let country = api.create_country(&session, &new).await?;
            println!("Created country {} ({})", country.name, country.slug);
        }
        AdminCommand::UpdateCountry {
            slug,
            name,
            new_slug,
            description,
            image_url,
            landing_page,
        } => {
            let patch = CountryPatch {
                name,
                slug: new_slug,
                description,
                image_url,
                landing_page,
                ..Default::default()
            };
            anyhow::ensure!(
                patch != CountryPatch::default(),
                "Nothing to update (pass at least one of --name, --new-slug, --description, --image-url, --landing-page)"
            );

            let country = api.update_country(&session, &slug, &patch).await?;
            if country.slug != slug {
                invalidate(&slug, None);
            }
            println!("Updated country {} ({})", country.name, country.slug);
        }
        AdminCommand::SetMenu { slug, file } => {
            let items = parse_menu(&read_input(file.as_deref())?)?;
            let country = api.update_menu(&session, &slug, items).await?;
            println!(
                "Menu of {} saved ({} items)",
                country.slug,
                MenuItem::walk(&country.menu_items).len()
            );
        }
        AdminCommand::DeleteCountry { slug } => {
            api.delete_country(&session, &slug).await?;
            invalidate(&slug, None);
            println!("Deleted country {slug}");
        }
        AdminCommand::SaveContent {
            country,
            path,
            file,
        } => {
            let markdown = read_input(file.as_deref())?;
            let saved = api.save_content(&session, &country, &path, &markdown).await?;
            invalidate(&country, Some(&path));
            println!(
                "Saved {country}/{path} ({} at {})",
                cli::format_size(markdown.len() as u64),
                format_timestamp(saved.timestamp)
            );
        }
        AdminCommand::DeleteContent { country, path } => {
            api.delete_content(&session, &country, &path).await?;
            invalidate(&country, Some(&path));
            println!("Deleted {country}/{path}");
        }
        AdminCommand::UploadPdf {
            country,
            path,
            file,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.pdf".to_string());

            let uploaded = api
                .upload_pdf(&session, &country, &path, &file_name, bytes)
                .await?;
            println!("Uploaded {}", uploaded.path);
            println!("   URL: {}", api.pdf_url(&country, strip_country(&uploaded.path, &country)));
        }
        AdminCommand::SetPalette {
            slug,
            primary,
            secondary,
            accent,
            background,
            text,
            reset,
        } => {
            let mut palette = if reset {
                ColorPalette::default()
            } else {
                api.country(&slug).await?.palette
            };

            for (field, value) in [
                (&mut palette.primary, primary),
                (&mut palette.secondary, secondary),
                (&mut palette.accent, accent),
                (&mut palette.background, background),
                (&mut palette.text, text),
            ] {
                if let Some(value) = value {
                    *field = value;
                }
            }

            let invalid = palette.invalid_fields();
            anyhow::ensure!(
                invalid.is_empty(),
                "Invalid colors for {} (expected #rgb or #rrggbb)",
                invalid.join(", ")
            );

            let country = api.update_palette(&session, &slug, palette).await?;
            println!("Palette of {}: {}", country.slug, cli::format_palette(&country.palette));
        }
    }

    session.logout();
    Ok(())
}

fn open_cache(config: &ClientConfig) -> Option<Arc<ContentCache>> {
    match ContentCache::open(&config.cache_dir, config.cache_config()) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Content cache unavailable, continuing without it");
            None
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read content from stdin")?;
            Ok(buffer)
        }
    }
}

fn parse_menu(json: &str) -> Result<Vec<MenuItem>> {
    serde_json::from_str(json).context("Menu must be a JSON array of menu items")
}

/// Content path of a `{country}/{path}` blob key
fn strip_country<'a>(key: &'a str, country: &str) -> &'a str {
    key.strip_prefix(country)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(key)
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show_with_wait() {
        let cli = Cli::try_parse_from(["guidebook", "show", "italy", "lazio/rome.md", "--wait"])
            .unwrap();
        match cli.command {
            Command::Show {
                country,
                path,
                wait,
            } => {
                assert_eq!(country, "italy");
                assert_eq!(path, "lazio/rome.md");
                assert!(wait);
            }
            _ => panic!("Expected Show"),
        }
    }

    #[test]
    fn test_parse_admin_palette() {
        let cli = Cli::try_parse_from([
            "guidebook",
            "admin",
            "--password",
            "pw",
            "set-palette",
            "italy",
            "--primary",
            "#ff0000",
        ])
        .unwrap();
        match cli.command {
            Command::Admin(AdminArgs {
                password,
                command: AdminCommand::SetPalette { slug, primary, .. },
            }) => {
                assert_eq!(password, "pw");
                assert_eq!(slug, "italy");
                assert_eq!(primary.as_deref(), Some("#ff0000"));
            }
            _ => panic!("Expected Admin SetPalette"),
        }
    }

    #[test]
    fn test_parse_admin_update_country() {
        let cli = Cli::try_parse_from([
            "guidebook",
            "admin",
            "--password",
            "pw",
            "update-country",
            "italy",
            "--new-slug",
            "italia",
            "--image-url",
            "https://example.com/italy.jpg",
        ])
        .unwrap();
        match cli.command {
            Command::Admin(AdminArgs {
                command:
                    AdminCommand::UpdateCountry {
                        slug,
                        new_slug,
                        image_url,
                        name,
                        ..
                    },
                ..
            }) => {
                assert_eq!(slug, "italy");
                assert_eq!(new_slug.as_deref(), Some("italia"));
                assert_eq!(image_url.as_deref(), Some("https://example.com/italy.jpg"));
                assert!(name.is_none());
            }
            _ => panic!("Expected Admin UpdateCountry"),
        }
    }

    #[test]
    fn test_parse_menu() {
        let items = parse_menu(
            r#"[{"id": "1", "type": "region", "title": "Lazio", "slug": "lazio",
                 "contentPath": "lazio.md",
                 "children": [{"id": "2", "type": "city", "title": "Rome", "slug": "rome",
                               "contentPath": "lazio/rome.md"}]}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].children()[0].slug, "rome");

        assert!(parse_menu(r#"{"slug": "lazio"}"#).is_err());
    }

    #[test]
    fn test_strip_country() {
        assert_eq!(strip_country("italy/maps/rome.pdf", "italy"), "maps/rome.pdf");
        assert_eq!(strip_country("japan/x.pdf", "italy"), "japan/x.pdf");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
