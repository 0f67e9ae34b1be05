//! Operator CLI for the farm map catalog.

mod config;
mod upload;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use mapas_client::catalog::{category_name, farms};
use mapas_client::diagnostics::{remediations, verification_script};
use mapas_client::{
    Backend, CategoryManager, CheckResult, CheckStatus, CoordinateEditor, Diagnostics, MapCatalog,
    MapFilter,
};
use mapas_core::config::AppConfig;
use mapas_core::{Annotation, Category, CategoryId, MapId, MapRecord};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use upload::{UploadArgs, handle_upload_command};

#[derive(Parser)]
#[command(name = "mapasctl")]
#[command(about = "Operator CLI for the farm map catalog")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "MAPAS_CONFIG", default_value = "mapas.toml")]
    config: PathBuf,

    /// Use local filesystem storage and SQLite metadata under DIR
    #[arg(long, global = true, value_name = "DIR")]
    local: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload PDF maps in batches
    Upload {
        /// Category name or ID for every uploaded map
        #[arg(long)]
        category: String,
        /// Farm label (default: derived from each file name)
        #[arg(long)]
        farm: Option<String>,
        /// Retry failed uploads once more after the run
        #[arg(long, default_value_t = false)]
        retry_failed: bool,
        /// PDF files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Browse and edit stored maps
    Maps {
        #[command(subcommand)]
        command: MapCommands,
    },
    /// Category management commands
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Show backend connection status
    Status,
    /// Run every backend probe
    Doctor {
        /// Print the setup scripts for failing checks
        #[arg(long, default_value_t = false)]
        scripts: bool,
    },
}

#[derive(Subcommand)]
enum MapCommands {
    /// List maps
    List {
        /// Case-insensitive search over name and farm
        #[arg(long)]
        search: Option<String>,
        /// Only maps in this category (name or ID)
        #[arg(long)]
        category: Option<String>,
        /// Only maps of this farm
        #[arg(long)]
        farm: Option<String>,
    },
    /// List distinct farms
    Farms,
    /// Show map details
    Show { id: String },
    /// Delete a map and its file
    Delete { id: String },
    /// Set or clear coordinates
    Coords {
        id: String,
        /// Latitude in degrees (blank clears)
        #[arg(long, allow_hyphen_values = true, required_unless_present = "clear")]
        lat: Option<String>,
        /// Longitude in degrees (blank clears)
        #[arg(long, allow_hyphen_values = true, required_unless_present = "clear")]
        lng: Option<String>,
        /// Clear both coordinates
        #[arg(long, default_value_t = false, conflicts_with_all = ["lat", "lng"])]
        clear: bool,
    },
    /// Print map links for a located map
    Links { id: String },
    /// Save a PNG drawing as the map's annotations
    Annotate {
        id: String,
        /// PNG image of the drawing layer
        #[arg(long)]
        image: PathBuf,
    },
    /// Move maps to another category
    Recategorize {
        /// Target category (name or ID)
        #[arg(long)]
        category: String,
        /// Select every map of this farm
        #[arg(long)]
        farm: Option<String>,
        /// Map IDs
        #[arg(required_unless_present = "farm")]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories with their map counts
    List,
    /// Add a category
    Add { name: String },
    /// Rename a category
    Rename { category: String, new_name: String },
    /// Delete an unused category
    Delete { category: String },
    /// Insert the default categories that are missing
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.local {
        Some(dir) => config::local(dir)?,
        None => config::load(&cli.config)?,
    };
    let backend = Backend::connect(&config)
        .await
        .context("failed to connect to backend")?;

    match cli.command {
        Commands::Upload {
            category,
            farm,
            retry_failed,
            files,
        } => {
            handle_upload_command(
                &backend,
                &config,
                UploadArgs {
                    category,
                    farm,
                    files,
                    retry_failed,
                },
            )
            .await
        }
        Commands::Maps { command } => handle_map_command(command, &backend).await,
        Commands::Categories { command } => handle_category_command(command, &backend).await,
        Commands::Status => handle_status_command(&backend, &config).await,
        Commands::Doctor { scripts } => handle_doctor_command(&backend, &config, scripts).await,
    }
}

/// Find a category by ID or case-insensitive name.
pub(crate) fn find_category<'a>(categories: &'a [Category], selector: &str) -> Option<&'a Category> {
    if let Ok(id) = CategoryId::parse(selector)
        && let Some(found) = categories.iter().find(|c| c.id == id)
    {
        return Some(found);
    }
    let lowered = selector.trim().to_lowercase();
    categories
        .iter()
        .find(|c| c.name.trim().to_lowercase() == lowered)
}

pub(crate) async fn resolve_category(manager: &CategoryManager, selector: &str) -> Result<Category> {
    let categories = manager.list().await?;
    find_category(&categories, selector)
        .cloned()
        .with_context(|| format!("category not found: {selector}"))
}

fn parse_map_id(id: &str) -> Result<MapId> {
    Ok(MapId::parse(id)?)
}

async fn handle_map_command(command: MapCommands, backend: &Backend) -> Result<()> {
    let catalog = MapCatalog::new(backend.clone());
    let manager = CategoryManager::new(backend.metadata.clone());

    match command {
        MapCommands::List {
            search,
            category,
            farm,
        } => {
            let categories = manager.list().await?;
            let category = match category {
                Some(selector) => Some(
                    find_category(&categories, &selector)
                        .map(|c| c.id)
                        .with_context(|| format!("category not found: {selector}"))?,
                ),
                None => None,
            };
            let filter = MapFilter {
                query: search.unwrap_or_default(),
                category,
                farm,
            };
            let maps = catalog.search(&filter).await?;
            if maps.is_empty() {
                println!("No maps found.");
            } else {
                println!(
                    "{:<38} {:<28} {:<20} {:<16} Location",
                    "ID", "Name", "Farm", "Category"
                );
                println!("{}", "-".repeat(112));
                for map in &maps {
                    let location = map
                        .coordinates()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<38} {:<28} {:<20} {:<16} {}",
                        map.id,
                        map.name,
                        map.farm,
                        category_name(&categories, map.category_id),
                        location
                    );
                }
            }
        }
        MapCommands::Farms => {
            let maps = catalog.list().await?;
            for farm in farms(&maps) {
                println!("{farm}");
            }
        }
        MapCommands::Show { id } => {
            let map = catalog.get(parse_map_id(&id)?).await?;
            let categories = manager.list().await?;
            print_map(&map, &categories);
        }
        MapCommands::Delete { id } => {
            let map = catalog.delete(parse_map_id(&id)?).await?;
            println!("Map '{}' deleted.", map.name);
        }
        MapCommands::Coords {
            id,
            lat,
            lng,
            clear,
        } => {
            let id = parse_map_id(&id)?;
            let editor = CoordinateEditor::new(backend.metadata.clone());
            if clear {
                editor.clear(id).await?;
                println!("Coordinates cleared.");
            } else {
                let update = editor
                    .save(id, lat.as_deref().unwrap_or(""), lng.as_deref().unwrap_or(""))
                    .await?;
                match update.coordinates() {
                    Some(coords) => println!("Coordinates saved: {coords}"),
                    None => println!("Coordinates saved (incomplete)."),
                }
            }
        }
        MapCommands::Links { id } => {
            let map = catalog.get(parse_map_id(&id)?).await?;
            let Some(links) = CoordinateEditor::links(&map) else {
                bail!("map '{}' has no coordinates", map.name);
            };
            println!("Location: {}", links.display);
            println!("Google Maps: {}", links.google_maps);
            println!("Google Earth: {}", links.google_earth);
        }
        MapCommands::Annotate { id, image } => {
            let id = parse_map_id(&id)?;
            let annotation = read_annotation(&image).await?;
            catalog.save_annotations(id, &annotation).await?;
            println!("Annotations saved.");
        }
        MapCommands::Recategorize {
            category,
            farm,
            ids,
        } => {
            let target = resolve_category(&manager, &category).await?;
            let mut selected = ids
                .iter()
                .map(|id| parse_map_id(id))
                .collect::<Result<Vec<_>>>()?;
            if let Some(farm) = farm {
                let maps = catalog
                    .search(&MapFilter {
                        farm: Some(farm),
                        ..MapFilter::default()
                    })
                    .await?;
                selected.extend(maps.iter().map(|m| m.id));
            }
            selected.sort();
            selected.dedup();

            let updated = catalog.recategorize(&selected, Some(target.id)).await?;
            println!("{updated} map(s) moved to '{}'.", target.name);
        }
    }

    Ok(())
}

fn print_map(map: &MapRecord, categories: &[Category]) {
    println!("Map ID: {}", map.id);
    println!("Name: {}", map.name);
    println!("Farm: {}", map.farm);
    println!("Category: {}", category_name(categories, map.category_id));
    println!("File: {}", map.file_url);
    println!("Created: {}", map.created_at);
    match CoordinateEditor::links(map) {
        Some(links) => {
            println!("Location: {}", links.display);
            println!("Google Maps: {}", links.google_maps);
            println!("Google Earth: {}", links.google_earth);
        }
        None => println!("Location: -"),
    }
    println!("Annotations: {}", map.has_annotations());
}

async fn read_annotation(path: &Path) -> Result<Annotation> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let image_data = format!("data:image/png;base64,{}", STANDARD.encode(data));
    Ok(Annotation::new(image_data, OffsetDateTime::now_utc())?)
}

async fn handle_category_command(command: CategoryCommands, backend: &Backend) -> Result<()> {
    let manager = CategoryManager::new(backend.metadata.clone());

    match command {
        CategoryCommands::List => {
            let usage = manager.list_with_usage().await?;
            if usage.is_empty() {
                println!("No categories found.");
            } else {
                println!("{:<24} {:<38} {:<6}", "Name", "ID", "Maps");
                println!("{}", "-".repeat(70));
                for entry in usage {
                    println!(
                        "{:<24} {:<38} {:<6}",
                        entry.category.name, entry.category.id, entry.maps
                    );
                }
            }
        }
        CategoryCommands::Add { name } => {
            let category = manager.add(&name).await?;
            println!("Category '{}' created.", category.name);
            println!("Category ID: {}", category.id);
        }
        CategoryCommands::Rename { category, new_name } => {
            let current = resolve_category(&manager, &category).await?;
            let renamed = manager.rename(current.id, &new_name).await?;
            println!("Category '{}' renamed to '{}'.", current.name, renamed.name);
        }
        CategoryCommands::Delete { category } => {
            let current = resolve_category(&manager, &category).await?;
            manager.delete(current.id).await?;
            println!("Category '{}' deleted.", current.name);
        }
        CategoryCommands::Seed => {
            let created = manager.seed_defaults().await?;
            if created.is_empty() {
                println!("All default categories already exist.");
            } else {
                for category in created {
                    println!("Created '{}'.", category.name);
                }
            }
        }
    }

    Ok(())
}

async fn handle_status_command(backend: &Backend, config: &AppConfig) -> Result<()> {
    let diagnostics = Diagnostics::new(backend.clone(), config.storage.bucket_name());
    let results = diagnostics.status().await;
    print_checks(&results);
    Ok(())
}

async fn handle_doctor_command(backend: &Backend, config: &AppConfig, scripts: bool) -> Result<()> {
    let diagnostics = Diagnostics::new(backend.clone(), config.storage.bucket_name());
    let results = diagnostics.run().await;
    print_checks(&results);

    let fixes = remediations(&results);
    if !fixes.is_empty() {
        println!();
        if scripts {
            for fix in &fixes {
                println!("-- {}", fix.title());
                println!("{}", fix.script(diagnostics.bucket()));
            }
            println!("-- Verify");
            println!("{}", verification_script(diagnostics.bucket()));
        } else {
            println!("Setup needed:");
            for fix in &fixes {
                println!("  {}", fix.title());
            }
            println!("Run with --scripts to print the SQL.");
        }
    }

    let errors = results
        .iter()
        .filter(|r| r.status == CheckStatus::Error)
        .count();
    if errors > 0 {
        bail!("{errors} check(s) failed");
    }
    Ok(())
}

fn print_checks(results: &[CheckResult]) {
    println!("{:<20} {:<8} Message", "Check", "Status");
    println!("{}", "-".repeat(72));
    for result in results {
        println!(
            "{:<20} {:<8} {}",
            result.name,
            result.status.as_str(),
            result.message
        );
    }
}
