//! JRC Global Surface Water STAC generator
//!
//! Usage:
//!     jrc-gsw create-collection --destination stac/
//!     jrc-gsw create-item --destination stac/ --source <root>/Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif
//!     jrc-gsw create-items --destination stac/ --source a.tif --source b.tif
//!     jrc-gsw validate --dir stac/

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jrc_gsw_stac::catalog::STAC_VERSION;
use jrc_gsw_stac::collection::write_collections;
use jrc_gsw_stac::item::{create_item, create_items, write_item, write_items, ItemOptions};
use jrc_gsw_stac::validate::{self, has_errors, ValidationIssue};
use jrc_gsw_stac::GdalReader;

// =============================================================================
// CLI Definition
// =============================================================================

#[derive(Parser)]
#[command(name = "jrc-gsw")]
#[command(about = "Generate STAC metadata for JRC Global Surface Water data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the root collection and one collection per dataset group
    CreateCollection {
        /// Output directory for the root collection
        #[arg(short, long, env = "JRC_GSW_DESTINATION")]
        destination: PathBuf,
    },
    /// Create a STAC Item from a COG
    CreateItem {
        /// Output directory; the item goes to `<collection-id>/<item-id>.json` below it
        #[arg(short, long, env = "JRC_GSW_DESTINATION")]
        destination: PathBuf,

        /// Path to the COG, following the GSW archive layout
        #[arg(short, long)]
        source: String,

        #[command(flatten)]
        options: ItemArgs,
    },
    /// Create STAC Items for several COGs
    CreateItems {
        /// Output directory; items go to `<collection-id>/<item-id>.json` below it
        #[arg(short, long, env = "JRC_GSW_DESTINATION")]
        destination: PathBuf,

        /// Paths to the COGs
        #[arg(short, long, required = true, num_args = 1..)]
        source: Vec<String>,

        #[command(flatten)]
        options: ItemArgs,
    },
    /// Validate the STAC documents in a directory
    Validate {
        /// Directory searched recursively for STAC JSON documents
        #[arg(short, long, env = "JRC_GSW_DESTINATION")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct ItemArgs {
    /// Archive root used to locate Aggregated sibling files (defaults to the root in the source path)
    #[arg(short, long, env = "JRC_GSW_DATA_ROOT")]
    root: Option<String>,

    /// Href of the item's collection; adds a `collection` link when set
    #[arg(long, env = "JRC_GSW_COLLECTION_HREF")]
    collection_href: Option<String>,
}

impl From<ItemArgs> for ItemOptions {
    fn from(args: ItemArgs) -> Self {
        ItemOptions {
            data_root: args.root,
            collection_href: args.collection_href,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from environment
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CreateCollection { destination } => {
            let written = write_collections(&destination)
                .with_context(|| format!("Failed to write collections to {:?}", destination))?;
            println!("Wrote {} collections to {:?}", written.len(), destination);
        }

        Commands::CreateItem {
            destination,
            source,
            options,
        } => {
            let item = create_item(&source, &options.into(), &GdalReader)
                .with_context(|| format!("Failed to create item from {}", source))?;
            let path = write_item(&item, &destination)
                .with_context(|| format!("Failed to write item {} to {:?}", item.id, destination))?;
            println!("Wrote item {} to {:?}", item.id, path);
        }

        Commands::CreateItems {
            destination,
            source,
            options,
        } => {
            let items = create_items(source.iter().map(String::as_str), &options.into(), &GdalReader)
                .context("Failed to create items")?;
            let paths = write_items(&items, &destination)
                .with_context(|| format!("Failed to write items to {:?}", destination))?;
            println!("Wrote {} items from {} sources to {:?}", paths.len(), source.len(), destination);
        }

        Commands::Validate { dir } => {
            println!("=== STAC Validator (v{}) ===\n", STAC_VERSION);
            println!("Validating {:?}...", dir);

            let (count, issues) = validate::validate_dir(&dir)
                .with_context(|| format!("Failed to validate {:?}", dir))?;

            println!("\n=== Validation Results ===");
            println!("Documents: {}", count);
            println!("Issues found: {}", issues.len());
            print_issues(&issues, 30);

            if has_errors(&issues) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_issues(issues: &[ValidationIssue], limit: usize) {
    for issue in issues.iter().take(limit) {
        println!("  - [{:?}] {}: {}", issue.severity, issue.document, issue.message);
    }
    if issues.len() > limit {
        println!("  ... and {} more", issues.len() - limit);
    }
}
