//! pricereshape CLI - reshape wide price survey exports
//!
//! # Main Commands
//!
//! ```bash
//! pricereshape reshape survey.csv -o prices.csv   # Wide export → long CSV
//! pricereshape reshape survey.csv -f json          # Same, as JSON on stdout
//! pricereshape serve                               # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! pricereshape parse survey.csv       # Just parse CSV to JSON
//! pricereshape categories             # Show item categories and their columns
//! pricereshape example-catalog        # Print the built-in catalog as JSON
//! ```

use clap::{Parser, Subcommand};
use pricereshape::api::logs::LOG_BROADCASTER;
use pricereshape::reshape::pipeline::{format_delimiter, load_catalog};
use pricereshape::{
    parse_csv_file, process_file, render, Catalog, OutputFormat, PipelineOptions, ReshapeOptions,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the default server port.
const PORT_ENV: &str = "PRICERESHAPE_PORT";
const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "pricereshape")]
#[command(about = "Reshape wide commodity price surveys into one row per item", long_about = None)]
struct Cli {
    /// Do not echo pipeline progress to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reshape a survey export: one output row per submission and item
    Reshape {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv or json
        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Collapse repeated rows
        #[arg(long)]
        dedup: bool,

        /// Drop rows with a blank submission id, time, district, upazila or items field
        #[arg(long)]
        skip_incomplete: bool,

        /// Only keep this item (repeatable)
        #[arg(short, long = "item", value_name = "NAME")]
        items: Vec<String>,

        /// Item catalog JSON file
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show item categories and the columns they read
    Categories {
        /// Item catalog JSON file
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Print the built-in catalog as JSON
    ExampleCatalog,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $PRICERESHAPE_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.quiet {
        LOG_BROADCASTER.set_echo(false);
    }

    let result = match cli.command {
        Commands::Reshape {
            input,
            output,
            format,
            delimiter,
            dedup,
            skip_incomplete,
            items,
            catalog,
        } => {
            let options = PipelineOptions {
                delimiter,
                catalog_path: catalog,
                reshape: ReshapeOptions {
                    dedup,
                    skip_incomplete,
                    items,
                },
            };
            cmd_reshape(&input, &options, format, output.as_deref())
        }

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Categories { catalog } => cmd_categories(catalog),

        Commands::ExampleCatalog => cmd_example_catalog(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_reshape(
    input: &Path,
    options: &PipelineOptions,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = process_file(input, options)?;
    let content = render(&result.records, format)?;
    write_output(&content, output)?;

    eprintln!("✨ Done: {} records", result.records.len());
    Ok(())
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file(input, delimiter)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_categories(catalog: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let options = PipelineOptions {
        catalog_path: catalog,
        ..Default::default()
    };
    let catalog = load_catalog(&options)?;

    eprintln!("📋 Item categories ({}):\n", catalog.len());
    for category in catalog.categories() {
        println!("  {:>3}  {}", category.code, category.name);
        println!("       Price:            {}", category.value_column.as_deref().unwrap_or("-"));
        println!(
            "       Purchase options: {}",
            category.purchase_option_column.as_deref().unwrap_or("-")
        );
        println!("       Shop type:        {}", category.shop_type_column.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn cmd_example_catalog() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", Catalog::builtin().to_json()?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let port = match port {
        Some(port) => port,
        None => match std::env::var(PORT_ENV) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| format!("invalid {PORT_ENV} '{value}': {e}"))?,
            Err(_) => DEFAULT_PORT,
        },
    };
    pricereshape::server::start_server(port).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
