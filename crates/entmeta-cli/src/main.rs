mod commands;
mod reader;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use entmeta_core::{ModelFactory, SchemaDocument};
use reader::{read_project_config, read_schema_files};

#[derive(Parser)]
#[command(
    name = "entmeta",
    version,
    about = "entmeta metadata engine: derive entity models from .entities.yaml/.json schema documents"
)]
struct Cli {
    /// Log cache and build activity to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one entity model and print its metadata
    Inspect {
        /// Input path (file or directory, defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Entity class to build
        #[arg(long)]
        class: String,

        /// Model reference (defaults to the class name)
        #[arg(long)]
        reference: Option<String>,

        /// Locale for display texts (defaults to the configured locale)
        #[arg(long)]
        locale: Option<String>,

        /// Output format: human (default) or json
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Build every entity model and report failures
    Validate {
        /// Input path (file or directory, defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: human (default) or json
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Output the class reference graph
    Graph {
        /// Input path (file or directory, defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format: mermaid (default) or dot
        #[arg(long, default_value = "mermaid")]
        format: String,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "entmeta_core=debug"
    } else {
        "entmeta_core=error"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Inspect {
            path,
            class,
            reference,
            locale,
            format,
        } => match commands::inspect::run_inspect(
            &path,
            &class,
            reference.as_deref(),
            locale.as_deref(),
            &format,
        ) {
            Ok(output) => {
                println!("{output}");
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        Commands::Validate { path, format } => {
            match commands::validate::run_validate(&path, &format) {
                Ok((output, error_count)) => {
                    println!("{output}");
                    if error_count > 0 {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Graph { path, format } => match commands::graph::run_graph(&path, &format) {
            Ok(output) => {
                println!("{output}");
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
    }
}

/// Read, parse and merge the schema documents at `input_path` into a factory.
pub fn build_factory(input_path: &Path) -> Result<ModelFactory, String> {
    let files = read_schema_files(input_path)?;

    if files.is_empty() {
        return Err(format!(
            "No schema files (.entities.yaml, .entities.yml, .entities.json) found at: {}",
            input_path.display()
        ));
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let document = file.parse().map_err(|e| e.to_string())?;
        debug!(path = %file.path, classes = document.classes.len(), "schema document parsed");
        documents.push((file.path.clone(), document));
    }
    let merged = SchemaDocument::merge(documents).map_err(|e| e.to_string())?;

    // Read project config if input is a directory
    let config = if input_path.is_dir() {
        read_project_config(input_path)?.and_then(|c| c.config)
    } else {
        None
    };

    Ok(merged.into_factory(config))
}
