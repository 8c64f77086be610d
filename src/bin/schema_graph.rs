use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use url::Url;

use schema_graph::config::{directory_uri, GraphConfig, OutputFormat};
use schema_graph::{merge_schemas, JsonSchemaVersion, ReferenceGraph, Schema, SchemaLoader};

#[derive(Parser)]
#[command(name = "schema-graph")]
#[command(about = "Load, merge and inspect JSON Schema documents (drafts 3-7)")]
struct Cli {
    /// Configuration file (defaults to schema-graph.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Treat unknown keywords and malformed values as errors
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a schema and print it, projected onto a draft
    Load {
        file: PathBuf,

        /// Draft to render (draft3 .. draft7)
        #[arg(short, long)]
        draft: Option<JsonSchemaVersion>,
    },

    /// Merge OVERRIDE into BASE and print the result with its report
    Merge {
        base: PathBuf,

        #[arg(value_name = "OVERRIDE")]
        override_: PathBuf,

        /// Draft to render (draft3 .. draft7)
        #[arg(short, long)]
        draft: Option<JsonSchemaVersion>,
    },

    /// List references and recursive groups of a schema
    Refs {
        file: PathBuf,

        /// Print the reference graph as DOT instead
        #[arg(long)]
        dot: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = GraphConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.strict {
        config.loader.strict = true;
    }

    match cli.command {
        Command::Load { file, draft } => {
            let schema = load_file(&config, &file)?;
            print_schema(&config, &schema, draft)?;
        }
        Command::Merge { base, override_, draft } => {
            let base = load_file(&config, &base)?;
            let over = load_file(&config, &override_)?;
            let (merged, report) = merge_schemas(&base, &over);

            print_schema(&config, &merged, draft)?;
            if report.is_empty() {
                eprintln!("✅ Nothing to merge");
            } else {
                eprint!("{}", report);
                if report.has_errors() {
                    eprintln!("❌ Merge finished with errors");
                } else if report.is_conflict() {
                    eprintln!("⚠️  Merge finished with conflicts");
                } else {
                    eprintln!("✅ Merged cleanly");
                }
            }
        }
        Command::Refs { file, dot } => {
            let schema = load_file(&config, &file)?;
            let graph = ReferenceGraph::from_schema(&schema);

            if dot {
                print!("{}", graph.to_dot());
                return Ok(());
            }

            println!("📊 {} nodes, {} edges", graph.node_count(), graph.edge_count());
            let cycles = graph.cycles();
            if cycles.is_empty() {
                println!("✅ No recursive references");
            } else {
                println!("🔁 {} recursive group(s):", cycles.len());
                for group in cycles {
                    println!("  - {}", group.join(" -> "));
                }
            }
        }
    }

    Ok(())
}

/// Load `path` as the document at its `file://` URI. Sibling documents are
/// resolvable unless the configuration names a document directory.
fn load_file(config: &GraphConfig, path: &Path) -> Result<Schema> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document: Value = serde_json::from_str(&content).with_context(|| format!("{} is not JSON", path.display()))?;

    let absolute = std::fs::canonicalize(path)?;
    let uri = Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("{} has no file URI", absolute.display()))?;

    let documents = match config.document_client()? {
        Some(client) => client,
        None => {
            let dir = absolute.parent().unwrap_or_else(|| Path::new("/"));
            schema_graph::InMemoryDocumentClient::from_directory(dir, &directory_uri(dir)?)?
        }
    };

    let loader = SchemaLoader::new(config.loader_config()).with_document_client(Arc::new(documents));
    let (schema, report) = loader
        .read_schema_with_report(&uri, &document)
        .with_context(|| format!("failed to load {}", path.display()))?;

    for issue in report.issues() {
        eprintln!("⚠️  {}", issue);
    }
    Ok(schema)
}

fn print_schema(config: &GraphConfig, schema: &Schema, draft: Option<JsonSchemaVersion>) -> Result<()> {
    let version = draft.or(config.output.draft).unwrap_or_else(|| schema.version());
    let json = schema.to_json_with(version, &config.serialize_options());
    let text = match config.output.format {
        OutputFormat::Pretty => serde_json::to_string_pretty(&json)?,
        OutputFormat::Compact => serde_json::to_string(&json)?,
    };
    println!("{}", text);
    Ok(())
}
