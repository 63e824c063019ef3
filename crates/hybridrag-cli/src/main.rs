//! Hybridrag CLI - build knowledge bases and run hybrid vector + graph queries

mod workspace;

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use hybridrag_core::config::Config;
use hybridrag_core::domain::knowledge::{Document, DocumentInput, Knowledge};
use hybridrag_core::domain::retrieval::{Metadata, RetrievalResult, collection_name};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use workspace::Workspace;

#[derive(Parser)]
#[command(name = "hybridrag")]
#[command(author, version, about = "Hybrid vector + graph knowledge retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage knowledge bases
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Manage documents
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Embed every document that has no embedding yet
    Embed {
        /// Knowledge base id or name
        kb: String,
        /// Model name recorded with the embeddings (defaults to embedding.model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Vector search returning matching documents
    Search {
        /// Knowledge base id or name
        kb: String,
        query: String,
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Hybrid vector + graph retrieval
    Query {
        /// Knowledge base id or name
        kb: String,
        query: String,
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
        /// Force lexical reranking on
        #[arg(long, conflicts_with = "no_rerank")]
        rerank: bool,
        /// Force lexical reranking off
        #[arg(long)]
        no_rerank: bool,
    },

    /// Documents near a given document
    Similar {
        /// Knowledge base id or name
        kb: String,
        document_id: String,
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Create a knowledge base
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List knowledge bases
    List,
    /// Show knowledge base details
    Show { kb: String },
    /// Delete a knowledge base
    Delete { kb: String },
    /// Show knowledge base statistics
    Stats { kb: String },
}

#[derive(Subcommand)]
enum DocAction {
    /// Add a document from text or a file
    Add {
        /// Knowledge base id or name
        kb: String,
        /// Document text
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,
        /// Read the document from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Metadata entries as key=value (values are parsed as JSON when possible)
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Add every regular file in a directory as a document
    Bulk {
        /// Knowledge base id or name
        kb: String,
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.quiet { "hybridrag=warn" } else { "hybridrag=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .init();

    let result = run(cli).await;
    if let Err(e) = &result {
        if let Some(core) = e.downcast_ref::<hybridrag_core::Error>() {
            eprintln!("error[{}]: {}", core.code(), core);
            if let Some(suggestion) = core.suggestion() {
                eprintln!("  try: {}", suggestion);
            }
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Kb { action } => cmd_kb(action, format, quiet).await,
        Commands::Doc { action } => cmd_doc(action, format, quiet).await,
        Commands::Embed { kb, model } => cmd_embed(&kb, model.as_deref(), format, quiet).await,
        Commands::Search { kb, query, limit } => cmd_search(&kb, &query, limit, format).await,
        Commands::Query {
            kb,
            query,
            limit,
            rerank,
            no_rerank,
        } => {
            let rerank = match (rerank, no_rerank) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_query(&kb, &query, limit, rerank, format).await
        }
        Commands::Similar { kb, document_id, limit } => cmd_similar(&kb, &document_id, limit, format).await,
        Commands::Config { action } => cmd_config(action, quiet),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn preview(content: &str, max: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_kb(action: KbAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, false).await?;

    match action {
        KbAction::Create { name, description } => {
            let knowledge = ws.store.add_knowledge(&name, &description).await?;
            if format == OutputFormat::Json {
                print_json(&knowledge)?;
            } else if quiet {
                println!("{}", knowledge.id());
            } else {
                println!("Created knowledge base '{}'", knowledge.name());
                println!("  ID: {}", knowledge.id());
                println!("\nNext steps:");
                println!("  1. Add documents with `hybridrag doc add {} <text>`", knowledge.name());
                println!("  2. Embed them with `hybridrag embed {}`", knowledge.name());
                println!("  3. Query with `hybridrag query {} <question>`", knowledge.name());
            }
        }
        KbAction::List => {
            let all = ws.store.list_knowledge().await?;
            if format == OutputFormat::Json {
                print_json(&all)?;
            } else if all.is_empty() {
                if !quiet {
                    println!("No knowledge bases found.");
                    println!("\nCreate one with: hybridrag kb create <name>");
                }
            } else {
                if !quiet {
                    println!("Knowledge bases:");
                }
                for k in all {
                    println!(
                        "  {} - {} ({} documents, v{})",
                        short_id(k.id()),
                        k.name(),
                        k.documents().len(),
                        k.version()
                    );
                }
            }
        }
        KbAction::Show { kb } => {
            let knowledge = ws.store.find(&kb).await?;
            if format == OutputFormat::Json {
                print_json(&knowledge)?;
            } else {
                print_knowledge(&knowledge);
            }
        }
        KbAction::Delete { kb } => {
            let knowledge = ws.store.find(&kb).await?;
            ws.store.delete_knowledge(knowledge.id()).await?;
            ws.persist().await?;
            if !quiet {
                println!("Knowledge base '{}' deleted.", knowledge.name());
            }
        }
        KbAction::Stats { kb } => {
            let knowledge = ws.store.find(&kb).await?;
            let stats = ws.store.get_stats(knowledge.id()).await?;
            if format == OutputFormat::Json {
                print_json(&stats)?;
            } else {
                println!("Knowledge base: {}", knowledge.name());
                println!("  Documents: {}", stats.document_count);
                println!("  Embeddings: {}", stats.embedding_count);
                println!("  Version: {}", stats.version);
                println!("  Last updated: {}", stats.last_updated.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

fn print_knowledge(knowledge: &Knowledge) {
    println!("Knowledge base: {}", knowledge.name());
    println!("  ID: {}", knowledge.id());
    if !knowledge.description().is_empty() {
        println!("  Description: {}", knowledge.description());
    }
    println!("  Version: {}", knowledge.version());
    println!("  Created: {}", knowledge.created_at().format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", knowledge.updated_at().format("%Y-%m-%d %H:%M:%S"));
    println!("  Documents: {}", knowledge.documents().len());
    for doc in knowledge.documents() {
        let embedded = if knowledge.embeddings().contains_key(&doc.id) {
            ""
        } else {
            " [not embedded]"
        };
        println!("    {} {}{}", doc.id, preview(&doc.content, 60), embedded);
    }
}

fn parse_metadata(entries: &[String]) -> anyhow::Result<Metadata> {
    let mut metadata = Metadata::new();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid metadata entry '{}'. Expected KEY=VALUE", entry))?;
        if key.is_empty() {
            return Err(anyhow!("Metadata key cannot be empty in '{}'", entry));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

async fn read_document_file(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn cmd_doc(action: DocAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, false).await?;

    match action {
        DocAction::Add { kb, text, file, meta } => {
            let knowledge = ws.store.find(&kb).await?;
            let mut metadata = parse_metadata(&meta)?;
            let content = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => {
                    metadata
                        .entry("path")
                        .or_insert_with(|| Value::from(path.display().to_string()));
                    read_document_file(&path).await?
                }
                (None, None) => return Err(anyhow!("Provide document text or --file")),
            };

            let result = ws.store.add_document(knowledge.id(), &content, metadata).await;
            // Graph writes may have happened even when the save failed
            ws.persist().await?;
            let document = result?;

            print_added(&[document], format, quiet)?;
        }
        DocAction::Bulk { kb, dir } => {
            let knowledge = ws.store.find(&kb).await?;
            let inputs = collect_directory(&dir).await?;
            if inputs.is_empty() {
                if !quiet {
                    println!("No files found in {}", dir.display());
                }
                return Ok(());
            }

            let result = ws.store.bulk_index(knowledge.id(), inputs).await;
            ws.persist().await?;
            let documents = result?;

            print_added(&documents, format, quiet)?;
        }
    }
    Ok(())
}

/// Every regular file directly inside `dir`, sorted by path
async fn collect_directory(dir: &Path) -> anyhow::Result<Vec<DocumentInput>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.is_empty() => content,
            Ok(_) => {
                warn!(path = %path.display(), "Skipping empty file");
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };
        let mut metadata = Metadata::new();
        metadata.insert("path".into(), Value::from(path.display().to_string()));
        inputs.push(DocumentInput::new(content).with_metadata(metadata));
    }
    Ok(inputs)
}

fn print_added(documents: &[Document], format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&documents);
    }
    for doc in documents {
        if quiet {
            println!("{}", doc.id);
        } else {
            println!("Added document {} ({} chars)", doc.id, doc.content.chars().count());
        }
    }
    if !quiet {
        println!("\nRun `hybridrag embed <kb>` to make new documents searchable by vector.");
    }
    Ok(())
}

async fn cmd_embed(kb: &str, model: Option<&str>, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, true).await?;
    let knowledge = ws.store.find(kb).await?;
    let model = model.unwrap_or(ws.embedding_model()).to_string();

    let result = ws.store.embed_pending(knowledge.id(), &model).await;
    ws.persist().await?;
    let count = result?;

    info!(knowledge_id = %knowledge.id(), count, "Embedding finished");

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({ "knowledge_id": knowledge.id(), "embedded": count, "model": model }))?;
    } else if !quiet {
        println!("Embedded {} document(s) in '{}' with {}", count, knowledge.name(), model);
    }
    Ok(())
}

async fn cmd_search(kb: &str, query: &str, limit: usize, format: OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, true).await?;
    let knowledge = ws.store.find(kb).await?;
    let documents = ws.store.search_documents(knowledge.id(), query, limit).await?;

    if format == OutputFormat::Json {
        return print_json(&documents);
    }
    if documents.is_empty() {
        println!("No matching documents.");
    }
    for (i, doc) in documents.iter().enumerate() {
        println!("{}. {} {}", i + 1, doc.id, preview(&doc.content, 80));
    }
    Ok(())
}

async fn cmd_query(
    kb: &str,
    query: &str,
    limit: usize,
    rerank: Option<bool>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, true).await?;
    let knowledge = ws.store.find(kb).await?;
    let rerank = rerank.unwrap_or(ws.config.retrieval.rerank);
    let retriever = ws.retriever(&knowledge, rerank);

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let context = retriever.retrieve_with_cancellation(query, limit, &token).await?;

    if format == OutputFormat::Json {
        return print_json(&context);
    }

    println!(
        "{} result(s) for \"{}\" ({} raw hits, mean score {:.4})",
        context.results.len(),
        context.query,
        context.total_found,
        context.fused_score
    );
    for (i, result) in context.results.iter().enumerate() {
        print_result(i + 1, result);
    }
    Ok(())
}

fn print_result(rank: usize, result: &RetrievalResult) {
    println!(
        "{}. [{}] {} score={:.4}",
        rank, result.source, result.id, result.score
    );
    println!("   {}", preview(&result.content, 100));
}

async fn cmd_similar(kb: &str, document_id: &str, limit: usize, format: OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(Config::load()?, true).await?;
    let knowledge = ws.store.find(kb).await?;
    let results = ws
        .semantic_search()?
        .similarity_search(&collection_name(knowledge.id()), document_id, limit)
        .await?;

    if format == OutputFormat::Json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No similar documents.");
    }
    for (i, result) in results.iter().enumerate() {
        let mut display = result.clone();
        if let Some(doc) = knowledge.document(&result.id) {
            display.content = doc.content.clone();
        }
        print_result(i + 1, &display);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
