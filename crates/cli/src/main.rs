//! guidechat CLI
//!
//! A command-line interface for grounded questions over an indexed
//! clinical guideline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guidechat_agents::{
    ChatAgent, ChatConfig, ChunkingConfig, EmbeddingClient, GenerationClient,
    InMemorySessionStore, Librarian, Retriever, VectorRetriever,
};
use guidechat_core::{AnswerResult, Role};
use guidechat_db::{init_memory, init_persistent, Repository};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// guidechat - cited answers from a clinical guideline
#[derive(Parser)]
#[command(name = "guidechat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (defaults to ~/.guidechat/data)
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    /// Use in-memory database (for testing)
    #[arg(long, global = true)]
    memory: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a guideline text file (pages split on form feeds)
    Ingest {
        /// Path to the extracted document text
        path: PathBuf,

        /// Re-ingest even if the index is already populated
        #[arg(long)]
        force: bool,

        /// Chunk id prefix
        #[arg(long, default_value = "ng12")]
        prefix: String,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat session
    Interactive,

    /// Raw similarity search over the index
    Search {
        /// Search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show index statistics
    Stats,

    /// Delete the local database (fresh start)
    ResetDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::ResetDb = &cli.command {
        let path = match cli.db_path.clone() {
            Some(path) => path,
            None => default_db_path()?,
        };
        return cmd_reset_db(&path);
    }

    // Initialize database
    let db = if cli.memory {
        info!("Using in-memory database");
        init_memory().await?
    } else {
        let db_path = match cli.db_path.clone() {
            Some(path) => path,
            None => default_db_path()?,
        };

        // Ensure directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Using database at: {}", db_path.display());
        init_persistent(&db_path).await?
    };

    let repo = Repository::new(db);
    let embedder = EmbeddingClient::default_local();
    let generator = GenerationClient::default_local();

    // Check inference services only when needed
    let needs_embeddings = matches!(
        cli.command,
        Commands::Ingest { .. }
            | Commands::Ask { .. }
            | Commands::Interactive
            | Commands::Search { .. }
    );
    let needs_generation = matches!(cli.command, Commands::Ask { .. } | Commands::Interactive);

    if needs_embeddings && !embedder.health().await.unwrap_or(false) {
        eprintln!("Error: embeddings service is not reachable.");
        eprintln!("  Embeddings: {}", embedder.base_url());
        anyhow::bail!("Embeddings service unavailable");
    }

    if needs_generation && !generator.health().await.unwrap_or(false) {
        eprintln!("Error: generation service is not reachable.");
        eprintln!("  Generation: {}", generator.base_url());
        anyhow::bail!("Generation service unavailable");
    }

    let embedder = Arc::new(embedder);
    let config = ChatConfig::from_env();

    match cli.command {
        Commands::Ingest {
            path,
            force,
            prefix,
        } => {
            let librarian = Librarian::new(repo, embedder)
                .with_config(ChunkingConfig::default().with_prefix(prefix));
            cmd_ingest(librarian, &path, force).await?;
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            let agent = build_agent(repo, embedder, generator, config);
            let top_k = top_k.unwrap_or(agent.config().top_k);
            cmd_ask(&agent, &question, top_k, json).await?;
        }
        Commands::Interactive => {
            let agent = build_agent(repo, embedder, generator, config);
            cmd_interactive(&agent).await?;
        }
        Commands::Search { query, limit } => {
            let retriever = VectorRetriever::new(repo, embedder);
            cmd_search(&retriever, &query, limit).await?;
        }
        Commands::Stats => {
            cmd_stats(repo).await?;
        }
        Commands::ResetDb => {
            // Handled before database init.
        }
    }

    Ok(())
}

fn default_db_path() -> Result<PathBuf> {
    let mut path = dirs::home_dir().context("Could not find home directory")?;
    path.push(".guidechat");
    path.push("data");
    Ok(path)
}

fn build_agent(
    repo: Repository,
    embedder: Arc<EmbeddingClient>,
    generator: GenerationClient,
    config: ChatConfig,
) -> ChatAgent {
    let retriever = Arc::new(VectorRetriever::new(repo, embedder));
    ChatAgent::new(
        retriever,
        Arc::new(generator),
        Arc::new(InMemorySessionStore::new()),
        config,
    )
}

fn cmd_reset_db(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove db at {}", path.display()))?;
        println!("✓ Removed database at {}", path.display());
    } else {
        println!("Database not found at {}, nothing to remove", path.display());
    }
    Ok(())
}

async fn cmd_ingest(librarian: Librarian, path: &Path, force: bool) -> Result<()> {
    let report = librarian
        .ingest_file(path, force)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    if report.skipped {
        println!(
            "Index already holds {} chunks. Use --force to re-ingest.",
            report.existing
        );
    } else {
        println!(
            "✓ Indexed {} chunks from {} pages of {}",
            report.chunks,
            report.pages,
            path.display()
        );
    }
    Ok(())
}

async fn cmd_ask(agent: &ChatAgent, question: &str, top_k: usize, json: bool) -> Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let result = agent.chat_with_top_k(&session_id, question, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_answer(&result);
    }
    Ok(())
}

async fn cmd_search(retriever: &VectorRetriever, query: &str, limit: usize) -> Result<()> {
    let results = retriever.search(query, limit).await?;

    if results.is_empty() {
        println!("No results found. Index a document with: guidechat ingest <path>");
        return Ok(());
    }

    println!("Found {} results:\n", results.len());
    for (i, r) in results.iter().enumerate() {
        let preview: String = r.text.chars().take(200).collect();
        println!("{}. {} (page {})", i + 1, r.chunk_id, r.page);
        println!("   Distance: {:.3}", r.distance);
        println!(
            "   {}{}",
            preview,
            if r.text.chars().count() > 200 { "..." } else { "" }
        );
        println!();
    }
    Ok(())
}

async fn cmd_stats(repo: Repository) -> Result<()> {
    let stats = repo.get_stats().await?;

    println!("Index Statistics:");
    println!("  • Chunks: {}", stats.chunk_count);
    println!("  • Pages: {}", stats.page_count);

    Ok(())
}

async fn cmd_interactive(agent: &ChatAgent) -> Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();

    println!("guidechat - Interactive Mode");
    println!("Ask a question, or: history, clear, help, quit");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("guidechat> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        match line.trim() {
            "" => continue,

            "history" => {
                let history = agent.history(&session_id).await?;
                if history.is_empty() {
                    println!("No messages yet.");
                }
                for msg in history {
                    let speaker = match msg.role {
                        Role::User => "You",
                        Role::Assistant => "Assistant",
                    };
                    println!("{}: {}", speaker, msg.content);
                }
            }

            "clear" => {
                agent.clear(&session_id).await?;
                println!("✓ Conversation cleared");
            }

            "help" | "h" | "?" => {
                println!("Commands:");
                println!("  <question>   - Ask about the guideline");
                println!("  history      - Show this conversation");
                println!("  clear        - Forget this conversation");
                println!("  quit         - Exit");
            }

            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                break;
            }

            question => match agent.chat(&session_id, question).await {
                Ok(result) => print_answer(&result),
                Err(e) if e.is_retryable() => {
                    println!("Error: {} (try again shortly)", e)
                }
                Err(e) => println!("Error: {}", e),
            },
        }

        println!();
    }

    Ok(())
}

fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer);

    if result.citations.is_empty() {
        return;
    }

    println!("\nCitations:");
    for (i, c) in result.citations.iter().enumerate() {
        println!("  [{}] {}, page {} ({})", i + 1, c.source, c.page, c.chunk_id);
        if !c.excerpt.is_empty() {
            println!("      \"{}\"", c.excerpt);
        }
    }
}
