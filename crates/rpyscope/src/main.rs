use anyhow::Result;
use clap::{Parser, Subcommand};
use rmcp::ServiceExt;
use rpyscope_index::{
    FileEnumerator, FileReader, FsEnumerator, FsReader, IndexManager, SCRIPT_PATTERN, SymbolIndex,
};
use rpyscope_mcp::RpyscopeServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rpyscope")]
#[command(version, about = "Symbol intelligence for Ren'Py script files")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (stdio transport)
    Serve {
        /// Path to the project root (default: current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Index a project directory and print a summary
    Index {
        /// Path to the project to index
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Look up a symbol by exact name
    Lookup {
        /// Symbol name
        name: String,

        /// Path to the project root
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Print the raw hit as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every symbol declared in one script file
    Symbols {
        /// Path to a .rpy file
        file: PathBuf,

        /// Print the symbol list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { project } => serve(project).await,
        Commands::Index { path } => index(&path).await,
        Commands::Lookup {
            name,
            project,
            json,
        } => lookup(&name, &project, json).await,
        Commands::Symbols { file, json } => symbols(&file, json).await,
    }
}

async fn serve(project: Option<PathBuf>) -> Result<()> {
    let project_root = match project {
        Some(path) => absolutize(&path)?,
        None => std::env::current_dir()?,
    };

    info!("Starting rpyscope MCP server");
    info!("Project root: {:?}", project_root);

    let server = RpyscopeServer::new(project_root)?;
    server.start_auto_indexer();

    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

async fn index(path: &Path) -> Result<()> {
    let project_root = absolutize(path)?;
    info!("Indexing project: {:?}", project_root);

    let start = Instant::now();
    let store = Arc::new(SymbolIndex::new());
    let manager = IndexManager::new(Arc::clone(&store));

    let files = FsEnumerator.list(&[project_root], SCRIPT_PATTERN);
    let report = manager.rebuild_all(&[], &files, &FsReader);
    let elapsed = start.elapsed();

    info!("Indexing complete!");
    info!("  Files: {}", report.files);
    info!("  Skipped: {}", report.skipped);
    info!("  Symbols: {}", report.symbols);
    info!("  Time: {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

async fn lookup(name: &str, project: &Path, json: bool) -> Result<()> {
    let project_root = absolutize(project)?;

    let store = Arc::new(SymbolIndex::new());
    let manager = IndexManager::new(Arc::clone(&store));
    let files = FsEnumerator.list(&[project_root], SCRIPT_PATTERN);
    manager.rebuild_all(&[], &files, &FsReader);

    let Some(hit) = store.get(name) else {
        println!("Symbol '{}' not found.", name);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hit)?);
        return Ok(());
    }

    let symbol = &hit.symbol;
    println!("{} ({})", symbol.name, symbol.kind.as_str());
    println!(
        "  defined in {}:{}",
        hit.document_id,
        symbol.span.start_line + 1
    );
    if let Some(ref owner) = symbol.scope.owner {
        println!("  member of {}", owner);
    }
    if let Some(ref inferred) = symbol.inferred_type {
        println!("  type: {}", inferred);
    }
    if let Some(ref docstring) = symbol.docstring {
        println!();
        println!("{}", docstring);
    }

    Ok(())
}

async fn symbols(file: &Path, json: bool) -> Result<()> {
    let path = absolutize(file)?;
    let document_id = path.to_string_lossy().to_string();

    let store = Arc::new(SymbolIndex::new());
    let manager = IndexManager::new(Arc::clone(&store));

    let text = FsReader.read_all(&path)?;
    manager.reindex_from_text(&document_id, &text);

    let symbols = store.symbols_in(&document_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&symbols)?);
        return Ok(());
    }

    if symbols.is_empty() {
        println!("No symbols in {}.", file.display());
        return Ok(());
    }

    for symbol in &symbols {
        let mut line = format!(
            "{}:{} {} ({})",
            file.display(),
            symbol.span.start_line + 1,
            symbol.name,
            symbol.kind.as_str()
        );
        if let Some(ref inferred) = symbol.inferred_type {
            line.push_str(&format!(": {}", inferred));
        }
        println!("{}", line);
    }

    Ok(())
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
