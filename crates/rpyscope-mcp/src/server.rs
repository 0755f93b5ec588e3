use anyhow::Result;
use rmcp::{
    ServerHandler,
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool,
};
use rpyscope_index::{AutoIndexer, IndexManager, SymbolHit, SymbolIndex};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct RpyscopeServer {
    manager: Arc<IndexManager>,
    index: Arc<SymbolIndex>,
    auto_indexer: Option<Arc<AutoIndexer>>,
    project_root: PathBuf,
}

impl RpyscopeServer {
    pub fn new(project_root: PathBuf) -> Result<Self> {
        info!("Initializing rpyscope MCP server");
        info!("Project root: {:?}", project_root);

        let index = Arc::new(SymbolIndex::new());
        let manager = Arc::new(IndexManager::new(Arc::clone(&index)));

        let auto_indexer = match AutoIndexer::new(Arc::clone(&manager), project_root.clone()) {
            Ok(indexer) => {
                info!("Auto-indexing enabled");
                Some(Arc::new(indexer))
            }
            Err(e) => {
                info!("Auto-indexing disabled: {}", e);
                None
            }
        };

        Ok(Self {
            manager,
            index,
            auto_indexer,
            project_root,
        })
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Start the background indexing task: one full project scan, then
    /// watcher events every couple of seconds.
    pub fn start_auto_indexer(&self) {
        if let Some(ref auto_indexer) = self.auto_indexer {
            let indexer = Arc::clone(auto_indexer);

            tokio::spawn(async move {
                let scan = Arc::clone(&indexer);
                let initial = tokio::task::spawn_blocking(move || scan.initial_scan()).await;

                match initial {
                    Ok(report) => {
                        info!(
                            "Initial indexing complete: {} files, {} symbols, {} skipped",
                            report.files, report.symbols, report.skipped
                        );
                    }
                    Err(e) => {
                        tracing::error!("Initial indexing task panicked: {}", e);
                    }
                }

                let mut interval = tokio::time::interval(Duration::from_secs(2));
                loop {
                    interval.tick().await;
                    indexer.process_events();
                }
            });

            info!("Auto-indexer background task started");
        }
    }

    fn render_hit(&self, hit: &SymbolHit) -> String {
        let symbol = &hit.symbol;
        let mut output = format!("# {} ({})\n\n", symbol.name, symbol.kind.as_str());

        output.push_str(&format!(
            "📄 {}:{}\n",
            hit.document_id,
            symbol.span.start_line + 1
        ));

        match &symbol.scope.owner {
            Some(owner) => output.push_str(&format!("Declared in `{}`\n", owner)),
            None => output.push_str("Declared at module level\n"),
        }

        if let Some(ref inferred) = symbol.inferred_type {
            output.push_str(&format!("Type: {}\n", inferred));
        }

        if let Some(ref docstring) = symbol.docstring {
            output.push_str(&format!("\n{}\n", docstring));
        }

        output
    }

    fn resolve_document_id(&self, file: &str) -> String {
        let path = PathBuf::from(file);
        if path.is_absolute() {
            return file.to_string();
        }
        self.project_root.join(path).to_string_lossy().to_string()
    }
}

#[tool(tool_box)]
impl RpyscopeServer {
    #[tool(
        name = "rpyscope_lookup",
        description = "Look up a symbol declared in the project's embedded Python by exact name. Returns its kind, declaration site, inferred type, and docstring."
    )]
    pub async fn rpyscope_lookup(&self, #[tool(param)] name: String) -> Result<String, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Symbol name cannot be empty".to_string());
        }

        match self.index.get(name) {
            Some(hit) => Ok(self.render_hit(&hit)),
            None => Ok(format!("Symbol '{}' not found in the index.", name)),
        }
    }

    #[tool(
        name = "rpyscope_symbols",
        description = "List every Python symbol declared in one .rpy script file, in source order."
    )]
    pub async fn rpyscope_symbols(&self, #[tool(param)] file: String) -> Result<String, String> {
        let document_id = self.resolve_document_id(&file);
        let symbols = self.index.symbols_in(&document_id);

        if symbols.is_empty() {
            return Ok(format!("No symbols indexed for '{}'.", file));
        }

        let mut output = format!("{} symbols in {}\n\n", symbols.len(), file);
        for symbol in &symbols {
            output.push_str(&format!(
                "{}:{} {} ({})",
                file,
                symbol.span.start_line + 1,
                symbol.name,
                symbol.kind.as_str()
            ));
            if let Some(ref inferred) = symbol.inferred_type {
                output.push_str(&format!(": {}", inferred));
            }
            output.push('\n');
        }

        Ok(output)
    }

    #[tool(
        name = "rpyscope_stats",
        description = "Show how many documents and symbols the index currently holds."
    )]
    pub async fn rpyscope_stats(&self) -> Result<String, String> {
        let stats = self.index.stats();
        Ok(format!(
            "Documents indexed: {}\nSymbols: {}",
            stats.document_count, stats.symbol_count
        ))
    }

    #[tool(
        name = "rpyscope_reindex",
        description = "Rescan the whole project and rebuild the symbol index from scratch."
    )]
    pub async fn rpyscope_reindex(&self) -> Result<String, String> {
        let Some(ref auto_indexer) = self.auto_indexer else {
            return Err("Auto-indexing is not available for this project".to_string());
        };

        let indexer = Arc::clone(auto_indexer);
        let report = tokio::task::spawn_blocking(move || indexer.initial_scan())
            .await
            .map_err(|e| format!("Reindex task failed: {}", e))?;

        Ok(format!(
            "Reindexed {} files ({} symbols), {} skipped",
            report.files, report.symbols, report.skipped
        ))
    }
}

#[tool(tool_box)]
impl ServerHandler for RpyscopeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "rpyscope".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "rpyscope indexes the Python embedded in Ren'Py scripts. \
                Use rpyscope_lookup to find where a symbol is defined, \
                rpyscope_symbols to list a script's declarations, \
                rpyscope_stats for index counts, and rpyscope_reindex to \
                rebuild the index after large changes."
                    .to_string(),
            ),
        }
    }
}
