//! Read-side commands: opening a project's index for retrieval, and
//! `projrag context`, which prints the context string for a query without
//! calling the language model.

use anyhow::Result;

use projrag_core::embedding::Embedder;
use projrag_core::models::Neighbor;
use projrag_core::retrieve::{retrieve, Retrieval};

use crate::config::Config;
use crate::embedding;
use crate::project_fs::check_project_name;
use crate::sqlite_index::SqliteIndex;

/// The index and embedder a query needs, opened once per process.
pub struct RetrievalStack {
    pub index: SqliteIndex,
    pub embedder: Box<dyn Embedder>,
}

impl RetrievalStack {
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = embedding::create_embedder(&config.embedding)?;
        let index = SqliteIndex::open(&config.index.path).await?;
        Ok(Self { index, embedder })
    }

    pub async fn retrieve(
        &self,
        config: &Config,
        project: &str,
        query: &str,
    ) -> Result<Retrieval> {
        retrieve(
            &self.index,
            self.embedder.as_ref(),
            project,
            query,
            &config.retrieval.params(),
        )
        .await
    }

    pub async fn close(&self) {
        self.index.close().await;
    }
}

/// Render every ranked neighbor with its distance, closest first.
pub fn format_distances(ranked: &[Neighbor]) -> String {
    let mut out = String::from("Retrieved Documents & Distances:\n");
    for n in ranked {
        out.push_str(&format!("- {}: Distance {:.4}\n", n.id, n.distance));
    }
    out
}

/// `projrag context <project> <query>`
pub async fn run_context(
    config: &Config,
    project: &str,
    query: &str,
    show_distances: bool,
) -> Result<()> {
    check_project_name(project)?;
    let stack = RetrievalStack::open(config).await?;
    let result = stack.retrieve(config, project, query).await;
    stack.close().await;
    let retrieval = result?;

    if show_distances {
        eprint!("{}", format_distances(&retrieval.ranked));
    }
    println!("{}", retrieval.context);

    Ok(())
}
