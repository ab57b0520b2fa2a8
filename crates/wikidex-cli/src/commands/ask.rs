//! `ask` command: run the RAG retriever and hand the assembled context to
//! an LLM adapter (§6, §4.8).

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use wikidex_rag::{Answerer, ContextOrder, RagConfig, Retriever};
use wikidex_search::{Reranker, VectorStore, VectorStoreConfig};

use super::{create_embedder, create_llm_adapter, load_config, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask. Omit to start an interactive REPL.
    pub query: Option<String>,
}

pub async fn execute(args: AskArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace()?;
    let config = load_config(&global, &workspace)?;

    let embedder = create_embedder(&config)?;
    let llm = create_llm_adapter(&config)?;

    let store_config = VectorStoreConfig {
        connection_string: config.vectorstore.connection_string.clone(),
        dimension: config.vectorstore.dimension,
        metric: match config.vectorstore.metric {
            wikidex_config::DistanceMetric::Cosine => wikidex_search::DistanceMetric::Cosine,
            wikidex_config::DistanceMetric::Euclidean => wikidex_search::DistanceMetric::Euclidean,
        },
        max_connections: 5,
    };
    let store = Arc::new(
        VectorStore::connect(store_config)
            .await
            .context("failed to connect to vector store")?,
    );

    let reranker = Reranker::new(&config.reranker.model, config.reranker.max_tokens)
        .context("failed to load reranker")?;

    let rag_config = RagConfig {
        retrieval_k: config.reranker.max_candidates,
        context_k: config.reranker.context_k,
        order: ContextOrder::default(),
        source_url_template: wikidex_rag::DEFAULT_SOURCE_URL_TEMPLATE.to_string(),
    };
    let retriever = Retriever::new(embedder, store, reranker, rag_config);
    let answerer = Answerer::new(retriever, llm);

    match args.query {
        Some(query) => answer_one(&answerer, &query).await,
        None => repl(&answerer).await,
    }
}

async fn answer_one(answerer: &Answerer, query: &str) -> Result<()> {
    let answer = answerer.ask(query).await.context("failed to answer query")?;
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  {source}");
        }
    }
    Ok(())
}

async fn repl(answerer: &Answerer) -> Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }

        if let Err(err) = answer_one(answerer, query).await {
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}
