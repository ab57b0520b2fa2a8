//! `ingest` command: run the full read -> textify -> embed -> insert
//! pipeline into the vector store (§6, §4.7).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use wikidex_core::{LabelStore, TextifyConfig};
use wikidex_pipeline::{run_ingest, ChunkSink, PipelineConfig, PipelineStats};
use wikidex_search::{VectorStore, VectorStoreConfig};

use super::{create_embedder, load_config, print_info, resolve_workspace};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Path to the NDJSON-in-an-array dump file.
    pub dump: PathBuf,
}

pub async fn execute(args: IngestArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace()?;
    let config = load_config(&global, &workspace)?;

    print_info("opening label store", global.quiet);
    let labels = Arc::new(
        LabelStore::open(&config.labels.db_path).context("failed to open label store")?,
    );

    print_info("connecting to vector store", global.quiet);
    let store_config = VectorStoreConfig {
        connection_string: config.vectorstore.connection_string.clone(),
        dimension: config.vectorstore.dimension,
        metric: to_search_metric(config.vectorstore.metric),
        max_connections: 5,
    };
    let store = VectorStore::connect(store_config)
        .await
        .context("failed to connect to vector store")?;
    store.init().await.context("failed to initialize vector store schema")?;
    let sink: Arc<dyn ChunkSink> = Arc::new(store);

    let embedder = create_embedder(&config)?;

    let pipeline_config = PipelineConfig {
        embed_queue_capacity: config.pipeline.embed_queue_capacity,
        insert_queue_capacity: config.pipeline.insert_queue_capacity,
        embed_batch_size: config.pipeline.embed_batch_size,
    };
    let stats = Arc::new(PipelineStats::new());

    let pb = spinner("ingesting dump...", global.quiet);
    let reporter = spawn_progress_reporter(pb.clone(), stats.clone(), global.quiet);

    let result = run_ingest(
        args.dump,
        labels,
        TextifyConfig::default(),
        embedder,
        sink,
        pipeline_config,
        stats.clone(),
    )
    .await;

    reporter.abort();
    let snap = stats.snapshot();

    match result {
        Ok(()) => {
            finish_spinner(
                pb,
                &format!(
                    "ingested {} entities, inserted {} rows",
                    snap.entities_read, snap.rows_inserted
                ),
            );
        }
        Err(err) => {
            finish_spinner_warn(pb, "ingest aborted");
            return Err(err).context("ingest pipeline failed");
        }
    }

    println!("entities read:      {}", snap.entities_read);
    println!("parse errors:       {}", snap.parse_errors);
    println!("sentences produced: {}", snap.sentences_produced);
    println!("batches embedded:   {}", snap.batches_embedded);
    println!("embed errors:       {}", snap.embed_errors);
    println!("rows inserted:      {}", snap.rows_inserted);
    println!("insert errors:      {}", snap.insert_errors);

    Ok(())
}

fn to_search_metric(metric: wikidex_config::DistanceMetric) -> wikidex_search::DistanceMetric {
    match metric {
        wikidex_config::DistanceMetric::Cosine => wikidex_search::DistanceMetric::Cosine,
        wikidex_config::DistanceMetric::Euclidean => wikidex_search::DistanceMetric::Euclidean,
    }
}

/// Periodically refreshes the spinner message with the latest row count,
/// since `run_ingest` does not return until the whole dump is consumed.
fn spawn_progress_reporter(
    pb: Option<indicatif::ProgressBar>,
    stats: Arc<PipelineStats>,
    quiet: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if quiet {
            return;
        }
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Some(ref pb) = pb {
                let snap = stats.snapshot();
                pb.set_message(format!(
                    "ingesting... {} entities read, {} rows inserted",
                    snap.entities_read, snap.rows_inserted
                ));
            }
        }
    })
}
