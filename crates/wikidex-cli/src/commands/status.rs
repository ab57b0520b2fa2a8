//! `status` command: report reachability and row counts for the label
//! store and vector store (§6, §10.4).

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use wikidex_core::LabelStore;
use wikidex_search::{DistanceMetric, VectorStore, VectorStoreConfig};

use super::{load_config, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also print the resolved configuration.
    #[arg(long = "show-config")]
    show_config: bool,

    /// Emit machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct LabelStoreStatus {
    reachable: bool,
    path: String,
    rows: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct VectorStoreStatus {
    reachable: bool,
    rows: Option<u64>,
    dimension: Option<usize>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    labels: LabelStoreStatus,
    vectorstore: VectorStoreStatus,
}

pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace()?;
    let config = load_config(&global, &workspace)?;

    let labels = match LabelStore::open(&config.labels.db_path) {
        Ok(store) => match store.count() {
            Ok(rows) => LabelStoreStatus {
                reachable: true,
                path: config.labels.db_path.display().to_string(),
                rows: Some(rows),
                error: None,
            },
            Err(err) => LabelStoreStatus {
                reachable: false,
                path: config.labels.db_path.display().to_string(),
                rows: None,
                error: Some(err.to_string()),
            },
        },
        Err(err) => LabelStoreStatus {
            reachable: false,
            path: config.labels.db_path.display().to_string(),
            rows: None,
            error: Some(err.to_string()),
        },
    };

    let vectorstore = {
        let store_config = VectorStoreConfig {
            connection_string: config.vectorstore.connection_string.clone(),
            dimension: config.vectorstore.dimension,
            metric: match config.vectorstore.metric {
                wikidex_config::DistanceMetric::Cosine => DistanceMetric::Cosine,
                wikidex_config::DistanceMetric::Euclidean => DistanceMetric::Euclidean,
            },
            max_connections: 1,
        };
        match VectorStore::connect(store_config).await {
            Ok(store) => match store.count_rows().await {
                Ok(rows) => VectorStoreStatus {
                    reachable: true,
                    rows: Some(rows),
                    dimension: Some(store.dimension()),
                    error: None,
                },
                Err(err) => VectorStoreStatus {
                    reachable: false,
                    rows: None,
                    dimension: None,
                    error: Some(err.to_string()),
                },
            },
            Err(err) => VectorStoreStatus {
                reachable: false,
                rows: None,
                dimension: None,
                error: Some(err.to_string()),
            },
        }
    };

    let report = StatusReport { labels, vectorstore };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize status report")?
        );
    } else {
        print_text(&report);
    }

    if args.show_config {
        println!();
        println!("{}", toml::to_string_pretty(&config).context("failed to serialize config")?);
    }

    Ok(())
}

fn print_text(report: &StatusReport) {
    println!("label store:  {}", &report.labels.path);
    if report.labels.reachable {
        println!("  reachable:  yes");
        println!("  rows:       {}", report.labels.rows.unwrap_or_default());
    } else {
        println!("  reachable:  no");
        if let Some(ref err) = report.labels.error {
            println!("  error:      {err}");
        }
    }

    println!("vector store:");
    if report.vectorstore.reachable {
        println!("  reachable:  yes");
        println!("  rows:       {}", report.vectorstore.rows.unwrap_or_default());
        println!("  dimension:  {}", report.vectorstore.dimension.unwrap_or_default());
    } else {
        println!("  reachable:  no");
        if let Some(ref err) = report.vectorstore.error {
            println!("  error:      {err}");
        }
    }
}
