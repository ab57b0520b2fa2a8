//! `build-labels` command: populate the LabelStore from a dump (§6).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use wikidex_core::LabelStore;

use super::{load_config, print_info, resolve_workspace};
use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct BuildLabelsArgs {
    /// Path to the NDJSON-in-an-array dump file.
    pub dump: PathBuf,
}

pub async fn execute(args: BuildLabelsArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace()?;
    let config = load_config(&global, &workspace)?;

    print_info(
        &format!("building label store at {}", config.labels.db_path.display()),
        global.quiet,
    );

    let pb = spinner("reading dump and populating label store...", global.quiet);
    let store = LabelStore::open(&config.labels.db_path)
        .context("failed to open label store")?;
    let stats = store
        .build(args.dump)
        .await
        .context("failed to build label store")?;

    if stats.parse_errors > 0 {
        finish_spinner_warn(
            pb,
            &format!("built label store with {} parse errors", stats.parse_errors),
        );
    } else {
        finish_spinner(pb, "label store built");
    }

    println!("lines read:        {}", stats.lines_read);
    println!("records inserted:  {}", stats.inserted);
    println!("missing label:     {}", stats.missing_label);
    println!("missing desc:      {}", stats.missing_desc);
    println!("dropped too long:  {}", stats.dropped_too_long);
    println!("parse errors:      {}", stats.parse_errors);

    Ok(())
}
