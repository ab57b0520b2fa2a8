//! `config` command: view and manage layered configuration (§10.3, §10.4).

use anyhow::{Context, Result};
use clap::Subcommand;
use wikidex_config::ConfigLoader;

use super::{load_config, resolve_workspace};
use crate::GlobalOptions;

/// Configuration management commands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully merged configuration (global -> local -> CLI overrides).
    Show,

    /// Create `~/.wikidex/config.toml` with default values if it does not exist.
    InitGlobal,

    /// Create `.wikidex/config.toml` in the current workspace if it does not exist.
    InitLocal,

    /// Print the paths configuration is loaded from.
    Paths,
}

pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace()?;

    match cmd {
        ConfigCommand::Show => {
            let config = load_config(&global, &workspace)?;
            println!(
                "{}",
                toml::to_string_pretty(&config).context("failed to serialize configuration")?
            );
        }
        ConfigCommand::InitGlobal => {
            let loader = ConfigLoader::new();
            let path = loader.init_global().context("failed to initialize global config")?;
            println!("wrote {}", path.display());
        }
        ConfigCommand::InitLocal => {
            let loader = ConfigLoader::new();
            let path = loader
                .init_local(&workspace)
                .context("failed to initialize local config")?;
            println!("wrote {}", path.display());
        }
        ConfigCommand::Paths => {
            let loader = ConfigLoader::new();
            if let Some(global_path) = loader.global_config_path() {
                println!("global: {}", global_path.display());
            } else {
                println!("global: (no home directory found)");
            }
            println!("local:  {}", loader.local_config_path(&workspace).display());
        }
    }

    Ok(())
}
