//! Implementation of the `tierwatch config check` command.

use crate::cli::ConfigCheckArgs;
use crate::config::Config;
use crate::error::Result;
use crate::exit_codes;
use std::path::Path;

/// Load and validate the config; optionally print it with defaults filled in.
pub fn cmd_config_check(path: &Path, args: &ConfigCheckArgs) -> Result<i32> {
    let config = Config::load_or_default(path)?;
    // Defaults are validated too, since they are what will run.
    config.validate()?;

    if path.exists() {
        println!("Config OK: {}", path.display());
    } else {
        println!("Config file {} not found; defaults are valid", path.display());
    }
    println!(
        "  {} account(s), state in {}",
        config.pool.accounts.len(),
        config.state_dir.display()
    );

    if args.print {
        println!();
        print!("{}", config.to_yaml()?);
    }
    Ok(exit_codes::SUCCESS)
}
