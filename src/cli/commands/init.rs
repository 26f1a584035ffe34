use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::config::Config;
use crate::cli::InitArgs;

pub fn execute_init(args: InitArgs) -> Result<()> {
    let path = Path::new(&args.path);
    if path.exists() && !args.force {
        bail!("{} already exists. Use --force to overwrite.", path.display());
    }

    let config = Config::default();
    config.save_to(path)?;

    eprintln!("Created {}", path.display());
    eprintln!("  connection.url: {}", config.connection.url);
    eprintln!("  server.listen: {}", config.server.listen);
    eprintln!();
    eprintln!("Next: proxywatch serve");

    Ok(())
}
