use anyhow::{bail, Context, Result};
use futures::StreamExt;

use crate::cli::config::Config;
use crate::cli::TailArgs;
use crate::connection::{to_ws_url, SourceError, UpdateSource, WebSocketSource};

pub async fn execute_tail(args: TailArgs) -> Result<()> {
    let url = match args.url {
        Some(url) => url,
        None => Config::load()?.connection.url,
    };
    let url = to_ws_url(&url)?;

    eprintln!("Connecting to {}...", url);

    let source = WebSocketSource::new(url);
    let mut stream = source
        .open()
        .await
        .context("Failed to open live channel")?;

    eprintln!("Connected. Press Ctrl+C to stop.\n");

    let mut printed = 0u64;
    while let Some(item) = stream.next().await {
        match item {
            Ok(envelope) => {
                println!("{}", serde_json::to_string(&envelope)?);
                printed += 1;
                if args.limit.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            Err(SourceError::Closed) => {
                eprintln!("Connection closed by server");
                break;
            }
            Err(e) => bail!("Live channel error: {}", e),
        }
    }

    Ok(())
}
