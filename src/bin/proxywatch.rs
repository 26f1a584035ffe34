use clap::Parser;
use proxywatch::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => commands::execute_init(args)?,
        Commands::Serve(args) => {
            if args.json_logs {
                proxywatch::native::init_json_tracing();
            } else {
                proxywatch::native::init_tracing();
            }
            commands::execute_serve(args).await?
        }
        Commands::Trends(args) => commands::execute_trends(args).await?,
        Commands::Tail(args) => commands::execute_tail(args).await?,
    }

    Ok(())
}
