use anyhow::Result;
use clap::Parser;
use okrsync_sync::RunProgress;

#[derive(Debug, Parser)]
#[command(name = "okrsync", version)]
#[command(about = "Sync Linear project activity into Notion OKR rows")]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing()?;

    let summary = okrsync_sync::run_sync_once_from_env(|progress| match progress {
        RunProgress::RowsFound(count) => {
            println!("Found {count} OKR rows with Linear project URLs")
        }
        RunProgress::RowDone(outcome) => println!("{outcome}"),
    })
    .await?;
    println!(
        "sync complete: run_id={} updated={} skipped={} failed={}",
        summary.run_id, summary.updated, summary.skipped, summary.failed
    );

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("OKRSYNC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
