use anyhow::Result;
use aqscraper::{cli::Cli, pipeline, Config, ScrapeError};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        if let Some(scrape) = err.downcast_ref::<ScrapeError>() {
            error!(stage = %scrape.stage(), "run failed");
            for candidate in scrape.candidates() {
                warn!(%candidate, "rejected candidate");
            }
        }
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    info!(mode = ?cfg.mode, url = %cfg.url, "startup");

    let report = pipeline::run(&cfg).await?;
    info!(
        rows = report.rows,
        output = %report.output.display(),
        archived = ?report.archived,
        "all done"
    );
    Ok(())
}

fn init_tracing() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
}
