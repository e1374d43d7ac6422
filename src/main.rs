use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedbridge::config::Config;
use feedbridge::publish::{Publisher, RunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "feedbridge",
    about = "Republish a podcast feed with Spotify tags when its episodes change"
)]
struct Args {
    /// Config file (missing file means defaults)
    #[arg(long, value_name = "FILE", default_value = "feedbridge.toml")]
    config: PathBuf,

    /// Source feed URL (overrides config)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Output feed path (overrides config)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Commit message path (overrides config)
    #[arg(long, value_name = "FILE")]
    commit_message: Option<PathBuf>,

    /// Report changes without writing any file
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.feed_url = url.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(path) = &self.commit_message {
            config.commit_message_path = path.clone();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    args.apply(&mut config);

    println!("Fetching {} ...", config.feed_url);
    let publisher = Publisher::new(config)?.dry_run(args.dry_run);

    match publisher.run().await? {
        RunOutcome::Unchanged => {
            println!("No new episodes, feed unchanged. Skipping write.");
        }
        RunOutcome::DryRun(report) => {
            println!("{}", report.title);
            println!("{}", report.body);
            println!("Dry run: no files written.");
        }
        RunOutcome::Published(report) => {
            println!("{}", report.title);
            println!("{}", report.body);
            println!(
                "Feed updated: {}",
                publisher.config().output_path.display()
            );
        }
    }

    Ok(())
}
