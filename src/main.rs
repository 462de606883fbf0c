use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keepup_ingest::pipeline::{IngestSubmission, Orchestrator, TaskOutcome};
use keepup_ingest::{Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "keepup_ingest=debug"
    } else {
        "keepup_ingest=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Ingest {
            url,
            summary_languages,
            subtitle_languages,
            detailed_languages,
        } => {
            let orchestrator = Orchestrator::from_config(&config)?;

            tracing::info!("Starting ingestion for URL: {}", url);
            let record = orchestrator
                .process(&IngestSubmission {
                    url,
                    summary_languages,
                    subtitle_languages,
                    detailed_languages,
                })
                .await?;

            match record.error {
                Some(message) => {
                    println!("Ingestion failed: {message}");
                    std::process::exit(1);
                }
                None => {
                    println!("Ingestion finished: {}", record.external_status());
                    for result in &record.results {
                        let (state, note) = match &result.outcome {
                            TaskOutcome::Success(note) => ("ok", note.clone()),
                            TaskOutcome::Failure(reason) => ("failed", reason.clone()),
                            TaskOutcome::Skipped => ("skipped", String::new()),
                        };
                        println!(
                            "  {} [{}] {} {}",
                            result.kind.as_str(),
                            result.language,
                            state,
                            note
                        );
                    }
                }
            }
        }
        Commands::Resolve { url } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            match orchestrator.resolver().resolve(&url).await? {
                Some(resolution) => {
                    println!("Platform: {}", resolution.platform);
                    println!("Channel: {}", resolution.platform.channel().as_str());
                    println!("Resolved URL: {}", resolution.resolved_url);
                }
                None => {
                    println!("No platform detector matched: {url}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Platforms => {
            let orchestrator = Orchestrator::from_config(&config)?;
            println!("Supported platforms, in detection order:");
            for name in orchestrator.resolver().list_platforms() {
                println!("  • {name}");
            }
            println!("  • Local transcript files (txt, md, srt, vtt)");
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written; edit it manually to add credentials.");
            }
        }
    }

    Ok(())
}
