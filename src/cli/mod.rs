use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keepup",
    about = "KeepUp Ingest - Turn podcast, video and article URLs into multilingual summaries",
    version,
    long_about = "Resolves a content URL to its platform (YouTube, bilibili, Apple Podcast, \
                  Spotify, WeChat, generic webpages or local files), fetches the transcript \
                  and metadata, and fans out per-language LLM summarization tasks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a URL or local file end to end
    Ingest {
        /// URL or local transcript file to ingest
        #[arg(value_name = "URL_OR_FILE")]
        url: String,

        /// Languages for the summary artifact ("na" skips the batch)
        #[arg(long, value_delimiter = ',', default_value = "en")]
        summary_languages: Vec<String>,

        /// Languages for the polished-subtitle artifact
        #[arg(long, value_delimiter = ',', default_value = "na")]
        subtitle_languages: Vec<String>,

        /// Languages for the detailed-rewrite artifact
        #[arg(long, value_delimiter = ',', default_value = "na")]
        detailed_languages: Vec<String>,
    },

    /// Resolve a URL to its platform without ingesting it
    Resolve {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// List supported platforms in detection order
    Platforms,

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
