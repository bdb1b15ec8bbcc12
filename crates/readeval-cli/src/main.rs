//! readeval CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod audio;
mod commands;

#[derive(Parser)]
#[command(name = "readeval", version, about = "Children's reading-aloud assessment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one recording against a target text
    Evaluate {
        /// PCM (16-bit mono) or WAV recording
        #[arg(long)]
        audio: PathBuf,

        /// Text the child was asked to read
        #[arg(long)]
        text: String,

        /// read_syllable, read_word, read_sentence or read_chapter
        #[arg(long, default_value = "read_syllable")]
        category: String,

        /// Output directory (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Extra outputs besides the JSON audit record: csv, text, all
        #[arg(long)]
        format: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the offline mock evaluator
        #[arg(long)]
        mock: bool,
    },

    /// Evaluate recordings that each answer for several characters
    Batch {
        /// One recording per character list or group
        #[arg(long, required = true)]
        audio: Vec<PathBuf>,

        /// Comma-separated characters read in the single recording
        #[arg(long, conflicts_with = "group")]
        characters: Option<String>,

        /// Literacy group ids, one per recording
        #[arg(long)]
        group: Vec<String>,

        /// Reference data file (defaults to the configured or built-in set)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the offline mock evaluator
        #[arg(long)]
        mock: bool,
    },

    /// Decode saved engine markup and print diagnostics
    Decode {
        /// XML markup file
        #[arg(long)]
        markup: PathBuf,

        /// Category the markup was produced for
        #[arg(long, default_value = "read_syllable")]
        category: String,

        /// Output format: text, json, csv
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Evaluate a fluency test: one recording per row and round
    Fluency {
        /// Directory of `round<R>-row<N>.pcm|.wav` recordings
        #[arg(long)]
        recordings: PathBuf,

        /// Reference data file (defaults to the configured or built-in set)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Output directory (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the offline mock evaluator
        #[arg(long)]
        mock: bool,
    },

    /// Validate a reference data file
    Validate {
        /// Reference TOML file; the built-in set when omitted
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Create a starter config and reference file
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "readeval=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            audio,
            text,
            category,
            output,
            format,
            config,
            mock,
        } => commands::evaluate::execute(audio, text, category, output, format, config, mock).await,
        Commands::Batch {
            audio,
            characters,
            group,
            reference,
            config,
            mock,
        } => commands::batch::execute(audio, characters, group, reference, config, mock).await,
        Commands::Decode {
            markup,
            category,
            format,
        } => commands::decode::execute(markup, category, format),
        Commands::Fluency {
            recordings,
            reference,
            output,
            config,
            mock,
        } => commands::fluency::execute(recordings, reference, output, config, mock).await,
        Commands::Validate { reference } => commands::validate::execute(reference),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
