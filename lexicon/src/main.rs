//! Arabic root mnemonics from the command line.
//!
//! Generates a mnemonic story, an illustration, vocalized Arabic and
//! pronunciation audio for one fiber optic term.
//!
//! ```bash
//! cargo run -p lexicon -- --term Splicing --provider ideogram
//! cargo run -p lexicon -- --custom "Patch Cord" --root S-L-K --meaning "Wire" --arabic "سلك"
//! cargo run -p lexicon -- --interactive
//! ```

mod interactive;
mod render;

use clap::Parser;
use lexicon_core::{registry, LexiconConfig, Pipeline, ProviderChoice, TermEntry};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lexicon")]
#[command(version)]
#[command(about = "Arabic root mnemonics for fiber optic vocabulary")]
struct Cli {
    /// Registry term to generate (see --list)
    #[arg(short, long, conflicts_with = "custom")]
    term: Option<String>,

    /// Custom term; pair with --root, --meaning and --arabic
    #[arg(long)]
    custom: Option<String>,

    /// Root consonants of the custom term, e.g. S-L-K
    #[arg(long, requires = "custom")]
    root: Option<String>,

    /// Literal meaning of the custom root
    #[arg(long, requires = "custom")]
    meaning: Option<String>,

    /// Arabic script of the custom term
    #[arg(long, requires = "custom")]
    arabic: Option<String>,

    /// Image provider: dalle, ideogram or vertex
    #[arg(short, long, env = "LEXICON_PROVIDER", default_value = "dalle")]
    provider: ProviderChoice,

    /// Write the illustration to this file
    #[arg(long)]
    save_image: Option<PathBuf>,

    /// List registry terms and exit
    #[arg(short, long)]
    list: bool,

    /// Prompt for terms in a loop
    #[arg(short, long)]
    interactive: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn entry(&self) -> Result<TermEntry, String> {
        if let Some(term) = &self.custom {
            return Ok(TermEntry::new(
                term.as_str(),
                self.root.clone().unwrap_or_default(),
                self.meaning.clone().unwrap_or_default(),
                self.arabic.clone().unwrap_or_default(),
            ));
        }
        match &self.term {
            Some(term) => find_entry(term)
                .ok_or_else(|| format!("Unknown term '{term}'. Use --list to see the registry.")),
            None => Err("Specify --term, --custom or --interactive (see --help).".to_string()),
        }
    }
}

/// Resolve a registry term by name (case-insensitive) or 1-based index.
pub(crate) fn find_entry(input: &str) -> Option<TermEntry> {
    let input = input.trim();
    if let Ok(index) = input.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| registry::entries().nth(i));
    }
    registry::entries().find(|entry| entry.term.eq_ignore_ascii_case(input))
}

pub(crate) fn print_registry() {
    println!("Registry terms:");
    for (i, entry) in registry::entries().enumerate() {
        println!(
            "  {}. {} | root {} ({}) | {}",
            i + 1,
            entry.term,
            entry.root,
            entry.root_meaning,
            entry.arabic
        );
    }
}

/// Run the pipeline for one term and print the outcome. Returns whether it completed.
pub(crate) async fn generate(
    pipeline: &Pipeline,
    http: &reqwest::Client,
    entry: &TermEntry,
    provider: ProviderChoice,
    save_image: Option<&Path>,
) -> bool {
    println!("Generating {} via {}...", entry.term, provider);

    match pipeline.run(entry, provider).await {
        Ok(result) => {
            render::print_result(&result);
            if let (Some(path), Some(image)) = (save_image, &result.image) {
                match render::save_image(http, image, path).await {
                    Ok(bytes) => println!("Saved image ({bytes} bytes) to {}", path.display()),
                    Err(e) => println!("[ERROR] Could not save image: {e}"),
                }
            }
            true
        }
        Err(e) => {
            render::print_failure(&e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lexicon={log_level},lexicon_core={log_level},openai={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.list {
        print_registry();
        return Ok(());
    }

    let config = match LexiconConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}.");
            eprintln!("Please set it in .env file or with: export OPENAI_API_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::from_config(&config).with_observer(render::progress);
    let http = config.http_client();
    tracing::debug!(providers = ?pipeline.available_providers(), "pipeline ready");

    if cli.interactive {
        return interactive::run_interactive(&pipeline, &http, cli.provider)
            .await
            .map_err(|e| e.into());
    }

    let entry = match cli.entry() {
        Ok(entry) => entry,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    if !generate(&pipeline, &http, &entry, cli.provider, cli.save_image.as_deref()).await {
        std::process::exit(1);
    }
    Ok(())
}
