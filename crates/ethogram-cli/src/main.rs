mod display;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ethogram_core::{AnnotationSpan, CompiledConfig, ConfigSource};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ethogram", version)]
#[command(about = "Structured records and alerts from spoken animal observations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a configuration and report what it declares
    Check {
        /// Configuration file (JSON)
        config: PathBuf,
    },

    /// Print the built-in configuration
    DefaultConfig,

    /// Extract entities from one observation
    Extract {
        /// Configuration file; the built-in configuration when omitted
        #[arg(short, long, env = "ETHOGRAM_CONFIG")]
        config: Option<PathBuf>,

        /// Annotation spans (JSON array of {start, end, type, normalizedText})
        #[arg(short, long)]
        spans: Option<PathBuf>,

        /// Observation text
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the observation from a file ("-" for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Card,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { config } => check(&config),
        Commands::DefaultConfig => {
            print!("{}", ConfigSource::builtin_json());
            Ok(())
        }
        Commands::Extract {
            config,
            spans,
            text,
            file,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            let text = read_text(text, file.as_deref())?;
            let spans = match spans {
                Some(path) => read_spans(&path)?,
                None => Vec::new(),
            };

            let extraction = ethogram_engine::extract(&text, &spans, &config);
            for reason in &extraction.degraded {
                warn!(%reason, "extraction degraded");
            }

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&extraction.to_json())?),
                Format::Card => print!("{}", display::render_card(&extraction, &config)),
            }
            Ok(())
        }
    }
}

fn check(path: &Path) -> Result<()> {
    let source = ConfigSource::from_path(path)?;
    let config = CompiledConfig::compile(&source)
        .with_context(|| format!("compiling {}", path.display()))?;

    info!(path = %path.display(), "configuration ok");
    print!("{}", display::render_summary(&config));
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CompiledConfig> {
    let source = match path {
        Some(path) => ConfigSource::from_path(path)?,
        None => ConfigSource::builtin().context("parsing built-in configuration")?,
    };
    Ok(CompiledConfig::compile(&source)?)
}

fn read_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) if path == Path::new("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading observation from stdin")?;
            Ok(buf)
        }
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        (None, None) => bail!("either --text or --file is required"),
    }
}

fn read_spans(path: &Path) -> Result<Vec<AnnotationSpan>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing spans in {}", path.display()))
}
