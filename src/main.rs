use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use keyenvelope::password::{EnvPasswordProvider, Password};
use keyenvelope::{EnvelopeConfig, EnvelopeManager, EnvelopeRecord};

#[derive(Parser)]
#[command(name = "keyenvelope")]
#[command(about = "Password-protected RSA-OAEP key envelopes")]
#[command(version)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "KEYENVELOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair and export it as a record
    Generate {
        /// Write the record here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Read the password from this file instead of the environment
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Import a record, checking the password and key pair
    Verify {
        #[arg(short, long)]
        record: PathBuf,
        /// Read the password from this file instead of the environment
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Show the public details of a record (no password needed)
    Inspect {
        #[arg(short, long)]
        record: PathBuf,
    },
}

fn read_password(path: Option<&Path>) -> anyhow::Result<Option<Password>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading password file {}", path.display()))?;
    Ok(Some(Password::new(
        contents.trim_end_matches(|c| c == '\n' || c == '\r'),
    )))
}

fn read_record(path: &Path) -> anyhow::Result<EnvelopeRecord> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading record {}", path.display()))?;
    Ok(EnvelopeRecord::from_json(&data)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyenvelope=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EnvelopeConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EnvelopeConfig::default(),
    };
    let passwords = Arc::new(EnvPasswordProvider::new(config.password_env.clone()));
    let manager = EnvelopeManager::new(config, passwords)?;

    match cli.command {
        Commands::Generate { out, password_file } => {
            let password = read_password(password_file.as_deref())?;
            let envelope = manager.generate().await?;
            let record = manager.export(&envelope, password).await?;
            let json = record.to_json()?;

            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing record {}", path.display()))?;
                    info!(path = %path.display(), "Record written");
                }
                None => println!("{json}"),
            }
        }
        Commands::Verify {
            record,
            password_file,
        } => {
            let password = read_password(password_file.as_deref())?;
            let record = read_record(&record)?;
            let envelope = manager.import(&record, password).await?;
            let fingerprint = keyenvelope::codec::encode(envelope.public_key().fingerprint()?);
            println!("ok {fingerprint}");
        }
        Commands::Inspect { record } => {
            let summary = read_record(&record)?.inspect(manager.config().modulus_bits())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
