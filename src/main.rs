#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::cast_precision_loss
)]

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ftp_kit::registry::build_client;
use ftp_kit::{Protocol, Settings, TransferClient, TransferConfig, TransferFile};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Endpoint file to use instead of the platform config dir
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Log every protocol step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Ftp,
    Sftp,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Ftp => Self::Ftp,
            ProtocolArg::Sftp => Self::Sftp,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List configured endpoints
    Endpoints,

    /// Add or update an endpoint
    Config {
        /// Endpoint name
        name: String,

        #[arg(long, value_enum)]
        protocol: ProtocolArg,

        #[arg(long)]
        host: String,

        /// Defaults to 21 for ftp and 22 for sftp
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        username: String,

        /// Remote directory every path is relative to
        #[arg(long, default_value = "/")]
        root: String,
    },

    /// Upload files to an endpoint
    Upload {
        endpoint: String,

        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination directory, relative to the endpoint root
        #[arg(short, long, default_value = "")]
        dest: String,
    },

    /// Download a file, or every file in a directory with --all
    Download {
        endpoint: String,

        /// Remote path, relative to the endpoint root
        path: String,

        #[arg(long)]
        all: bool,

        /// Local destination directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },

    /// Delete a file, or every file in a directory with --all
    Delete {
        endpoint: String,

        /// Remote path, relative to the endpoint root
        path: String,

        #[arg(long)]
        all: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => settings.save_to(path),
        None => settings.save(),
    }
}

/// Looks up an endpoint, prompting for its password since it is never saved.
fn open_client(settings: &Settings, name: &str) -> Result<Box<dyn TransferClient>> {
    let mut config = settings
        .endpoints
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("No endpoint named '{}'. Run `ftp-kit endpoints`.", name))?;

    if config.password.is_empty() {
        config.password = rpassword::prompt_password(format!("Password for {}: ", config.endpoint()))?;
    }
    Ok(build_client(config))
}

fn write_local(dest: &Path, file: &TransferFile) -> Result<()> {
    fs::create_dir_all(dest)?;
    let local_path = dest.join(file.name());
    fs::write(&local_path, file.content())
        .with_context(|| format!("could not write {:?}", local_path))?;
    println!(
        "✓ {} ({})",
        local_path.display(),
        human_bytes::human_bytes(file.size() as f64)
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_file = cli.config_file.as_deref();
    let mut settings = load_settings(config_file)?;

    match cli.command {
        Commands::Endpoints => {
            if settings.endpoints.is_empty() {
                println!("No endpoints configured. Add one with `ftp-kit config`.");
            }
            for (name, config) in &settings.endpoints {
                println!(
                    "{:<20} {:<5} {:<40} {}",
                    name,
                    config.protocol,
                    config.endpoint(),
                    config.root
                );
            }
        }
        Commands::Config {
            name,
            protocol,
            host,
            port,
            username,
            root,
        } => {
            let protocol = Protocol::from(protocol);
            let port = port.unwrap_or_else(|| protocol.default_port());
            settings.endpoints.insert(
                name.clone(),
                TransferConfig::new(protocol, host, port, username, String::new(), root),
            );
            save_settings(&settings, config_file)?;
            println!("Endpoint '{}' saved.", name);
        }
        Commands::Upload {
            endpoint,
            files,
            dest,
        } => {
            let mut batch = Vec::with_capacity(files.len());
            for path in &files {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow!("Not a file: {:?}", path))?;
                let content = fs::read(path).with_context(|| format!("could not read {:?}", path))?;
                batch.push(TransferFile::new(dest.clone(), name, content));
            }

            let mut client = open_client(&settings, &endpoint)?;
            client.upload_all(&batch)?;
            let total: u64 = batch.iter().map(TransferFile::size).sum();
            println!(
                "Uploaded {} files ({})",
                batch.len(),
                human_bytes::human_bytes(total as f64)
            );
        }
        Commands::Download {
            endpoint,
            path,
            all,
            dest,
        } => {
            let mut client = open_client(&settings, &endpoint)?;
            if all {
                let files = client.download_all(&path)?;
                for file in &files {
                    write_local(&dest, file)?;
                }
                println!("Downloaded {} files", files.len());
            } else {
                let file = client.download(&path)?;
                write_local(&dest, &file)?;
            }
        }
        Commands::Delete {
            endpoint,
            path,
            all,
        } => {
            let mut client = open_client(&settings, &endpoint)?;
            if all {
                client.delete_all(&path)?;
            } else {
                client.delete(&path)?;
            }
            println!("Deleted {}", path);
        }
    }

    Ok(())
}
