use clap::{Parser, Subcommand};
use shelf_core::config::{dir_from_env_value, max_upload_bytes_from_env_value};
use shelf_core::{CoreConfig, DEFAULT_STAGING_DIR, DEFAULT_STATIC_DIR, DEFAULT_UPLOAD_DIR};
use shelf_files::{Strategy, UploadService};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Manage a shelf upload directory without the server")]
struct Cli {
    /// Upload root (falls back to SHELF_UPLOAD_DIR, then "uploads")
    #[arg(long, global = true)]
    upload_dir: Option<PathBuf>,
    /// Staging directory (falls back to SHELF_STAGING_DIR, then ".shelf-staging")
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the direct entries of the upload root as JSON
    List,
    /// Report which paths already exist as files
    Check {
        /// Paths relative to the upload root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Upload a local file
    Put {
        /// File to read
        file: PathBuf,
        /// Target path relative to the upload root (defaults to the file name)
        #[arg(long)]
        path: Option<String>,
        /// Conflict strategy: rename, replace, merge or skip
        #[arg(long, default_value = "rename")]
        strategy: Strategy,
    },
    /// Delete everything left in the staging directory
    Reap,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Nothing to do. Run `shelf --help` for usage.");
        return Ok(());
    };

    let service = open_service(cli.upload_dir, cli.staging_dir)?;

    match command {
        Commands::List => {
            let entries = service.list()?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Check { paths } => {
            let conflicts = service.check_conflicts(paths.as_slice())?;
            if conflicts.is_empty() {
                println!("No conflicts.");
            } else {
                for conflict in conflicts {
                    println!("{} ({} bytes)", conflict.path, conflict.existing_size);
                }
            }
        }
        Commands::Put {
            file,
            path,
            strategy,
        } => {
            let target = match path {
                Some(path) => path,
                None => default_target(&file)?,
            };
            let mut reader = File::open(&file)?;
            match service.ingest(&target, strategy, &mut reader) {
                Ok(outcome) => println!(
                    "{}: {} ({} bytes)",
                    outcome.disposition, outcome.final_relative_path, outcome.size
                ),
                Err(e) => {
                    eprintln!("Error uploading {}: {}", file.display(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Reap => {
            let removed = service.reap()?;
            println!("Removed {} staging entries.", removed);
        }
    }

    Ok(())
}

fn open_service(
    upload_dir: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
) -> Result<UploadService, Box<dyn std::error::Error>> {
    let upload_dir = upload_dir.unwrap_or_else(|| {
        dir_from_env_value(std::env::var("SHELF_UPLOAD_DIR").ok(), DEFAULT_UPLOAD_DIR)
    });
    let staging_dir = staging_dir.unwrap_or_else(|| {
        dir_from_env_value(std::env::var("SHELF_STAGING_DIR").ok(), DEFAULT_STAGING_DIR)
    });
    let max_upload_bytes =
        max_upload_bytes_from_env_value(std::env::var("SHELF_MAX_UPLOAD_BYTES").ok())?;

    let cfg = CoreConfig::new(
        upload_dir,
        staging_dir,
        PathBuf::from(DEFAULT_STATIC_DIR),
        max_upload_bytes,
    )?;
    Ok(UploadService::local(
        cfg.upload_dir().to_path_buf(),
        cfg.staging_dir().to_path_buf(),
        Some(cfg.max_upload_bytes()),
    ))
}

fn default_target(file: &Path) -> Result<String, Box<dyn std::error::Error>> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| format!("cannot derive a target name from {}", file.display()).into())
}
