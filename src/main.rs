//! `skillpacks`: inspect skill pack roots, read resources and run scripts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skillpacks::config::Config;
use skillpacks::skillpacks::{SkillError, SkillRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Skill pack loader
#[derive(Parser, Debug)]
#[command(name = "skillpacks")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Skill root to search (repeatable; replaces the configured roots)
    #[arg(long = "root", global = true, env = "SKILLPACKS_ROOTS", value_delimiter = ',')]
    roots: Vec<PathBuf>,

    /// Extra config file merged over the user and project layers
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List loaded packages
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Load every root and report packages that failed to load
    Check,

    /// Show a package's metadata, resources, scripts and instructions
    Show {
        name: String,
        #[arg(long)]
        json: bool,
    },

    /// Print a declared resource of a package
    Read { package: String, resource: String },

    /// Run a package script
    Run {
        package: String,
        script: String,
        /// Override the configured timeout; zero disables it
        #[arg(long)]
        timeout_ms: Option<i64>,
        /// Arguments passed to the script unchanged
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<SkillError>() {
                Some(skill_err) => eprintln!("error: {}", skill_err.public_message()),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load_with(cli.config.as_deref()).context("failed to load config")?;
    if !cli.roots.is_empty() {
        config.skills.roots = Some(cli.roots);
    }

    let registry = SkillRegistry::new(config.skills)?;
    let catalog = registry.catalog();

    match cli.command {
        Commands::List { json } => {
            let packages = registry.list_packages();
            if json {
                println!("{}", serde_json::to_string_pretty(&packages)?);
            } else if packages.is_empty() {
                println!("No skill packs found.");
            } else {
                let width = packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
                for p in &packages {
                    println!("{:width$}  {}", p.name, p.description, width = width);
                }
            }
        }

        Commands::Check => {
            let report = catalog.report();
            println!(
                "{} of {} skill packs loaded",
                report.loaded, report.discovered
            );
            for replaced in &report.replaced {
                println!(
                    "  duplicate '{}': {} replaced by {}",
                    replaced.name,
                    replaced.replaced.display(),
                    replaced.winner.display()
                );
            }
            for failure in &report.failures {
                println!(
                    "  failed {}: {}",
                    failure.dir.display(),
                    failure.error.public_message()
                );
            }
            if !report.failures.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Show { name, json } => {
            let package = catalog
                .get(&name)
                .ok_or(SkillError::PackageNotFound { name })?;
            if json {
                println!("{}", serde_json::to_string_pretty(package)?);
            } else {
                println!("name: {}", package.name);
                println!("description: {}", package.description);
                if let Some(compat) = &package.compatibility {
                    println!("compatibility: {}", compat);
                }
                for (key, value) in &package.metadata {
                    println!("{}: {}", key, value);
                }
                println!("source: {}", package.source_path.display());
                if !package.resources.is_empty() {
                    println!("resources:");
                    for r in &package.resources {
                        println!("  {}", r);
                    }
                }
                if !package.scripts.is_empty() {
                    println!("scripts:");
                    for s in package.scripts.keys() {
                        println!("  {}", s);
                    }
                }
                println!();
                print!("{}", package.body);
            }
        }

        Commands::Read { package, resource } => {
            let content = registry.read_resource(&package, &resource).await?;
            print!("{}", content);
        }

        Commands::Run {
            package,
            script,
            timeout_ms,
            args,
        } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let timeout_ms = timeout_ms.unwrap_or_else(|| registry.config().scripts.timeout_ms());
            let output = registry
                .run_script_with_timeout(&package, &script, &args, timeout_ms, &cancel)
                .await?;
            println!("{}", output.text());
            if output.truncated {
                eprintln!("(output truncated)");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
