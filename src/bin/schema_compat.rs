//! Schema Compatibility CLI
//!
//! Checks local Avro schemas against a remote schema registry and fails the
//! build on any incompatibility.
//!
//! Usage:
//!   schema-compat check --registry-url http://localhost:8081 \
//!     --subject-pattern '^(?<topicname>.+)-(?<schematypefullname>.+)-value$' \
//!     --dir src/main/avro
//!   schema-compat subjects --registry-url http://localhost:8081
//!   schema-compat init-config

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use schema_compat_gate::discovery::resolve_imports;
use schema_compat_gate::registry::{HttpRegistryClient, RegistryClient};
use schema_compat_gate::{CompatibilityRun, FileSet, GateConfig, ReportFormat, SubjectMatcher};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-compat")]
#[command(about = "Check local Avro schemas against a schema registry for compatibility")]
struct Cli {
    /// Configuration file (schema-compat.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check schema files for compatibility with the registry
    Check {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Base directory of schema files (replaces configured file sets)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Include glob relative to --dir (repeatable)
        #[arg(long, requires = "dir")]
        include: Vec<String>,

        /// Exclude glob relative to --dir (repeatable)
        #[arg(long, requires = "dir")]
        exclude: Vec<String>,

        /// Schema file parsed before all others (repeatable, in order)
        #[arg(long)]
        import: Vec<PathBuf>,

        /// Regex with a `schematypefullname` group extracting the type from a subject
        #[arg(short = 'p', long)]
        subject_pattern: Option<String>,

        /// Report format
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
    },

    /// List registry subjects grouped by the type name the pattern extracts
    Subjects {
        #[command(flatten)]
        registry: RegistryArgs,

        /// Regex with a `schematypefullname` group extracting the type from a subject
        #[arg(short = 'p', long)]
        subject_pattern: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(default_value = "schema-compat.toml")]
        output: String,
    },
}

#[derive(Args)]
struct RegistryArgs {
    /// Schema registry URL (repeatable; tried in order)
    #[arg(short = 'u', long = "registry-url")]
    registry_urls: Vec<String>,

    /// Basic auth credentials as user:password
    #[arg(long)]
    user_info: Option<String>,
}

impl RegistryArgs {
    fn apply(self, config: &mut GateConfig) {
        if !self.registry_urls.is_empty() {
            config.registry.urls = self.registry_urls;
        }
        if self.user_info.is_some() {
            config.registry.user_info = self.user_info;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = GateConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Check {
            registry,
            dir,
            include,
            exclude,
            import,
            subject_pattern,
            format,
        } => {
            registry.apply(&mut config);
            if let Some(dir) = dir {
                config.schemas.file_sets = vec![FileSet {
                    directory: dir,
                    includes: include,
                    excludes: exclude,
                }];
            }
            if !import.is_empty() {
                let cwd = std::env::current_dir().context("failed to read working directory")?;
                config.schemas.imports = resolve_imports(&cwd, &import);
            }
            if let Some(pattern) = subject_pattern {
                config.subjects.name_pattern = pattern;
            }
            if let Some(format) = format {
                config.report.format = format;
            }

            let base_dir = config_base_dir(cli.config.as_deref());
            let plan = CompatibilityRun::from_config(&config, base_dir)?;
            let report = plan.execute_with_config(&config)?;

            match config.report.format {
                ReportFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report.to_json())?);
                }
                ReportFormat::Text => print!("{}", report.render_text()),
            }

            if let Err(e) = report.ensure_compatible() {
                eprintln!("\n❌ {}", e);
                return Ok(ExitCode::FAILURE);
            }
            if !report.is_empty() {
                eprintln!("\n✅ All schemas are compatible with the registry");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Subjects {
            registry,
            subject_pattern,
        } => {
            registry.apply(&mut config);
            if let Some(pattern) = subject_pattern {
                config.subjects.name_pattern = pattern;
            }
            config.validate()?;

            let matcher = SubjectMatcher::new(&config.subjects.name_pattern)?;
            let client = HttpRegistryClient::new(
                &config.registry.urls,
                config.registry.user_info.as_deref(),
                config.registry.cache_capacity,
            )?;
            let subjects = client.list_all_subjects()?;
            let index = matcher.index(&subjects);

            println!("📂 {} subject(s) in registry\n", subjects.len());
            for (type_name, subjects) in index.groups() {
                println!("{}", type_name);
                for subject in subjects {
                    println!("  └─ {}", subject);
                }
            }
            if !index.unresolved().is_empty() {
                println!("\n⚠️  Unresolved (pattern did not match):");
                for subject in index.unresolved() {
                    println!("  - {}", subject);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::InitConfig { output } => {
            config.save(&output)?;
            println!("✅ Configuration written to {}", output);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Directory that relative paths in the configuration file are taken from
fn config_base_dir(config_path: Option<&str>) -> &Path {
    config_path
        .and_then(|path| Path::new(path).parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_requires_dir() {
        assert!(Cli::try_parse_from(["schema-compat", "check", "--include", "**/*.avsc"]).is_err());
        assert!(Cli::try_parse_from([
            "schema-compat",
            "check",
            "--dir",
            "avro",
            "--include",
            "**/*.avsc",
        ])
        .is_ok());
    }

    #[test]
    fn test_config_base_dir() {
        assert_eq!(config_base_dir(None), Path::new("."));
        assert_eq!(config_base_dir(Some("schema-compat.toml")), Path::new("."));
        assert_eq!(config_base_dir(Some("ci/schema-compat.toml")), Path::new("ci"));
    }
}
