//! envcheck - parameter file reconciliation for self-hosted deployments
//!
//! Compares `.env` profile files against their template, audits and
//! generates secrets files, and manages the profile symlinks.

mod config;
mod envfile;
mod error;
mod profiles;
mod reconcile;
mod secrets;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, ProjectConfig};
use crate::error::EnvError;
use crate::profiles::{link, Profile};
use crate::reconcile::{report, CheckSummary};
use crate::secrets::SecretSchema;

#[derive(Parser)]
#[command(name = "envcheck")]
#[command(version)]
#[command(about = "Reconcile deployment parameter files against their templates", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the parameter files (defaults to current directory)
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    base_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare environment files with the parameters template
    Check(CheckArgs),

    /// Report syntax problems in parameter files
    Lint {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Print a parameter file with every reference expanded
    Resolve {
        /// Environment file to resolve
        #[arg(short, long, value_name = "FILE", default_value = ".env")]
        env_file: PathBuf,

        /// Only print this variable's value
        #[arg(long)]
        name: Option<String>,
    },

    /// Audit or generate the secrets file
    Secrets {
        #[command(subcommand)]
        command: SecretsCommands,
    },

    /// Show, create or remove the symlink behind a profile file
    Link(LinkArgs),

    /// Initialize envcheck configuration for this project
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Environment file to check (overrides profile options)
    #[arg(short, long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Template file to compare against
    #[arg(short, long, value_name = "FILE")]
    template_file: Option<PathBuf>,

    /// Target profile for .env.<profile>, can be repeated
    #[arg(short, long = "profile", value_name = "NAME")]
    profiles: Vec<String>,

    /// Shortcut for --profile production
    #[arg(short = 'P', long)]
    prod: bool,

    /// Shortcut for --profile default, the main .env file
    #[arg(short = 'D', long)]
    default: bool,

    /// Shortcut for --profile staging
    #[arg(short = 'S', long)]
    staging: bool,

    /// Check every existing .env.* file plus the standard profiles
    #[arg(short, long)]
    all_profiles: bool,

    /// Show variables that use different variable references
    #[arg(short = 'd', long)]
    show_definition_changes: bool,

    /// Show variables with different plain values
    #[arg(short = 'v', long)]
    show_value_changes: bool,

    /// Hide variables in target that are not in the template
    #[arg(short = 'q', long)]
    hide_extra_vars: bool,

    /// No output, just the exit code
    #[arg(short, long)]
    silent: bool,

    /// Treat every finding as a failure
    #[arg(long)]
    strict: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Secrets template used to spot exposed passwords
    #[arg(long, value_name = "FILE")]
    secrets_template: Option<PathBuf>,
}

impl CheckArgs {
    fn requested_profiles(&self) -> Result<Vec<Profile>> {
        let mut requested = self
            .profiles
            .iter()
            .map(|name| Profile::parse(name))
            .collect::<Result<Vec<_>, _>>()?;
        if self.prod {
            requested.push(Profile::named("production"));
        }
        if self.default {
            requested.push(Profile::Default);
        }
        if self.staging {
            requested.push(Profile::named("staging"));
        }
        Ok(requested)
    }
}

#[derive(Subcommand)]
enum SecretsCommands {
    /// Check the secrets file against its template
    Check {
        /// Secrets file to check
        #[arg(short = 'e', long, value_name = "FILE")]
        secrets_file: Option<PathBuf>,

        /// Secrets template file
        #[arg(short, long, value_name = "FILE")]
        template_file: Option<PathBuf>,

        /// No output, just the exit code
        #[arg(short, long)]
        silent: bool,

        /// Accept placeholder values from the template
        #[arg(long)]
        allow_example_values: bool,

        /// Print the findings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add missing secrets to the secrets file
    Generate {
        /// Secrets template file
        #[arg(short, long, value_name = "FILE")]
        template_file: Option<PathBuf>,

        /// Secrets file to create or extend
        secrets_file: Option<PathBuf>,
    },
}

#[derive(Args)]
struct LinkArgs {
    /// Parameters file the profile should point to
    params_file: Option<PathBuf>,

    /// Remove the profile symlink
    #[arg(short, long, conflicts_with = "params_file")]
    delete: bool,

    /// Profile to manage (defaults to .env)
    #[arg(short, long, value_name = "NAME")]
    profile: Option<String>,

    /// Shortcut for --profile production
    #[arg(short = 'P', long, conflicts_with_all = ["profile", "staging"])]
    prod: bool,

    /// Shortcut for --profile staging
    #[arg(short = 'S', long, conflicts_with = "profile")]
    staging: bool,
}

impl LinkArgs {
    fn profile(&self) -> Result<Profile> {
        if self.prod {
            return Ok(Profile::named("production"));
        }
        if self.staging {
            return Ok(Profile::named("staging"));
        }
        match &self.profile {
            Some(name) => Ok(Profile::parse(name)?),
            None => Ok(Profile::Default),
        }
    }
}

fn setup_logging(verbosity: u8) -> tracing_appender::non_blocking::WorkerGuard {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_target(false))
        .init();

    guard
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive for the duration of the program
    let _logging_guard = setup_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run a command; `Ok(false)` means it found problems.
fn run(cli: Cli) -> Result<bool> {
    let base = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config_path = cli
        .config
        .or_else(|| Config::default_path().filter(|path| path.exists()));

    let mut config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(project) = ProjectConfig::load(&base)? {
        tracing::debug!(project = %project.project.name, "loaded project configuration");
        config = config.with_project(&project);
    }

    match cli.command {
        Commands::Check(args) => check(&base, &config, &args),
        Commands::Lint { files } => lint(&base, &files),
        Commands::Resolve { env_file, name } => resolve(&base.join(env_file), name.as_deref()),
        Commands::Secrets { command } => match command {
            SecretsCommands::Check {
                secrets_file,
                template_file,
                silent,
                allow_example_values,
                json,
            } => {
                let secrets_file = base.join(secrets_file.unwrap_or(config.paths.secrets_file));
                let template = base.join(template_file.unwrap_or(config.paths.secrets_template));
                check_secrets(&secrets_file, &template, silent, json, allow_example_values)
            }
            SecretsCommands::Generate {
                template_file,
                secrets_file,
            } => {
                let secrets_file = base.join(secrets_file.unwrap_or(config.paths.secrets_file));
                let template = base.join(template_file.unwrap_or(config.paths.secrets_template));
                generate_secrets(&secrets_file, &template)
            }
        },
        Commands::Link(args) => manage_link(&base, &args),
        Commands::Init { force } => {
            config::init_project_config(&base, force)?;
            Ok(true)
        }
    }
}

fn check(base: &Path, config: &Config, args: &CheckArgs) -> Result<bool> {
    let requested = args.requested_profiles()?;
    let env_files = profiles::env_files(
        base,
        &requested,
        args.all_profiles,
        args.env_file.as_deref(),
    )?;

    let mut options = config.check;
    options.show_definition_changes |= args.show_definition_changes;
    options.show_value_changes |= args.show_value_changes;
    options.hide_extra_vars |= args.hide_extra_vars;
    options.strict |= args.strict;

    let template_path = base.join(
        args.template_file
            .as_deref()
            .unwrap_or(&config.paths.template_file),
    );
    let template = envfile::read(&template_path).context("Cannot read the template file")?;

    let schema_path = base.join(
        args.secrets_template
            .as_deref()
            .unwrap_or(&config.paths.secrets_template),
    );
    let schema = SecretSchema::load_optional(&schema_path)?;

    let verbose_output = !args.silent && !args.json;
    let multiple = env_files.len() > 1;
    let mut summary = CheckSummary::default();

    for (i, env_file) in env_files.iter().enumerate() {
        if multiple && verbose_output {
            if i > 0 {
                println!("\n{}\n", "=".repeat(60));
            }
            println!(
                "📁 Checking file {} of {}: {}",
                i + 1,
                env_files.len(),
                env_file.display()
            );
            println!();
        }

        let outcome = reconcile::reconcile_file(&template, &schema, options, env_file);
        match &outcome {
            Err(e) if !args.silent => eprintln!("Error: {e}"),
            Ok(report) if verbose_output => {
                report::print_header(env_file, &template_path);
                report::print_report(report);
            }
            _ => {}
        }
        summary.record(env_file, outcome, options.strict);
    }

    if args.json && !args.silent {
        println!("{}", report::to_json(&summary.reports, options.strict)?);
    }

    if !summary.is_success() {
        if verbose_output {
            let names: Vec<String> = summary
                .problem_files
                .iter()
                .map(|path| link::file_name(path))
                .collect();
            println!(
                "\n❌ The following environment files have issues: {}",
                names.join(", ")
            );
        }
        return Ok(false);
    }
    if verbose_output && multiple {
        println!("\n✅ All {} environment files are valid!", env_files.len());
    }
    Ok(true)
}

fn lint(base: &Path, files: &[PathBuf]) -> Result<bool> {
    let mut clean = true;
    for file in files {
        let path = base.join(file);
        let source = std::fs::read_to_string(&path)
            .map_err(|e| EnvError::io(&path, e))
            .context("Cannot lint file")?;

        for issue in envfile::syntax::check_source(&source) {
            println!("{}: {}", file.display(), issue);
            clean = false;
        }
    }
    Ok(clean)
}

fn resolve(env_file: &Path, name: Option<&str>) -> Result<bool> {
    let file = envfile::read(env_file)?;
    let values = file
        .resolved()
        .with_context(|| format!("Cannot resolve {}", env_file.display()))?;

    match name {
        Some(name) => match values.get(name) {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("'{name}' is not set in {}", env_file.display()),
        },
        None => {
            for (name, value) in &values {
                println!("{name}={value}");
            }
        }
    }
    Ok(true)
}

fn check_secrets(
    secrets_file: &Path,
    template: &Path,
    silent: bool,
    json: bool,
    allow_example_values: bool,
) -> Result<bool> {
    let schema = SecretSchema::load(template).context("Cannot read the secrets template")?;
    let secrets = envfile::read(secrets_file).context("Cannot read the secrets file")?;
    let verbose_output = !silent && !json;

    if verbose_output {
        println!("Checking secrets file:");
        println!("  Target:   {}", link::describe_path(secrets_file));
        println!("  Template: {}", link::describe_path(template));
        println!();
    }

    let audit = secrets::validate::audit(
        &schema,
        &secrets,
        envfile::syntax::check_file(secrets_file),
        allow_example_values,
    );
    if json && !silent {
        println!("{}", secrets::validate::to_json(&audit)?);
    } else if verbose_output {
        secrets::validate::print_audit(&audit);
    }
    Ok(!audit.has_critical())
}

fn generate_secrets(secrets_file: &Path, template: &Path) -> Result<bool> {
    let schema = SecretSchema::load(template).context("Cannot read the secrets template")?;
    if schema.is_empty() {
        tracing::warn!(template = %template.display(), "template declares no typed secrets");
    }
    let outcome = secrets::generate::generate_secrets_file(&schema, secrets_file)
        .context("Error generating secrets")?;

    if outcome.added.is_empty() {
        eprintln!("All secrets already exist in {}", secrets_file.display());
    } else {
        eprintln!(
            "Added {} new secrets to {}",
            outcome.added.len(),
            secrets_file.display()
        );
    }

    if !outcome.external.is_empty() {
        eprintln!("\n❌  EXTERNAL SECRETS REQUIRED:");
        eprintln!("The following secrets are externally generated and must be manually added:");
        for name in &outcome.external {
            eprintln!(
                "  - {name}: Edit {} to provide this value",
                secrets_file.display()
            );
        }
        eprintln!(
            "\nPlease edit {} and set values for these external secrets.",
            secrets_file.display()
        );
    }
    Ok(true)
}

fn manage_link(base: &Path, args: &LinkArgs) -> Result<bool> {
    let env = args.profile()?.env_path(base);
    let name = link::file_name(&env);

    if args.delete {
        return match link::delete(&env) {
            Ok(previous) => {
                println!("{name} was previously pointing to {}", previous.display());
                println!("Removed symlink");
                Ok(true)
            }
            Err(EnvError::NotFound { .. }) => {
                eprintln!("No {name} found");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        };
    }

    let Some(params) = &args.params_file else {
        if link::print_status(&env)? {
            return Ok(true);
        }
        eprintln!("Set by running this command with a parameters file. Potential options:");
        let candidates = link::candidate_files(base)?;
        if candidates.is_empty() {
            println!("No .env files found in {}", base.display());
        } else {
            println!("Available environment files:");
            for candidate in candidates {
                println!("  {candidate}");
            }
        }
        return Ok(false);
    };

    match link::create(params, &env) {
        Ok(link::LinkOutcome::Replaced { previous }) => {
            println!("{name} was previously pointing to {}", previous.display());
        }
        Ok(_) => {}
        Err(EnvError::NotFound { .. }) => {
            anyhow::bail!(
                "Cannot find {} to use as new environment file",
                params.display()
            );
        }
        Err(e) => return Err(e.into()),
    }
    link::print_status(&env)?;
    Ok(true)
}
