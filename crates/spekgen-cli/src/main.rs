//! Spekgen CLI - generate and check test code for feature files.

mod check;
mod colors;
mod generate;
mod inspect;
mod project;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use spekgen_core::UpToDateCheckingMethod;

#[derive(Parser)]
#[command(name = "spekgen")]
#[command(about = "Generate unit test code from feature files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project folder containing spekgen.toml
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum MethodArg {
    /// Modification times, then the generator version in the header
    Mtime,
    /// Fingerprint of generator version and inputs
    Content,
}

impl From<MethodArg> for UpToDateCheckingMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Mtime => UpToDateCheckingMethod::ModificationTimeAndGeneratorVersion,
            MethodArg::Content => UpToDateCheckingMethod::FileContent,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate test files for feature files
    Generate {
        /// Feature files to generate
        #[arg(required = true)]
        features: Vec<PathBuf>,

        /// Regenerate even if the existing output is up to date
        #[arg(long)]
        force: bool,

        /// Up-to-date checking method (overrides spekgen.toml)
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Print generated code instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether generated files are up to date (exit code 1 if not)
    Check {
        /// Feature files to check
        #[arg(required = true)]
        features: Vec<PathBuf>,

        /// Up-to-date checking method (overrides spekgen.toml)
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },

    /// Show the generator version recorded in a generated file
    DetectVersion {
        /// Feature file whose generated file is inspected
        feature: PathBuf,
    },

    /// Show which generator the project resolves to
    Resolve,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format spekgen-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(spekgen_err) = err.downcast_ref::<spekgen_core::Error>() {
            anyhow::anyhow!("{}", spekgen_err.with_hint())
        } else {
            err
        }
    };

    let code = match cli.command {
        Commands::Generate {
            features,
            force,
            method,
            stdout,
            json,
        } => {
            let options = generate::Options {
                force,
                method: method.map(Into::into),
                stdout,
                json,
            };
            generate::execute(&cli.project, &features, &options).map_err(format_error)?
        }

        Commands::Check { features, method } => {
            check::execute(&cli.project, &features, method.map(Into::into)).map_err(format_error)?
        }

        Commands::DetectVersion { feature } => inspect::detect_version(&cli.project, &feature).map_err(format_error)?,

        Commands::Resolve => inspect::resolve(&cli.project).map_err(format_error)?,
    };

    Ok(code)
}
