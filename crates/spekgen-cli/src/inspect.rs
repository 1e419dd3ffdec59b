//! `detect-version` and `resolve` commands.

use std::path::Path;
use std::process::ExitCode;

use spekgen_core::{Resolution, builtin_version};

use crate::colors;
use crate::project::Project;

/// Print the generator version recorded in a feature's generated file.
pub fn detect_version(project_folder: &Path, feature: &Path) -> anyhow::Result<ExitCode> {
    let project = Project::open(project_folder)?;
    let input = project.input_for(feature)?;

    match project.orchestrator.detect_generated_test_version(&input) {
        Some(version) => println!("{}", version),
        None => println!("{}unknown{}", colors::DIM, colors::RESET),
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the generator the project resolves to.
pub fn resolve(project_folder: &Path) -> anyhow::Result<ExitCode> {
    let project = Project::open(project_folder)?;

    println!("{}Project:{} {}", colors::BOLD, colors::RESET, project.config.project.project_name);
    println!("{}Built-in generator:{} {}", colors::BOLD, colors::RESET, builtin_version());
    match project.orchestrator.resolve() {
        Resolution::Resolved(info) if info.version == *builtin_version() => {
            println!("{}Resolved:{} {} (built in)", colors::BOLD, colors::RESET, info.version);
        }
        Resolution::Resolved(info) => {
            println!(
                "{}Resolved:{} {} at {}",
                colors::BOLD,
                colors::RESET,
                info.version,
                info.location.display()
            );
        }
        Resolution::Unknown(reason) => {
            println!(
                "{}Resolved:{} built-in generator {}({}){}",
                colors::BOLD,
                colors::RESET,
                colors::DIM,
                reason,
                colors::RESET
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
