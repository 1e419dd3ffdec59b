//! Check command implementation for Spekgen CLI.
//!
//! Reports feature files whose generated code is missing or stale,
//! without writing anything.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use spekgen_core::UpToDateCheckingMethod;

use crate::colors;
use crate::project::Project;

pub fn execute(
    project_folder: &Path,
    features: &[PathBuf],
    method: Option<UpToDateCheckingMethod>,
) -> anyhow::Result<ExitCode> {
    let project = Project::open(project_folder)?;

    let mut settings = project.config.generation.clone();
    settings.check_up_to_date = true;
    settings.write_result_to_file = false;
    if let Some(method) = method {
        settings.up_to_date_checking_method = method;
    }

    let mut outdated = 0;
    for feature in features {
        let input = project.input_for(feature)?;
        let result = project.orchestrator.generate_test_file(&input, &settings);
        let name = input.relative_path_string();

        if !result.success {
            outdated += 1;
            eprintln!("{}Failed{} {}", colors::RED, colors::RESET, name);
            for error in &result.errors {
                eprintln!("  {}", error.message);
            }
        } else if result.is_up_to_date == Some(true) {
            println!("{}Up to date{} {}", colors::GREEN, colors::RESET, name);
        } else {
            outdated += 1;
            println!("{}Outdated{} {}", colors::YELLOW, colors::RESET, name);
        }
    }
    project.orchestrator.dispose();

    if outdated > 0 {
        println!(
            "\n{}{} of {} file(s) need regeneration{}",
            colors::BOLD,
            outdated,
            features.len(),
            colors::RESET
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
