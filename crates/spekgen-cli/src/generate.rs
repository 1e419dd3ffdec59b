//! Generate command implementation for Spekgen CLI.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use spekgen_core::{GenerationResult, UpToDateCheckingMethod};

use crate::colors;
use crate::project::Project;

/// Command-line options of `spekgen generate`.
pub struct Options {
    pub force: bool,
    pub method: Option<UpToDateCheckingMethod>,
    pub stdout: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct FileReport<'a> {
    feature: String,
    #[serde(flatten)]
    result: &'a GenerationResult,
}

/// Generate test files.
pub fn execute(project_folder: &Path, features: &[PathBuf], options: &Options) -> anyhow::Result<ExitCode> {
    let project = Project::open(project_folder)?;

    let mut settings = project.config.generation.clone();
    settings.write_result_to_file = !options.stdout;
    if options.force {
        settings.check_up_to_date = false;
    }
    if let Some(method) = options.method {
        settings.up_to_date_checking_method = method;
    }

    let mut results = Vec::with_capacity(features.len());
    for feature in features {
        let input = project.input_for(feature)?;
        let result = project.orchestrator.generate_test_file(&input, &settings);
        results.push((input.relative_path_string(), result));
    }
    project.orchestrator.dispose();

    let failed = results.iter().filter(|(_, r)| !r.success).count();

    if options.json {
        let reports: Vec<_> = results
            .iter()
            .map(|(feature, result)| FileReport {
                feature: feature.clone(),
                result,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (feature, result) in &results {
            print_result(feature, result, options.stdout);
        }
        if results.len() > 1 {
            println!(
                "\n{} file(s), {}{} failed{}",
                results.len(),
                if failed > 0 { colors::RED } else { colors::DIM },
                failed,
                colors::RESET
            );
        }
    }

    Ok(if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_result(feature: &str, result: &GenerationResult, to_stdout: bool) {
    if !result.success {
        eprintln!("{}Failed{} {}", colors::RED, colors::RESET, feature);
        for error in &result.errors {
            eprintln!("  {}", error.message);
        }
        return;
    }

    match (&result.generated_test_code, to_stdout) {
        (Some(code), true) => {
            print!("{}", code);
            colors::flush_stdout();
        }
        (Some(_), false) => println!("{}Generated{} {}", colors::GREEN, colors::RESET, feature),
        (None, _) => println!("{}Up to date{} {}", colors::DIM, colors::RESET, feature),
    }
}
