use std::path::Path;
use std::process::ExitCode;

use hydroreg_service::batch;
use hydroreg_service::config::Settings;
use hydroreg_service::logging::{self, Stage};

fn main() -> ExitCode {
    // Optional first argument: path to a TOML settings file
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(Path::new(&path)),
        None => Settings::from_env(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = match settings.logging.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init_logger(
        level,
        settings.logging.file.as_deref(),
        settings.logging.console_timestamps,
    ) {
        eprintln!("⚠ Logger already initialised: {}", e);
    }

    println!("🌊 Hydrological series regularization");
    println!("   input:  {}", settings.batch.input_dir.display());
    println!("   output: {}", settings.batch.output_dir.display());

    let report = match batch::run_batch(&settings) {
        Ok(report) => report,
        Err(e) => {
            logging::error(Stage::System, None, &format!("batch aborted: {}", e));
            return ExitCode::FAILURE;
        }
    };

    match batch::write_outputs(&report, &settings.batch.output_dir) {
        Ok(files) => logging::info(
            Stage::System,
            None,
            &format!("wrote {} file(s) to {}", files.len(), settings.batch.output_dir.display()),
        ),
        Err(e) => {
            logging::error(Stage::System, None, &format!("cannot write outputs: {}", e));
            return ExitCode::FAILURE;
        }
    }

    batch::print_summary(&report);
    ExitCode::SUCCESS
}
