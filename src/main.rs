use std::process::ExitCode;

use issuelens::ui::output;

fn main() -> ExitCode {
    match issuelens::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
