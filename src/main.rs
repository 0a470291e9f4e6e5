use std::process::ExitCode;

fn main() -> ExitCode {
    match tunnelrules::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
