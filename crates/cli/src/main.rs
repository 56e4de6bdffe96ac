use std::process::ExitCode;

fn main() -> ExitCode {
    tailor_cli::run()
}
