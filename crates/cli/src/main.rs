use std::process::ExitCode;

fn main() -> ExitCode {
    tenderdeck_cli::run()
}
