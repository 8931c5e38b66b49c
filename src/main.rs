use std::process::ExitCode;

fn main() -> ExitCode {
    aotrt_cli::run_cli()
}
