use std::process::ExitCode;

fn main() -> ExitCode {
    athalar::run()
}
