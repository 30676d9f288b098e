use std::io;
use std::process::ExitCode;

use h5vars_conform::{run_suite, HarnessConfig};

fn main() -> ExitCode {
    env_logger::init();

    let config = HarnessConfig::default();
    match run_suite(&config, io::stdout().lock()) {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(err) => {
            eprintln!("h5vars-conform: cannot write report: {err}");
            ExitCode::from(2)
        }
    }
}
