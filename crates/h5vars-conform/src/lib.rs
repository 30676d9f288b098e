//! Conformance suite for HDF5 variable storage as netCDF-4 uses it.
//!
//! The checks create files with boolean, unlimited-dimension, filtered and
//! explicitly-ordered datasets through [`h5vars`], close them, reopen them
//! read-only and compare what comes back. [`run_suite`] runs the standard
//! sections and prints a report in the classic `*** Checking ...ok.` form.

pub mod config;
pub mod report;
pub mod sections;

use std::io::{self, Write};

pub use config::HarnessConfig;
pub use report::{Abort, Failure, Outcome, Reporter, Section, Step, Summary};
pub use sections::{SectionDef, STANDARD};

/// Record a failure at the call site when `cond` is false, then continue.
#[macro_export]
macro_rules! check {
    ($ctx:expr, $cond:expr) => {
        if !$cond {
            $ctx.fail(file!(), line!(), concat!("check failed: ", stringify!($cond)));
        }
    };
    ($ctx:expr, $cond:expr, $($msg:tt)+) => {
        if !$cond {
            $ctx.fail(file!(), line!(), format!($($msg)+));
        }
    };
}

/// Unwrap a library result; on `Err`, record it at the call site and leave
/// the section.
#[macro_export]
macro_rules! h5 {
    ($ctx:expr, $call:expr) => {
        match $call {
            Ok(value) => value,
            Err(err) => {
                return Err($ctx.abort(
                    file!(),
                    line!(),
                    format!("{} failed: {}", stringify!($call), err),
                ))
            }
        }
    };
}

/// Run `sections` in order, report to `out`, and remove the files they
/// wrote unless the config keeps them.
pub fn run_sections<W: Write>(
    config: &HarnessConfig,
    sections: &[SectionDef],
    out: W,
) -> io::Result<Summary> {
    let mut reporter = Reporter::new(out);
    reporter.heading("Checking HDF5 variable functions.")?;
    for def in sections {
        reporter.run_section(config, def.title, def.run)?;
    }
    let summary = reporter.finish()?;
    if !config.keep_files {
        sections::remove_outputs(config);
    }
    Ok(summary)
}

/// Run the standard suite.
pub fn run_suite<W: Write>(config: &HarnessConfig, out: W) -> io::Result<Summary> {
    run_sections(config, STANDARD, out)
}
