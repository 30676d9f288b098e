//! Failure bookkeeping and the textual report.
//!
//! Each section runs against a [`Section`] context. Failed checks are
//! recorded and the section carries on; a failed library call records a
//! failure and ends the section by returning [`Abort`]. The [`Reporter`]
//! prints one summary line per section and a final verdict.

use std::io::{self, Write};

use crate::config::HarnessConfig;

/// Result of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(u32),
    Skipped(String),
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub file: &'static str,
    pub line: u32,
    pub message: String,
}

/// Returned by a section body to stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

/// What a section body returns.
pub type Step = Result<(), Abort>;

/// Per-section context handed to section bodies.
#[derive(Debug)]
pub struct Section<'a> {
    title: &'a str,
    config: &'a HarnessConfig,
    failures: Vec<Failure>,
    skipped: Option<String>,
}

impl<'a> Section<'a> {
    fn new(title: &'a str, config: &'a HarnessConfig) -> Self {
        Self {
            title,
            config,
            failures: Vec::new(),
            skipped: None,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        self.config
    }

    /// Record a failure and keep going.
    pub fn fail(&mut self, file: &'static str, line: u32, message: impl Into<String>) {
        let message = message.into();
        log::error!("[{}] {file}:{line}: {message}", self.title);
        self.failures.push(Failure {
            file,
            line,
            message,
        });
    }

    /// Record a failure; the caller returns the [`Abort`] to end the section.
    pub fn abort(&mut self, file: &'static str, line: u32, message: impl Into<String>) -> Abort {
        self.fail(file, line, message);
        Abort
    }

    /// Mark the section skipped; the caller returns the [`Abort`].
    pub fn skip(&mut self, reason: impl Into<String>) -> Abort {
        let reason = reason.into();
        log::info!("[{}] skipped: {reason}", self.title);
        self.skipped = Some(reason);
        Abort
    }

    /// Informational message that does not affect the outcome.
    pub fn note(&self, message: &str) {
        log::info!("[{}] {message}", self.title);
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    fn outcome(&self) -> Outcome {
        match (&self.skipped, self.failures.len()) {
            (_, n) if n > 0 => Outcome::Failed(n as u32),
            (Some(reason), _) => Outcome::Skipped(reason.clone()),
            (None, _) => Outcome::Passed,
        }
    }
}

/// Totals after every section has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub outcomes: Vec<(String, Outcome)>,
    pub total_failures: u32,
}

impl Summary {
    /// 0 when nothing failed, 2 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.total_failures == 0 {
            0
        } else {
            2
        }
    }
}

/// Runs sections and writes the report to `out`.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
    outcomes: Vec<(String, Outcome)>,
    total_failures: u32,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            outcomes: Vec::new(),
            total_failures: 0,
        }
    }

    pub fn heading(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "\n*** {text}")
    }

    /// Run one section body and print its summary line.
    pub fn run_section<F>(&mut self, config: &HarnessConfig, title: &str, body: F) -> io::Result<Outcome>
    where
        F: FnOnce(&mut Section<'_>) -> Step,
    {
        write!(self.out, "*** Checking {title}...")?;
        self.out.flush()?;

        let mut section = Section::new(title, config);
        // An abort has already been recorded as a failure or a skip.
        let _ = body(&mut section);

        if !section.failures.is_empty() {
            writeln!(self.out)?;
        }
        for failure in &section.failures {
            writeln!(
                self.out,
                "Sorry! Unexpected result, {}, line: {}",
                failure.file, failure.line
            )?;
        }
        let outcome = section.outcome();
        match &outcome {
            Outcome::Passed => writeln!(self.out, "ok.")?,
            Outcome::Failed(n) => {
                self.total_failures += n;
                writeln!(self.out, "{n} failures")?;
            }
            Outcome::Skipped(reason) => writeln!(self.out, "skipped ({reason}).")?,
        }
        self.outcomes.push((title.to_owned(), outcome.clone()));
        Ok(outcome)
    }

    /// Print the final verdict.
    pub fn finish(mut self) -> io::Result<Summary> {
        if self.total_failures == 0 {
            writeln!(self.out, "*** Tests successful!")?;
        } else {
            writeln!(self.out, "{} errors detected! Sorry!", self.total_failures)?;
        }
        self.out.flush()?;
        Ok(Summary {
            outcomes: self.outcomes,
            total_failures: self.total_failures,
        })
    }
}
