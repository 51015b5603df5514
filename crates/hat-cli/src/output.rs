//! Output writers for test outcomes.

use hat_engine::{Outcome, RenderPolicy};
use serde_json::Value;
use std::io::{self, IsTerminal, Write};

// ANSI color codes
const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

const CHECK_MARK: &str = "\u{2713}";
const BALLOT_X: &str = "\u{2717}";

/// Receives outcomes as they are produced, then a final call once the run
/// is over.
pub trait OutputWriter {
    fn write(&mut self, outcome: &Outcome) -> io::Result<()>;
    fn finalize(&mut self) -> io::Result<()>;
}

/// Drain `outcomes` into `output`. Returns whether every outcome succeeded.
pub fn report(
    outcomes: impl Iterator<Item = Outcome>,
    output: &mut dyn OutputWriter,
) -> io::Result<bool> {
    let mut success = true;
    for outcome in outcomes {
        success &= outcome.success();
        output.write(&outcome)?;
    }
    output.finalize()?;
    Ok(success)
}

/// Human readable output: passes to one stream, failures to the other.
pub struct ReadableOutput<O: Write, E: Write> {
    out: O,
    err: E,
    out_color: bool,
    err_color: bool,
    verbosity: u8,
    policy: RenderPolicy,
    failed: Vec<String>,
}

impl ReadableOutput<io::Stdout, io::Stderr> {
    /// Standard streams, coloured only where they are terminals.
    pub fn stdio(verbosity: u8, color: bool, policy: RenderPolicy) -> Self {
        let out = io::stdout();
        let err = io::stderr();
        let out_color = color && out.is_terminal();
        let err_color = color && err.is_terminal();
        Self::new(out, err, verbosity, policy).with_color(out_color, err_color)
    }
}

impl<O: Write, E: Write> ReadableOutput<O, E> {
    pub fn new(out: O, err: E, verbosity: u8, policy: RenderPolicy) -> Self {
        Self {
            out,
            err,
            out_color: false,
            err_color: false,
            verbosity,
            policy,
            failed: Vec::new(),
        }
    }

    pub fn with_color(mut self, out_color: bool, err_color: bool) -> Self {
        self.out_color = out_color;
        self.err_color = err_color;
        self
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> OutputWriter for ReadableOutput<O, E> {
    fn write(&mut self, outcome: &Outcome) -> io::Result<()> {
        let rendered = outcome.render_with(self.verbosity, self.policy);
        let mut lines = rendered.lines();
        let title = lines.next().unwrap_or_default();

        let (stream, color, mark, code): (&mut dyn Write, bool, &str, &str) = if outcome.success() {
            (&mut self.out as &mut dyn Write, self.out_color, CHECK_MARK, GREEN)
        } else {
            self.failed.push(format!("- {}", outcome.title()));
            (&mut self.err as &mut dyn Write, self.err_color, BALLOT_X, RED)
        };

        if color {
            writeln!(stream, "{code}{mark} {title}{RESET}")?;
        } else {
            writeln!(stream, "{title}")?;
        }
        for line in lines {
            writeln!(stream, "{line}")?;
        }
        stream.flush()
    }

    fn finalize(&mut self) -> io::Result<()> {
        let (code, summary) = if self.failed.is_empty() {
            (GREEN, "All tests passed".to_string())
        } else {
            (
                RED,
                format!("Failed tests: {}\n{}", self.failed.len(), self.failed.join("\n")),
            )
        };

        writeln!(self.err)?;
        if self.err_color {
            writeln!(self.err, "{code}{summary}{RESET}")?;
        } else {
            writeln!(self.err, "{summary}")?;
        }
        self.err.flush()
    }
}

/// Collects every outcome's record and prints them as one JSON array.
pub struct JsonOutput<W: Write> {
    out: W,
    records: Vec<Value>,
}

impl JsonOutput<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            records: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputWriter for JsonOutput<W> {
    fn write(&mut self, outcome: &Outcome) -> io::Result<()> {
        self.records.push(outcome.to_record());
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, &self.records)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
