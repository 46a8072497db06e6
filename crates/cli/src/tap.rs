//! TAP (Test Anything Protocol) v14 report for the conformance runner.

use std::io::{self, Write};

#[derive(Default)]
pub struct Tap {
    points: Vec<TestPoint>,
}

struct TestPoint {
    ok: bool,
    desc: String,
    diagnostics: Option<String>,
}

impl Tap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, desc: impl Into<String>) {
        self.points.push(TestPoint {
            ok: true,
            desc: desc.into(),
            diagnostics: None,
        });
    }

    pub fn not_ok(&mut self, desc: impl Into<String>, diagnostics: impl Into<String>) {
        self.points.push(TestPoint {
            ok: false,
            desc: desc.into(),
            diagnostics: Some(diagnostics.into()),
        });
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Descriptions of the failed test points, in run order.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.points.iter().filter(|t| !t.ok).map(|t| t.desc.as_str())
    }

    pub fn failure_count(&self) -> usize {
        self.points.iter().filter(|t| !t.ok).count()
    }

    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "TAP version 14")?;
        writeln!(out, "1..{}", self.points.len())?;
        for (i, t) in self.points.iter().enumerate() {
            let status = if t.ok { "ok" } else { "not ok" };
            writeln!(out, "{} {} - {}", status, i + 1, t.desc)?;
            if let Some(diag) = &t.diagnostics {
                for line in diag.lines() {
                    writeln!(out, "  # {}", line)?;
                }
            }
        }
        let failed = self.failure_count();
        writeln!(out, "# tests {}", self.points.len())?;
        writeln!(out, "# pass  {}", self.points.len() - failed)?;
        writeln!(out, "# fail  {}", failed)?;
        Ok(())
    }

    /// Print the report to stdout.
    pub fn finish(self) {
        let stdout = io::stdout();
        if let Err(e) = self.write_to(&mut stdout.lock()) {
            eprintln!("error: could not write TAP report: {}", e);
        }
    }
}
