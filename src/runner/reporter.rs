use crate::runner::types::{FailureReport, TestSummary};
use crate::utils::format_percent;
use colored::{Color, Colorize};
use std::io::{self, Write};

/// 行式控制台报告
pub struct TestReporter<W: Write> {
    out: W,
    color: bool,
    divider_width: usize,
}

impl<W: Write> TestReporter<W> {
    pub fn new(out: W, color: bool, divider_width: usize) -> Self {
        Self {
            out,
            color,
            divider_width,
        }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// 打印 fixture 开始
    pub fn print_fixture_header(&mut self, fixture: &str, total: usize) -> io::Result<()> {
        writeln!(self.out, "Running {} tests for {}", total, fixture)?;
        writeln!(self.out)
    }

    pub fn print_pass(&mut self, method: &str) -> io::Result<()> {
        let status = self.paint("PASS", Color::Green);
        writeln!(self.out, "Ran {} ... {}", method, status)
    }

    pub fn print_fail(&mut self, method: &str, report: &FailureReport) -> io::Result<()> {
        let status = self.paint("FAILED", Color::Red);
        let during = report
            .phase
            .map(|phase| format!(" during {}", phase))
            .unwrap_or_default();

        writeln!(self.out)?;
        writeln!(self.out, "Ran {} ... {}", method, status)?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Test failed for {}{}. The exception was {} which happened at {}",
            method, during, report.message, report.trace
        )?;
        writeln!(self.out)
    }

    /// fixture 无法构造
    pub fn print_fixture_error(&mut self, fixture: &str, report: &FailureReport) -> io::Result<()> {
        let label = self.paint("ERROR", Color::Red);
        writeln!(
            self.out,
            "{}: could not construct {}. The exception was {} which happened at {}",
            label, fixture, report.message, report.trace
        )
    }

    /// 打印 fixture 结束
    pub fn print_fixture_footer(&mut self, fixture: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Finished running tests for {}", fixture)?;
        writeln!(self.out, "{}", "-".repeat(self.divider_width))
    }

    /// 打印测试摘要
    pub fn print_summary(&mut self, summary: &TestSummary) -> io::Result<()> {
        if let Some(started_at) = summary.started_at {
            writeln!(
                self.out,
                "Test run started at {}",
                started_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        writeln!(
            self.out,
            "Total tests run: {} for {}",
            summary.total, summary.library
        )?;

        let failed = if summary.failed > 0 {
            self.paint(&summary.failed.to_string(), Color::Red)
        } else {
            summary.failed.to_string()
        };
        writeln!(self.out, "Total tests failed: {}", failed)?;
        writeln!(self.out, "Test run finished in {}", summary.elapsed_run_time)?;
        writeln!(
            self.out,
            "Success rate: {}%",
            format_percent(summary.percent_success)
        )?;
        self.out.flush()
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_writer(self) -> W {
        self.out
    }
}
