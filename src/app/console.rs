// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{self, Write};

use yansi::Paint;

use crate::app::styles::{self, CAPTION_PREFIX, ERROR_PREFIX, INFO_PREFIX, ITEMAZATION_PREFIX};
use crate::output::{CheckOutput, OutputSink, SingleCheckResult};
use crate::Result;

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOpts {
    /// Prints descriptions and evidence instead of one line per check
    details: bool,
}

impl ConsoleOpts {
    pub fn with_details(self, details: bool) -> ConsoleOpts {
        ConsoleOpts { details }
    }
}

/// Human readable report.
pub struct ConsoleSink<W: Write> {
    writer: W,
    opts: ConsoleOpts,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(opts: ConsoleOpts) -> ConsoleSink<io::Stdout> {
        ConsoleSink::new(io::stdout(), opts)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W, opts: ConsoleOpts) -> ConsoleSink<W> {
        ConsoleSink { writer, opts }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn summary_line(&mut self, output: &CheckOutput) -> io::Result<()> {
        let verdict = if output.is_vulnerable() {
            "FAILED".paint(styles::ERROR)
        } else {
            "PASSED".paint(styles::OK)
        };
        writeln!(self.writer, "[{}] {}", verdict, output.name)
    }

    fn details(&mut self, output: &CheckOutput) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} {} ({})",
            CAPTION_PREFIX.paint(styles::EMPH),
            output.name.as_str().paint(styles::EMPH),
            output.domain
        )?;
        for line in &output.description {
            writeln!(self.writer, "    {}", line.as_str().paint(styles::DIMMED))?;
        }
        for result in &output.results {
            self.result(result)?;
        }
        writeln!(self.writer)
    }

    fn result(&mut self, result: &SingleCheckResult) -> io::Result<()> {
        let verdict = if result.vulnerable {
            "VULNERABLE".paint(styles::ERROR)
        } else {
            "OK".paint(styles::OK)
        };
        writeln!(self.writer, "  {} {}: {}", ITEMAZATION_PREFIX, result.nameserver, verdict)?;
        for info in &result.information {
            writeln!(self.writer, "      {} {}", INFO_PREFIX, info)?;
        }

        Ok(())
    }
}

impl<W: Write> OutputSink for ConsoleSink<W> {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()> {
        for output in outputs {
            if self.opts.details {
                self.details(output)?;
            } else {
                self.summary_line(output)?;
            }
        }

        let vulnerable = outputs.iter().filter(|o| o.is_vulnerable()).count();
        if self.opts.details || vulnerable > 0 {
            writeln!(
                self.writer,
                "{} of {} checks found vulnerabilities",
                vulnerable.paint(if vulnerable > 0 { styles::ATTENTION } else { styles::OK }),
                outputs.len()
            )?;
        }
        self.writer.flush()?;

        Ok(())
    }
}

pub fn print_error<T: std::fmt::Display>(msg: T) {
    eprintln!("{} {}", ERROR_PREFIX.paint(styles::ERROR), msg);
}

#[cfg(test)]
mod tests {
    use indexmap::IndexSet;
    use spectral::prelude::*;

    use super::*;
    use crate::checks::CheckKind;

    fn outputs() -> Vec<CheckOutput> {
        let nameservers: IndexSet<String> = vec!["ns1.example.com".to_string()].into_iter().collect();

        let mut dnssec = CheckKind::Dnssec.output("example.com", nameservers.clone());
        let mut result = SingleCheckResult::new("ns1.example.com", "example.com");
        result.set_vulnerable();
        result.add_info("no DNSKEY record published");
        dnssec.push(result);

        let mut any = CheckKind::Any.output("example.com", nameservers);
        any.push(SingleCheckResult::new("ns1.example.com", "example.com"));

        vec![dnssec, any]
    }

    fn render(opts: ConsoleOpts) -> String {
        let mut sink = ConsoleSink::new(Vec::new(), opts);
        sink.write(&outputs()).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn one_line_per_check() {
        let report = render(ConsoleOpts::default());
        let lines: Vec<&str> = report.lines().collect();

        assert_that(&lines.len()).is_equal_to(3);
        assert_that(&lines[0].contains("FAILED")).is_true();
        assert_that(&lines[0].ends_with("DNSSEC implementation")).is_true();
        assert_that(&lines[1].contains("PASSED")).is_true();
    }

    #[test]
    fn details_contain_evidence() {
        let report = render(ConsoleOpts::default().with_details(true));

        assert_that(&report.contains("no DNSKEY record published")).is_true();
        assert_that(&report.contains("ns1.example.com: ")).is_true();
        assert_that(&report.contains("DNSSEC signs zone data")).is_true();
    }
}
