// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Result model shared by all checks and the sinks consuming it.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod json;

pub use json::{JsonFileSink, JsonFormat};

/// Verdict of one check for one nameserver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleCheckResult {
    pub nameserver: String,
    pub zone: String,
    pub vulnerable: bool,
    pub information: Vec<String>,
}

impl SingleCheckResult {
    pub fn new<N: Into<String>, Z: Into<String>>(nameserver: N, zone: Z) -> SingleCheckResult {
        SingleCheckResult {
            nameserver: nameserver.into(),
            zone: zone.into(),
            vulnerable: false,
            information: Vec::new(),
        }
    }

    /// A result that could not be determined; never vulnerable. `reason` becomes the only information line.
    pub fn unresolved<N: Into<String>, Z: Into<String>, R: fmt::Display>(
        nameserver: N,
        zone: Z,
        reason: R,
    ) -> SingleCheckResult {
        let mut result = SingleCheckResult::new(nameserver, zone);
        result.add_info(reason.to_string());
        result
    }

    /// Vulnerability is sticky; once set it is never cleared.
    pub fn set_vulnerable(&mut self) {
        self.vulnerable = true;
    }

    pub fn add_info<T: Into<String>>(&mut self, info: T) {
        self.information.push(info.into());
    }

    pub fn extend_info<I: IntoIterator<Item = String>>(&mut self, infos: I) {
        self.information.extend(infos);
    }
}

/// Complete output of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutput {
    pub name: String,
    pub domain: String,
    pub nameservers: IndexSet<String>,
    pub description: Vec<String>,
    pub results: Vec<SingleCheckResult>,
}

impl CheckOutput {
    pub fn new<N: Into<String>, D: Into<String>>(
        name: N,
        domain: D,
        nameservers: IndexSet<String>,
        description: &[&str],
    ) -> CheckOutput {
        CheckOutput {
            name: name.into(),
            domain: domain.into(),
            nameservers,
            description: description.iter().map(ToString::to_string).collect(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: SingleCheckResult) {
        self.results.push(result);
    }

    /// A check is vulnerable if it is vulnerable on any nameserver.
    pub fn is_vulnerable(&self) -> bool {
        self.results.iter().any(|r| r.vulnerable)
    }

    pub fn vulnerable_results(&self) -> impl Iterator<Item = &SingleCheckResult> {
        self.results.iter().filter(|r| r.vulnerable)
    }
}

/// Receives the completed batch of a scan.
pub trait OutputSink {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()>;
}

/// Keeps the batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    outputs: Vec<CheckOutput>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn outputs(&self) -> &[CheckOutput] {
        &self.outputs
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()> {
        self.outputs.extend_from_slice(outputs);
        Ok(())
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()> {
        (**self).write(outputs)
    }
}

/// Writes to every sink in order and stops at the first failing one.
impl<T: OutputSink> OutputSink for Vec<T> {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()> {
        for sink in self.iter_mut() {
            sink.write(outputs)?;
        }
        Ok(())
    }
}
