// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use crate::app::console::{print_error, ConsoleOpts, ConsoleSink};
use crate::app::{AppConfig, ExitStatus};
use crate::output::{JsonFileSink, OutputSink};
use crate::{Error, Scan};

pub async fn run(config: &AppConfig) -> Result<ExitStatus> {
    let scan = Scan::new(config.scan_config.clone()).context("failed to set up scan")?;
    let source = config.nameserver_source();

    let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(ConsoleSink::stdout(
        ConsoleOpts::default().with_details(config.details),
    ))];
    if let Some(path) = &config.outfile {
        sinks.push(Box::new(JsonFileSink::new(path)));
    }

    let start_time = Instant::now();
    let outputs = match scan
        .run_with_sink(&config.domain, &source, &config.checks, &mut sinks)
        .await
    {
        Ok(outputs) => outputs,
        Err(err @ Error::ResolutionError { .. }) => {
            print_error(err);
            return Ok(ExitStatus::Failed);
        }
        Err(err) => return Err(err).context("failed to run scan"),
    };
    info!(elapsed = ?start_time.elapsed(), checks = outputs.len(), "Scan finished");

    if outputs.iter().any(|o| o.is_vulnerable()) {
        Ok(ExitStatus::CheckFailed)
    } else {
        Ok(ExitStatus::Ok)
    }
}
