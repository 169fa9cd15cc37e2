// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::env;

use tracing::{debug, error};

use dnshunter::app::cli_parser::create_parser;
use dnshunter::app::console::print_error;
use dnshunter::app::logging::Logging;
use dnshunter::app::{run, styles, AppConfig, ExitStatus};

#[tokio::main]
async fn main() {
    let status = start().await;
    std::process::exit(status.code());
}

async fn start() -> ExitStatus {
    let args = match create_parser().try_get_matches() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitStatus::CliParsingFailed
            } else {
                // --help and --version
                ExitStatus::Ok
            };
        }
    };

    let config = match AppConfig::try_from(&args) {
        Ok(config) => config,
        Err(err) => {
            print_error(format!("{:#}", err));
            return ExitStatus::ConfigParsingFailed;
        }
    };

    if config.no_color {
        styles::no_color_mode();
    }
    if let Err(err) = Logging::new(config.verbosity, env::var_os("RUST_LOG"), !config.no_color).start() {
        print_error(format!("failed to set up logging: {:#}", err));
        return ExitStatus::UnrecoverableError;
    }
    debug!("Parsed args and set up logging");

    match run::run(&config).await {
        Ok(status) => status,
        Err(err) => {
            error!("Scan failed: {:#}", err);
            print_error(format!("{:#}", err));
            ExitStatus::UnrecoverableError
        }
    }
}
