// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#[cfg(feature = "app-cli")]
pub mod cli_parser;
#[cfg(feature = "app-cli")]
pub mod config;
pub mod console;
#[cfg(feature = "app-cli")]
pub mod logging;
#[cfg(feature = "app-cli")]
pub mod run;
pub mod styles;

#[cfg(feature = "app-cli")]
pub use config::AppConfig;

/// `ExitStatus` represents the exit states that will be return to the OS after termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// All fine; no check found a vulnerability.
    Ok = 0,
    /// CLI argument parsing failed.
    CliParsingFailed = 1,
    /// CLI arguments are syntactically fine, but do not form a valid configuration.
    ConfigParsingFailed = 2,
    /// An unrecoverable error occurred. This is worst case and should not happen.
    UnrecoverableError = 3,
    /// The scan could not run, e.g. because the nameservers could not be resolved.
    Failed = 10,
    /// At least one check reported a vulnerability.
    CheckFailed = 11,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}
