// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
/// Main Error type of this crate.
///
/// Must be `Send` because it used by async function which might run on different threads.
pub enum Error {
    #[error("internal error: {msg}")]
    InternalError { msg: &'static str },
    #[error("failed to resolve nameservers of '{domain}': {reason}")]
    ResolutionError { domain: String, reason: String },
    #[error("check '{check}' failed: {reason}")]
    CheckError { check: &'static str, reason: String },
    #[error("query failed")]
    QueryError {
        #[from]
        source: crate::query::Error,
    },
    #[error("external service failed")]
    ServiceError {
        #[from]
        source: crate::services::Error,
    },
    #[error("failed to parse '{what}' to {to} because {why}")]
    ParserError {
        what: String,
        to: &'static str,
        why: String,
    },
    #[error("failed to execute IO operation")]
    IoError {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize to JSON")]
    SerJsonError {
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn resolution<D: Into<String>, R: ToString>(domain: D, reason: R) -> Error {
        Error::ResolutionError {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }
}
