// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("failed to parse WHOIS response: {reason}")]
    Parse { reason: String },
    #[error("WHOIS request failed: {reason}")]
    Http { reason: String },
    #[error("WHOIS response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },
    #[error("WHOIS request timed out")]
    Timeout,
}

impl Error {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }

    pub(crate) fn parse<T: ToString>(reason: T) -> Error {
        Error::Parse {
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Error::Timeout;
        }
        Error::Http {
            reason: error.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
