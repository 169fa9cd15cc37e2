// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use hickory_proto::op::ResponseCode;
use hickory_proto::{ProtoError, ProtoErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize)]
pub enum Error {
    #[error("transport failed: {reason}")]
    Transport { reason: String },
    #[error("request timed out")]
    Timeout,
    #[error("nameserver answered with {rcode}")]
    ResponseCode {
        #[serde(serialize_with = "crate::utils::serialize::ser_to_string")]
        rcode: ResponseCode,
    },
    #[error("invalid domain name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("zone transfer refused: {reason}")]
    TransferRefused { reason: String },
}

impl Error {
    pub fn is_nxdomain(&self) -> bool {
        matches!(
            self,
            Error::ResponseCode {
                rcode: ResponseCode::NXDomain
            }
        )
    }

    pub(crate) fn transport<T: ToString>(reason: T) -> Error {
        Error::Transport {
            reason: reason.to_string(),
        }
    }
}

impl From<ProtoError> for Error {
    fn from(error: ProtoError) -> Self {
        if matches!(error.kind(), ProtoErrorKind::Timeout) {
            return Error::Timeout;
        }
        Error::Transport {
            reason: error.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
