// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Single-shot DNS queries.
//!
//! A [`QueryClient`] sends exactly one question per call, enforces a timeout, and only hands back responses with
//! response code `NOERROR`. It never retries; retry policies belong to the caller.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};
use tracing::{debug, instrument};

pub use error::Error;
pub use transport::{NetworkTransport, Transport};

use crate::config::ScanConfig;

pub mod error;
pub mod transport;

pub type QueryResult<T> = std::result::Result<T, Error>;

const EDNS_MAX_PAYLOAD: u16 = 4096;

/// Template of a single question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    name: Name,
    record_type: RecordType,
    recursion_desired: bool,
}

impl Request {
    /// Creates a request for `name`; the name is always treated as fully qualified.
    pub fn new(name: &str, record_type: RecordType) -> QueryResult<Request> {
        let fqdn = format!("{}.", name.trim_end_matches('.'));
        let name = Name::from_ascii(&fqdn).map_err(|e| Error::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Request {
            name,
            record_type,
            recursion_desired: true,
        })
    }

    /// Clears or sets the RD flag; cleared for checks that want to see the authoritative answer only.
    pub fn recursion_desired(self, recursion_desired: bool) -> Request {
        Request {
            recursion_desired,
            ..self
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn is_recursion_desired(&self) -> bool {
        self.recursion_desired
    }

    pub(crate) fn to_message(&self) -> Message {
        let mut message = Message::new();
        message.set_id(rand::random());
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.set_recursion_desired(self.recursion_desired);
        message.add_query(Query::query(self.name.clone(), self.record_type));

        if self.record_type != RecordType::AXFR {
            message
                .extensions_mut()
                .get_or_insert_with(Edns::new)
                .set_max_payload(EDNS_MAX_PAYLOAD);
        }

        message
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.record_type)
    }
}

/// Thin wrapper around a [`Transport`]; cheap to clone and shared by all concurrently running checks.
#[derive(Debug, Clone)]
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    transfer_timeout: Duration,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, transfer_timeout: Duration) -> QueryClient {
        QueryClient {
            transport,
            timeout,
            transfer_timeout,
        }
    }

    /// Creates a client sending queries over the network with the timeouts of `config`.
    pub fn from_config(config: &ScanConfig) -> QueryClient {
        QueryClient::with_transport(Arc::new(NetworkTransport::new(config.query_timeout)), config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: &ScanConfig) -> QueryClient {
        QueryClient::new(transport, config.query_timeout, config.transfer_timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(name = "query", level = "debug", skip_all, fields(q = %request, server = %server))]
    pub async fn query(&self, request: &Request, server: SocketAddr) -> QueryResult<Message> {
        let message = request.to_message();

        let response = tokio::time::timeout(self.timeout, self.transport.exchange(server, message)).await??;
        debug!(
            rcode = %response.response_code(),
            answers = response.answers().len(),
            additionals = response.additionals().len(),
            "Received response"
        );

        match response.response_code() {
            ResponseCode::NoError => Ok(response),
            rcode => Err(Error::ResponseCode { rcode }),
        }
    }

    /// Shortcut for a recursive query of `name`.
    pub async fn lookup(&self, name: &str, record_type: RecordType, server: SocketAddr) -> QueryResult<Message> {
        let request = Request::new(name, record_type)?;
        self.query(&request, server).await
    }

    /// Runs a full zone transfer of `zone` against `server` and returns all transferred records.
    ///
    /// Every failure to establish the session or to get a first answer is reported as [`Error::TransferRefused`].
    #[instrument(name = "transfer", level = "debug", skip_all, fields(zone = %zone, server = %server))]
    pub async fn transfer(&self, zone: &str, server: SocketAddr) -> QueryResult<Vec<Record>> {
        let request = Request::new(zone, RecordType::AXFR)?.recursion_desired(false);
        let messages = self
            .transport
            .transfer(server, request.to_message(), self.transfer_timeout)
            .await
            .map_err(|e| match e {
                Error::TransferRefused { .. } => e,
                other => Error::TransferRefused {
                    reason: other.to_string(),
                },
            })?;

        if let Some(failed) = messages.iter().find(|m| m.response_code() != ResponseCode::NoError) {
            return Err(Error::TransferRefused {
                reason: format!("nameserver answered with {}", failed.response_code()),
            });
        }

        let records: Vec<Record> = messages.into_iter().flat_map(|m| m.answers().to_vec()).collect();
        debug!(records = records.len(), "Zone transfer finished");

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use spectral::prelude::*;

    use super::*;
    use crate::utils::tests::{a_record, response, StaticTransport};

    fn server() -> SocketAddr {
        "192.0.2.53:53".parse().unwrap()
    }

    #[test]
    fn request_is_fully_qualified() {
        let request = Request::new("example.com", RecordType::NS).unwrap();

        assert_that(&request.name().is_fqdn()).is_true();
        assert_that(&request.name().to_string()).is_equal_to("example.com.".to_string());
        assert_that(&request.is_recursion_desired()).is_true();
    }

    #[test]
    fn request_message_carries_rd_flag() {
        let request = Request::new("example.com.", RecordType::NS)
            .unwrap()
            .recursion_desired(false);
        let message = request.to_message();

        assert_that(&message.recursion_desired()).is_false();
        assert_that(&message.queries().len()).is_equal_to(1);
        assert_that(&message.queries()[0].query_type()).is_equal_to(RecordType::NS);
    }

    #[test]
    fn request_rejects_invalid_name() {
        let long_label = "a".repeat(64);
        let request = Request::new(&format!("{}.example.com", long_label), RecordType::A);

        assert_that(&request).is_err();
    }

    #[tokio::test]
    async fn query_returns_successful_response() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new().with_answer(
            server(),
            "ns1.example.com",
            RecordType::A,
            response(vec![a_record("ns1.example.com", [192, 0, 2, 1])], vec![]),
        );
        let client = QueryClient::new(Arc::new(transport), Duration::from_secs(1), Duration::from_secs(1));

        let res = client.lookup("ns1.example.com", RecordType::A, server()).await;

        assert_that(&res).is_ok();
        assert_that(&res.unwrap().answers().len()).is_equal_to(1);
    }

    #[tokio::test]
    async fn query_fails_on_error_rcode() {
        crate::utils::tests::logging::init();
        let client = QueryClient::new(
            Arc::new(StaticTransport::new()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let res = client.lookup("unknown.example.com", RecordType::A, server()).await;

        assert_that(&res).is_err();
        assert_that(&res.unwrap_err().is_nxdomain()).is_true();
    }

    #[tokio::test]
    async fn query_times_out() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new().with_delay(Duration::from_millis(200));
        let client = QueryClient::new(Arc::new(transport), Duration::from_millis(10), Duration::from_secs(1));

        let res = client.lookup("slow.example.com", RecordType::A, server()).await;

        assert_that(&matches!(res, Err(Error::Timeout))).is_true();
    }

    #[tokio::test]
    async fn transfer_failure_is_refused() {
        crate::utils::tests::logging::init();
        let client = QueryClient::new(
            Arc::new(StaticTransport::new()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let res = client.transfer("example.com", server()).await;

        assert_that(&matches!(res, Err(Error::TransferRefused { .. }))).is_true();
    }
}
