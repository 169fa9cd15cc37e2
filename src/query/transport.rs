// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use hickory_proto::runtime::{TokioRuntimeProvider, TokioTime};
use hickory_proto::tcp::TcpClientStream;
use hickory_proto::udp::UdpClientStream;
use hickory_proto::xfer::{DnsExchange, DnsHandle, DnsMultiplexer};
use hickory_proto::ProtoError;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::query::{Error, QueryResult};

/// Moves DNS messages to and from a nameserver.
///
/// Implementations must be safe for concurrent use because all checks of a scan share one transport. Timeouts of
/// single exchanges are enforced by the caller; only a zone transfer needs its own session deadline because it may
/// legitimately consist of many messages.
pub trait Transport: Send + Sync + fmt::Debug {
    fn exchange(&self, server: SocketAddr, request: Message) -> BoxFuture<'_, QueryResult<Message>>;

    fn transfer(&self, server: SocketAddr, request: Message, timeout: Duration)
        -> BoxFuture<'_, QueryResult<Vec<Message>>>;
}

/// hickory's UDP client with TCP fallback for truncated answers; zone transfers always use TCP.
///
/// Every call opens its own connection, so the message ids chosen by hickory never collide between checks.
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    timeout: Duration,
}

impl NetworkTransport {
    /// `timeout` bounds connection setup and each single exchange inside hickory.
    pub fn new(timeout: Duration) -> NetworkTransport {
        NetworkTransport { timeout }
    }
}

impl Transport for NetworkTransport {
    fn exchange(&self, server: SocketAddr, request: Message) -> BoxFuture<'_, QueryResult<Message>> {
        async move {
            let exchange = connect_udp(server, self.timeout).await?;
            let response = first_response(&exchange, request.clone()).await?;
            if response.truncated() {
                debug!(%server, "UDP response truncated, retrying via TCP");
                let exchange = connect_tcp(server, self.timeout).await?;
                return first_response(&exchange, request).await;
            }
            Ok(response)
        }
        .boxed()
    }

    fn transfer(
        &self,
        server: SocketAddr,
        request: Message,
        timeout: Duration,
    ) -> BoxFuture<'_, QueryResult<Vec<Message>>> {
        tcp_transfer(server, request, timeout).boxed()
    }
}

async fn connect_udp(server: SocketAddr, timeout: Duration) -> Result<DnsExchange, ProtoError> {
    let stream = UdpClientStream::builder(server, TokioRuntimeProvider::new())
        .with_timeout(Some(timeout))
        .build();
    let (exchange, background) = DnsExchange::connect::<_, _, TokioTime>(stream).await?;
    tokio::spawn(background);

    Ok(exchange)
}

async fn connect_tcp(server: SocketAddr, timeout: Duration) -> Result<DnsExchange, ProtoError> {
    let (stream, handle) = TcpClientStream::new(server, None, Some(timeout), TokioRuntimeProvider::new());
    let multiplexer = DnsMultiplexer::with_timeout(stream, handle, timeout, None);
    let (exchange, background) = DnsExchange::connect::<_, _, TokioTime>(multiplexer).await?;
    tokio::spawn(background);

    Ok(exchange)
}

async fn first_response(exchange: &DnsExchange, request: Message) -> QueryResult<Message> {
    match exchange.send(request).next().await {
        Some(Ok(response)) => Ok(response.into_message()),
        Some(Err(err)) => Err(err.into()),
        None => Err(Error::transport("connection closed before response")),
    }
}

async fn tcp_transfer(server: SocketAddr, request: Message, timeout: Duration) -> QueryResult<Vec<Message>> {
    let deadline = Instant::now() + timeout;

    let exchange = timeout_at(deadline, connect_tcp(server, timeout))
        .await
        .map_err(|_| refused("connect timed out"))?
        .map_err(refused)?;
    let mut responses = exchange.send(request);

    let mut messages: Vec<Message> = Vec::new();
    let mut soa_records = 0;
    loop {
        let next = match timeout_at(deadline, responses.next()).await {
            Ok(next) => next,
            Err(_) if messages.is_empty() => return Err(Error::Timeout),
            Err(_) => {
                debug!(%server, messages = messages.len(), "Zone transfer deadline reached, keeping partial transfer");
                break;
            }
        };
        let message = match next {
            Some(Ok(response)) => response.into_message(),
            None if messages.is_empty() => return Err(refused("connection closed without answer")),
            None => break,
            Some(Err(err)) if messages.is_empty() => return Err(refused(err)),
            Some(Err(err)) => {
                debug!(%server, "Zone transfer aborted after {} messages: {}", messages.len(), err);
                break;
            }
        };

        let failed = message.response_code() != ResponseCode::NoError;
        soa_records += message
            .answers()
            .iter()
            .filter(|r| r.record_type() == RecordType::SOA)
            .count();
        messages.push(message);

        // A transfer is framed by the zone's SOA record at its start and its end.
        if failed || soa_records >= 2 {
            break;
        }
    }
    trace!(%server, messages = messages.len(), "Zone transfer session finished");

    Ok(messages)
}

fn refused<T: ToString>(reason: T) -> Error {
    Error::TransferRefused {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hickory_proto::rr::Record;
    use spectral::prelude::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream, UdpSocket};

    use super::*;
    use crate::query::{QueryClient, Request};
    use crate::utils::tests::{a_record, response, response_with_rcode, soa_record, txt_record};

    fn transport() -> NetworkTransport {
        NetworkTransport::new(Duration::from_secs(2))
    }

    fn request(name: &str, record_type: RecordType) -> Message {
        Request::new(name, record_type).unwrap().to_message()
    }

    fn reply(request: &Message, mut message: Message) -> Message {
        message.set_id(request.id());
        message.add_queries(request.queries().to_vec());
        message
    }

    async fn read_request(stream: &mut TcpStream) -> Message {
        let mut len = [0u8; 2];
        stream.read_exact(&mut len).await.unwrap();
        let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
        stream.read_exact(&mut buf).await.unwrap();
        Message::from_vec(&buf).unwrap()
    }

    async fn write_message(stream: &mut TcpStream, message: &Message) {
        let bytes = message.to_vec().unwrap();
        stream.write_all(&(bytes.len() as u16).to_be_bytes()).await.unwrap();
        stream.write_all(&bytes).await.unwrap();
    }

    /// Serves one TCP connection: reads the request and answers with `answers(request)`; then waits for the client
    /// to hang up.
    async fn tcp_server<F>(answers: F) -> SocketAddr
    where
        F: FnOnce(&Message) -> Vec<Message> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            for message in answers(&request) {
                write_message(&mut stream, &message).await;
            }
            let _ = stream.read(&mut [0u8; 1]).await;
        });

        addr
    }

    fn zone(request: &Message) -> Vec<Message> {
        vec![
            reply(
                request,
                response(
                    vec![
                        soa_record("example.com", 2024010101, 86400, 7200, 3600000),
                        a_record("www.example.com", [192, 0, 2, 80]),
                    ],
                    vec![],
                ),
            ),
            reply(
                request,
                response(
                    vec![
                        txt_record("example.com", "v=spf1 -all"),
                        soa_record("example.com", 2024010101, 86400, 7200, 3600000),
                    ],
                    vec![],
                ),
            ),
        ]
    }

    #[tokio::test]
    async fn transfer_from_closed_port_is_refused() {
        crate::utils::tests::logging::init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let res = transport()
            .transfer(addr, request("example.com", RecordType::AXFR), Duration::from_secs(2))
            .await;

        assert_that(&matches!(res, Err(Error::TransferRefused { .. }))).is_true();
    }

    #[tokio::test]
    async fn transfer_collects_all_messages_up_to_closing_soa() {
        crate::utils::tests::logging::init();
        let addr = tcp_server(zone).await;

        let messages = transport()
            .transfer(addr, request("example.com", RecordType::AXFR), Duration::from_secs(2))
            .await
            .unwrap();
        let records: Vec<Record> = messages.iter().flat_map(|m| m.answers().to_vec()).collect();

        assert_that(&messages.len()).is_equal_to(2);
        assert_that(&records.len()).is_equal_to(4);
    }

    #[tokio::test]
    async fn transfer_answered_with_refused_is_refused() {
        crate::utils::tests::logging::init();
        let addr = tcp_server(|request| vec![reply(request, response_with_rcode(ResponseCode::Refused))]).await;
        let client = QueryClient::new(Arc::new(transport()), Duration::from_secs(2), Duration::from_secs(2));

        let res = client.transfer("example.com", addr).await;

        assert_that(&matches!(res, Err(Error::TransferRefused { .. }))).is_true();
    }

    #[tokio::test]
    async fn udp_answer_with_mismatching_id_is_skipped() {
        crate::utils::tests::logging::init();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let request = Message::from_vec(&buf[..len]).unwrap();

            let mut forged = reply(&request, response(vec![a_record("example.com", [203, 0, 113, 66])], vec![]));
            forged.set_id(request.id().wrapping_add(1));
            socket.send_to(&forged.to_vec().unwrap(), peer).await.unwrap();

            let genuine = reply(&request, response(vec![a_record("example.com", [192, 0, 2, 1])], vec![]));
            socket.send_to(&genuine.to_vec().unwrap(), peer).await.unwrap();
        });

        let res = transport().exchange(addr, request("example.com", RecordType::A)).await;

        assert_that(&res).is_ok();
        let answers = res.unwrap().answers().to_vec();
        assert_that(&answers.len()).is_equal_to(1);
        assert_that(&answers[0].to_string().contains("192.0.2.1")).is_true();
    }

    #[tokio::test]
    async fn truncated_udp_answer_is_retried_via_tcp() {
        crate::utils::tests::logging::init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let socket = UdpSocket::bind(addr).await.unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let request = Message::from_vec(&buf[..len]).unwrap();
            let mut truncated = reply(&request, response(vec![], vec![]));
            truncated.set_truncated(true);
            socket.send_to(&truncated.to_vec().unwrap(), peer).await.unwrap();
        });
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let full = reply(
                &request,
                response(
                    vec![
                        txt_record("example.com", "v=spf1 include:_spf.example.com -all"),
                        txt_record("example.com", "google-site-verification=abcdef"),
                    ],
                    vec![],
                ),
            );
            write_message(&mut stream, &full).await;
            let _ = stream.read(&mut [0u8; 1]).await;
        });

        let res = transport().exchange(addr, request("example.com", RecordType::TXT)).await;

        assert_that(&res).is_ok();
        let response = res.unwrap();
        assert_that(&response.truncated()).is_false();
        assert_that(&response.answers().len()).is_equal_to(2);
    }

    #[test]
    fn timeout_errors_map_to_timeout() {
        let err: Error = ProtoError::from(hickory_proto::ProtoErrorKind::Timeout).into();

        assert_that(&matches!(err, Error::Timeout)).is_true();
    }
}
