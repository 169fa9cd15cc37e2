// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Runs a batch of checks concurrently against one set of nameservers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::checks::{Check, CheckContext, CheckKind};
use crate::config::ScanConfig;
use crate::nameserver::{NameserverSet, NameserverSource};
use crate::output::{CheckOutput, OutputSink};
use crate::query::{QueryClient, Transport};
use crate::services::whois::{WhoisClient, WhoisTransport};
use crate::Result;

const TIMED_OUT: &str = "check timed out";
const PANICKED: &str = "check panicked";

#[derive(Debug, Clone)]
pub struct Scan {
    context: CheckContext,
}

impl Scan {
    /// A scan talking to real nameservers and the configured RIPEstat API.
    pub fn new(config: ScanConfig) -> Result<Scan> {
        Ok(Scan {
            context: CheckContext::from_config(Arc::new(config))?,
        })
    }

    pub fn with_transports(
        config: ScanConfig,
        transport: Arc<dyn Transport>,
        whois_transport: Arc<dyn WhoisTransport>,
    ) -> Scan {
        let client = QueryClient::with_transport(transport, &config);
        let whois = WhoisClient::with_transport(whois_transport, &config);
        Scan {
            context: CheckContext::new(client, whois, Arc::new(config)),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        self.context.config()
    }

    pub async fn resolve(&self, domain: &str, source: &NameserverSource) -> Result<NameserverSet> {
        source.resolve(self.context.client(), self.context.config(), domain).await
    }

    /// Resolves the nameservers of `domain` and runs all `kinds` against them.
    pub async fn run(&self, domain: &str, source: &NameserverSource, kinds: &[CheckKind]) -> Result<Vec<CheckOutput>> {
        let nameservers = self.resolve(domain, source).await?;
        Ok(self.run_checks(domain, Arc::new(nameservers), kinds).await)
    }

    /// Like [`Scan::run`], but additionally hands the completed batch to `sink`.
    pub async fn run_with_sink(
        &self,
        domain: &str,
        source: &NameserverSource,
        kinds: &[CheckKind],
        sink: &mut dyn OutputSink,
    ) -> Result<Vec<CheckOutput>> {
        let outputs = self.run(domain, source, kinds).await?;
        sink.write(&outputs)?;

        Ok(outputs)
    }

    /// Runs every check in its own task and returns their outputs in the order of `kinds`.
    ///
    /// Always yields exactly one output per kind: checks that do not finish within the scan timeout, or whose task
    /// panics, are replaced by an output with one unresolved result per nameserver.
    #[instrument(name = "scan", level = "info", skip_all, fields(domain = %domain, checks = kinds.len()))]
    pub async fn run_checks(
        &self,
        domain: &str,
        nameservers: Arc<NameserverSet>,
        kinds: &[CheckKind],
    ) -> Vec<CheckOutput> {
        let (tx, mut rx) = mpsc::channel(kinds.len().max(1));

        let handles: Vec<JoinHandle<()>> = kinds
            .iter()
            .copied()
            .enumerate()
            .map(|(index, kind)| {
                let tx = tx.clone();
                let nameservers = nameservers.clone();
                let domain = domain.to_string();
                let context = self.context.clone();

                tokio::spawn(async move {
                    let mut check = Check::init(kind, context);
                    if let Err(err) = check.start(&domain, &nameservers).await {
                        warn!(check = %kind, "Check failed: {}", err);
                    }
                    // The receiver is gone once the scan timed out
                    let _ = tx.send((index, check.results())).await;
                })
            })
            .collect();
        drop(tx);

        let mut outputs: Vec<Option<CheckOutput>> = vec![None; kinds.len()];
        let collect = async {
            while let Some((index, output)) = rx.recv().await {
                info!(check = %kinds[index], vulnerable = output.is_vulnerable(), "Check finished");
                outputs[index] = Some(output);
            }
        };
        let scan_timeout = self.context.config().scan_timeout;
        if tokio::time::timeout(scan_timeout, collect).await.is_err() {
            warn!(timeout = ?scan_timeout, "Scan timed out");
        }

        let mut finished = Vec::with_capacity(kinds.len());
        for ((kind, output), handle) in kinds.iter().zip(outputs).zip(handles) {
            let output = match output {
                Some(output) => output,
                None if handle.is_finished() => {
                    let reason = match handle.await {
                        Err(err) if err.is_panic() => PANICKED,
                        _ => TIMED_OUT,
                    };
                    warn!(check = %kind, "No output: {}", reason);
                    kind.unresolved_output(domain, &nameservers, reason)
                }
                None => {
                    handle.abort();
                    debug!(check = %kind, "Aborted unfinished check");
                    kind.unresolved_output(domain, &nameservers, TIMED_OUT)
                }
            };
            finished.push(output);
        }

        finished
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hickory_proto::rr::RecordType;
    use spectral::prelude::*;

    use super::*;
    use crate::checks::testing::{bootstrap, nameservers, ns1, ns2};
    use crate::output::MemorySink;
    use crate::utils::tests::{a_record, empty_record, ns_record, response, StaticTransport, StaticWhois};

    fn config() -> ScanConfig {
        ScanConfig::default().with_bootstrap_resolver(bootstrap())
    }

    fn scan(transport: StaticTransport, config: ScanConfig) -> Scan {
        Scan::with_transports(config, Arc::new(transport), Arc::new(StaticWhois::new()))
    }

    #[tokio::test]
    async fn outputs_follow_requested_order() {
        crate::utils::tests::logging::init();
        let keys = response(vec![empty_record("example.com", RecordType::DNSKEY)], vec![]);
        let transport = StaticTransport::new().with_default_answer("example.com", RecordType::DNSKEY, keys);
        let kinds = vec![CheckKind::Dnssec, CheckKind::Any, CheckKind::Zone];

        let outputs = scan(transport, config())
            .run_checks("example.com", Arc::new(nameservers()), &kinds)
            .await;

        let names: Vec<String> = outputs.iter().map(|o| o.name.clone()).collect();
        assert_that(&names).is_equal_to(vec![
            "DNSSEC implementation".to_string(),
            "DNS Amplification".to_string(),
            "Unprotected Zone Transfer".to_string(),
        ]);
        assert_that(&outputs[0].is_vulnerable()).is_false();
        assert_that(&outputs[2].results.len()).is_equal_to(2);
    }

    #[tokio::test]
    async fn slow_checks_time_out() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new().with_delay(Duration::from_secs(2));
        let config = config()
            .with_query_timeout(Duration::from_secs(5))
            .with_scan_timeout(Duration::from_millis(50));

        let outputs = scan(transport, config)
            .run_checks("example.com", Arc::new(nameservers()), &[CheckKind::Dnssec])
            .await;

        assert_that(&outputs.len()).is_equal_to(1);
        assert_that(&outputs[0].is_vulnerable()).is_false();
        assert_that(&outputs[0].results[0].information).is_equal_to(vec![TIMED_OUT.to_string()]);
        assert_that(&outputs[0].results[1].nameserver).is_equal_to("ns2.example.com".to_string());
    }

    #[tokio::test]
    async fn run_with_sink_resolves_and_writes_batch() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new()
            .with_answer(
                bootstrap(),
                "example.com",
                RecordType::NS,
                response(
                    vec![
                        ns_record("example.com", "ns1.example.com"),
                        ns_record("example.com", "ns2.example.com"),
                    ],
                    vec![],
                ),
            )
            .with_answer(
                bootstrap(),
                "ns1.example.com",
                RecordType::A,
                response(vec![a_record("ns1.example.com", [192, 0, 2, 1])], vec![]),
            )
            .with_answer(
                bootstrap(),
                "ns2.example.com",
                RecordType::A,
                response(vec![a_record("ns2.example.com", [198, 51, 100, 1])], vec![]),
            )
            .with_answer(ns1(), "example.com", RecordType::DNSKEY, response(vec![], vec![]))
            .with_answer(ns2(), "example.com", RecordType::DNSKEY, response(vec![], vec![]));
        let mut sink = MemorySink::new();

        let outputs = scan(transport, config())
            .run_with_sink("example.com", &NameserverSource::Domain, &[CheckKind::Dnssec], &mut sink)
            .await;

        assert_that(&outputs).is_ok();
        assert_that(&sink.outputs().len()).is_equal_to(1);
        assert_that(&sink.outputs()[0].is_vulnerable()).is_true();
        assert_that(&sink.outputs()[0].nameservers.len()).is_equal_to(2);
    }

    #[tokio::test]
    async fn unresolvable_domain_fails() {
        crate::utils::tests::logging::init();

        let res = scan(StaticTransport::new(), config())
            .run("example.com", &NameserverSource::Domain, &CheckKind::all())
            .await;

        assert_that(&res).is_err();
    }
}
