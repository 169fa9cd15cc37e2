// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Recursive evaluation of SPF records.
//!
//! The record of the domain is classified by its `all` qualifier and every `include:` and `redirect=` target is
//! fetched from the same nameserver and evaluated the same way, up to a maximum depth. Nameservers are processed one
//! after another so that a record already evaluated for one nameserver is not evaluated again for the next.

use std::net::SocketAddr;
use std::sync::OnceLock;

use futures::future::BoxFuture;
use futures::FutureExt;
use hickory_proto::rr::RecordType;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tracing::debug;

use crate::checks::{query_failed, CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::query::{QueryClient, QueryResult};
use crate::resources::parsed_txt::{Qualifier, Spf};
use crate::resources::txt_strings;
use crate::Result;

pub const NAME: &str = "SPF Record";
pub const DESCRIPTION: &[&str] = &[
    "SPF is a TXT record that prevents mail spoofing by verifying servers",
    "that are allowed to send emails using the specified domain. To better",
    "understand the syntax, refer to this link: https://dmarcian.com/spf-syntax-table/",
];

const INDENT: &str = "    ";

/// Verdict of one SPF record including everything it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpfEvaluation {
    pub vulnerable: bool,
    pub evidence: Vec<String>,
}

impl SpfEvaluation {
    fn line(vulnerable: bool, evidence: String) -> SpfEvaluation {
        SpfEvaluation {
            vulnerable,
            evidence: vec![evidence],
        }
    }

    pub fn merge(&mut self, other: SpfEvaluation) {
        self.vulnerable |= other.vulnerable;
        self.evidence.extend(other.evidence);
    }
}

#[derive(Debug)]
pub struct SpfCheck {
    context: CheckContext,
    /// Top level records already evaluated, with the nameserver that served them first
    seen: IndexMap<String, (String, SpfEvaluation)>,
    output: Option<CheckOutput>,
}

impl SpfCheck {
    pub fn new(context: CheckContext) -> SpfCheck {
        SpfCheck {
            context,
            seen: IndexMap::new(),
            output: None,
        }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Spf.output(domain, nameservers.fqdns());

        for nameserver in nameservers.iter() {
            let result = self.check_nameserver(domain, nameserver).await;
            output.push(result);
        }
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&mut self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let client = self.context.client();
        let max_depth = self.context.config().spf_max_depth;

        let record = match fetch_spf(client, domain, nameserver.socket_addr()).await {
            Ok(record) => record.unwrap_or_default(),
            Err(err) => return query_failed(nameserver, domain, err),
        };

        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);
        if let Some((served_by, evaluation)) = self.seen.get(&record) {
            debug!(nameserver = nameserver.fqdn(), %served_by, "SPF record already evaluated");
            if evaluation.vulnerable {
                result.set_vulnerable();
            }
            result.add_info(format!("Same SPF record as served by {}", served_by));
            return result;
        }

        let evaluation = evaluate(client, nameserver.socket_addr(), domain, &record, 0, max_depth).await;
        if evaluation.vulnerable {
            result.set_vulnerable();
        }
        result.extend_info(evaluation.evidence.clone());

        if !record.is_empty() {
            self.seen
                .insert(record, (nameserver.fqdn().to_string(), evaluation));
        }

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Spf.output(String::new(), IndexSet::new()))
    }
}

/// Returns the first TXT record of `domain` that looks like an SPF record; a non-existing domain has none.
pub async fn fetch_spf(client: &QueryClient, domain: &str, server: SocketAddr) -> QueryResult<Option<String>> {
    let answers = match client.lookup(domain, RecordType::TXT, server).await {
        Ok(response) => txt_strings(response.answers()),
        Err(err) if err.is_nxdomain() => return Ok(None),
        Err(err) => return Err(err),
    };

    Ok(answers
        .into_iter()
        .find(|txt| txt.trim_start().to_ascii_lowercase().starts_with("v=spf")))
}

/// Evaluates `record` of `domain` at `depth` and all records it references below `max_depth`.
pub fn evaluate<'a>(
    client: &'a QueryClient,
    server: SocketAddr,
    domain: &'a str,
    record: &'a str,
    depth: usize,
    max_depth: usize,
) -> BoxFuture<'a, SpfEvaluation> {
    async move {
        if depth >= max_depth {
            return SpfEvaluation::default();
        }

        let indent = INDENT.repeat(depth);
        let (mut evaluation, stop) = classify(record, domain, &indent);
        if stop || depth + 1 >= max_depth {
            return evaluation;
        }

        for target in references(record) {
            let referenced = match fetch_spf(client, &target, server).await {
                Ok(referenced) => referenced.unwrap_or_default(),
                Err(err) => {
                    debug!(%target, "Failed to fetch referenced SPF record: {}", err);
                    String::new()
                }
            };
            let nested = evaluate(client, server, &target, &referenced, depth + 1, max_depth).await;
            evaluation.merge(nested);
        }

        evaluation
    }
    .boxed()
}

/// Classifies a record by its `all` qualifier; the flag tells whether to stop descending.
fn classify(record: &str, domain: &str, indent: &str) -> (SpfEvaluation, bool) {
    if record.trim().is_empty() {
        return (SpfEvaluation::line(false, format!("{}No SPF for {}", indent, domain)), true);
    }

    let qualifier = match Spf::from_str(record) {
        Ok(spf) => spf.all_qualifier(),
        Err(_) => all_qualifier_of_text(record),
    };

    match qualifier {
        Some(Qualifier::Fail) => (
            SpfEvaluation::line(false, format!("{}Secure (-all) SPF for {}", indent, domain)),
            true,
        ),
        Some(Qualifier::Softfail) => (
            SpfEvaluation::line(true, format!("{}Partially secure (~all) SPF for {}", indent, domain)),
            false,
        ),
        Some(Qualifier::Pass) => (
            SpfEvaluation::line(true, format!("{}Insecure (+all) SPF for {}", indent, domain)),
            false,
        ),
        Some(Qualifier::Neutral) => (
            SpfEvaluation::line(true, format!("{}Insecure (?all) SPF for {}", indent, domain)),
            false,
        ),
        None => (
            SpfEvaluation::line(false, format!("{}No all qualifier in SPF for {}", indent, domain)),
            false,
        ),
    }
}

/// Used for records the parser rejects, e.g. because of unknown modifiers.
fn all_qualifier_of_text(record: &str) -> Option<Qualifier> {
    let record = record.to_ascii_lowercase();
    if record.contains("-all") {
        Some(Qualifier::Fail)
    } else if record.contains("~all") {
        Some(Qualifier::Softfail)
    } else if record.contains("+all") || record.split_whitespace().any(|term| term == "all") {
        Some(Qualifier::Pass)
    } else if record.contains("?all") {
        Some(Qualifier::Neutral)
    } else {
        None
    }
}

fn references(record: &str) -> Vec<String> {
    static REFERENCE: OnceLock<Option<Regex>> = OnceLock::new();

    if let Ok(spf) = Spf::from_str(record) {
        return spf.references().into_iter().map(ToString::to_string).collect();
    }

    let regex = REFERENCE.get_or_init(|| Regex::new(r#"(redirect=|include:)([^ "]*)"#).ok());
    match regex {
        Some(regex) => regex
            .captures_iter(record)
            .filter_map(|c| c.get(2))
            .map(|m| m.as_str().to_string())
            .filter(|target| !target.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use spectral::prelude::*;

    use super::*;
    use crate::checks::testing::{context, nameservers, ns1};
    use crate::utils::tests::{response, txt_record, StaticTransport};

    fn spf(owner: &str, record: &str) -> hickory_proto::op::Message {
        response(
            vec![
                txt_record(owner, "google-site-verification=abc"),
                txt_record(owner, record),
            ],
            vec![],
        )
    }

    async fn run(transport: StaticTransport) -> CheckOutput {
        crate::utils::tests::logging::init();
        let mut check = SpfCheck::new(context(transport));
        check.start("example.com", &nameservers()).await.unwrap();
        check.results()
    }

    #[tokio::test]
    async fn fail_all_is_secure_and_stops() {
        let transport = StaticTransport::new().with_answer(
            ns1(),
            "example.com",
            RecordType::TXT,
            spf("example.com", "v=spf1 include:thirdparty.com -all"),
        );

        let output = run(transport.clone()).await;

        assert_that(&output.results[0].vulnerable).is_false();
        assert_that(&output.results[0].information)
            .is_equal_to(vec!["Secure (-all) SPF for example.com".to_string()]);
        assert_that(&transport.requests_for("thirdparty.com", RecordType::TXT)).is_equal_to(0);
    }

    #[tokio::test]
    async fn softfail_follows_include() {
        let transport = StaticTransport::new().with_default_answer(
            "example.com",
            RecordType::TXT,
            spf("example.com", "v=spf1 include:thirdparty.com ~all"),
        );

        let output = run(transport.clone()).await;

        assert_that(&output.results[0].vulnerable).is_true();
        assert_that(&output.results[0].information).is_equal_to(vec![
            "Partially secure (~all) SPF for example.com".to_string(),
            "    No SPF for thirdparty.com".to_string(),
        ]);
        assert_that(&transport.requests_for("thirdparty.com", RecordType::TXT)).is_equal_to(1);
    }

    #[tokio::test]
    async fn same_record_is_evaluated_once() {
        let transport = StaticTransport::new().with_default_answer(
            "example.com",
            RecordType::TXT,
            spf("example.com", "v=spf1 include:thirdparty.com ~all"),
        );

        let output = run(transport).await;

        assert_that(&output.results[1].vulnerable).is_true();
        assert_that(&output.results[1].information)
            .is_equal_to(vec!["Same SPF record as served by ns1.example.com".to_string()]);
    }

    #[tokio::test]
    async fn cyclic_includes_are_bounded() {
        let transport = StaticTransport::new()
            .with_default_answer(
                "example.com",
                RecordType::TXT,
                spf("example.com", "v=spf1 include:loop.example.com ?all"),
            )
            .with_default_answer(
                "loop.example.com",
                RecordType::TXT,
                spf("loop.example.com", "v=spf1 redirect=example.com"),
            );

        let output = run(transport.clone()).await;

        let information = &output.results[0].information;
        assert_that(&information.len()).is_equal_to(3);
        assert_that(&information[1]).is_equal_to("    No all qualifier in SPF for loop.example.com".to_string());
        assert_that(&information[2]).is_equal_to("        Insecure (?all) SPF for example.com".to_string());
        assert_that(&transport.requests_for("loop.example.com", RecordType::TXT)).is_equal_to(1);
    }

    #[tokio::test]
    async fn missing_record() {
        let output = run(StaticTransport::new()).await;

        assert_that(&output.is_vulnerable()).is_false();
        assert_that(&output.results[0].information).is_equal_to(vec!["No SPF for example.com".to_string()]);
    }

    #[test]
    fn textual_fallback_for_unparsable_records() {
        let (evaluation, stop) = classify("v=spf1 a mx unknown=foo +all", "example.com", "");

        assert_that(&stop).is_false();
        assert_that(&evaluation.vulnerable).is_true();
        assert_that(&references("v=spf1 include:_spf.example.net bogus=1 redirect=other.example.net"))
            .is_equal_to(vec!["_spf.example.net".to_string(), "other.example.net".to_string()]);
    }
}
