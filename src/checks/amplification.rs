// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use futures::future::join_all;
use hickory_proto::rr::RecordType;
use indexmap::IndexSet;

use crate::checks::{query_failed, CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::Result;

pub const NAME: &str = "DNS Amplification";
pub const DESCRIPTION: &[&str] = &[
    "Nameservers answering ANY queries can be abused for DNS amplification attacks:",
    "a small spoofed request triggers a much larger answer sent to the victim.",
    "RFC 8482 allows to answer ANY queries with a minimal response instead.",
    "More information at https://www.cisa.gov/news-events/alerts/2013/03/29/dns-amplification-attacks",
];

#[derive(Debug)]
pub struct AmplificationCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl AmplificationCheck {
    pub fn new(context: CheckContext) -> AmplificationCheck {
        AmplificationCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Any.output(domain, nameservers.fqdns());

        let checks = nameservers.iter().map(|ns| self.check_nameserver(domain, ns));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let threshold = self.context.config().amplification_threshold;
        let response = match self
            .context
            .client()
            .lookup(domain, RecordType::ANY, nameserver.socket_addr())
            .await
        {
            Ok(response) => response,
            Err(err) => return query_failed(nameserver, domain, err),
        };

        let answers = response.answers().len();
        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);
        result.add_info(format!(
            "{} answered the ANY query with {} records",
            nameserver.fqdn(),
            answers
        ));
        if answers > threshold {
            result.set_vulnerable();
            result.add_info(format!("PoC: dig -t ANY +noall +answer {} @{}", domain, nameserver.fqdn()));
        }

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Any.output(String::new(), IndexSet::new()))
    }
}

#[cfg(test)]
mod tests {
    use hickory_proto::op::ResponseCode;
    use spectral::prelude::*;

    use super::*;
    use crate::checks::testing::{context, nameservers, ns1, ns2};
    use crate::utils::tests::{a_record, response, response_with_rcode, txt_record, StaticTransport};

    fn answers(count: usize) -> hickory_proto::op::Message {
        let records = (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    a_record("example.com", [192, 0, 2, i as u8])
                } else {
                    txt_record("example.com", &format!("record {}", i))
                }
            })
            .collect();
        response(records, vec![])
    }

    async fn run(transport: StaticTransport) -> CheckOutput {
        crate::utils::tests::logging::init();
        let mut check = AmplificationCheck::new(context(transport));
        check.start("example.com", &nameservers()).await.unwrap();
        check.results()
    }

    #[tokio::test]
    async fn seven_answers_are_vulnerable() {
        let transport = StaticTransport::new()
            .with_answer(ns1(), "example.com", RecordType::ANY, answers(7))
            .with_answer(ns2(), "example.com", RecordType::ANY, answers(1));

        let output = run(transport).await;

        assert_that(&output.is_vulnerable()).is_true();
        let vulnerable: Vec<&SingleCheckResult> = output.vulnerable_results().collect();
        assert_that(&vulnerable.len()).is_equal_to(1);
        assert_that(&vulnerable[0].nameserver).is_equal_to("ns1.example.com".to_string());
        assert_that(&vulnerable[0].information[0].contains("ns1.example.com")).is_true();
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let transport = StaticTransport::new().with_default_answer("example.com", RecordType::ANY, answers(5));

        let output = run(transport).await;

        assert_that(&output.is_vulnerable()).is_false();
        assert_that(&output.results.len()).is_equal_to(2);
    }

    #[tokio::test]
    async fn notimp_is_unresolved() {
        let transport = StaticTransport::new().with_default_answer(
            "example.com",
            RecordType::ANY,
            response_with_rcode(ResponseCode::NotImp),
        );

        let output = run(transport).await;

        assert_that(&output.is_vulnerable()).is_false();
        assert_that(&output.results[0].information[0].starts_with("query failed")).is_true();
    }
}
