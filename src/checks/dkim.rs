// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Probing of commonly used DKIM selectors.
//!
//! DKIM keys live at `<selector>._domainkey.<domain>` and selectors cannot be enumerated, so this check can only
//! guess. A domain using an uncommon selector is reported as vulnerable.

use futures::future::join_all;
use hickory_proto::rr::RecordType;
use indexmap::IndexSet;
use tracing::trace;

use crate::checks::{query_failed, CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::query;
use crate::resources::txt_strings;
use crate::Result;

pub const NAME: &str = "DKIM Record";
pub const DESCRIPTION: &[&str] = &[
    "DKIM publishes public keys in TXT records that receivers use to verify that an",
    "email really originates from the advertised organization.",
];

#[derive(Debug)]
pub struct DkimCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

enum SelectorLookup {
    Found,
    /// `NOERROR` without TXT data
    NoData,
    Missing,
    Failed(query::Error),
}

impl DkimCheck {
    pub fn new(context: CheckContext) -> DkimCheck {
        DkimCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Dkim.output(domain, nameservers.fqdns());
        let selectors = selectors(domain, &self.context.config().dkim_selectors);

        let checks = nameservers
            .iter()
            .map(|ns| self.check_nameserver(domain, ns, &selectors));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver, selectors: &[String]) -> SingleCheckResult {
        let lookups = join_all(selectors.iter().map(|s| self.lookup_selector(domain, s, nameserver))).await;

        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);
        let mut failures = Vec::new();
        let mut no_data = Vec::new();
        for (selector, lookup) in selectors.iter().zip(lookups) {
            match lookup {
                SelectorLookup::Found => result.add_info(format!("selector = {}", selector)),
                SelectorLookup::NoData => no_data.push(selector.as_str()),
                SelectorLookup::Missing => {}
                SelectorLookup::Failed(err) => failures.push(err),
            }
        }

        if result.information.is_empty() {
            // Without a single answer there is no evidence either way
            if !failures.is_empty() && failures.len() == selectors.len() {
                return query_failed(nameserver, domain, &failures[0]);
            }
            result.set_vulnerable();
            result.add_info("no DKIM record found on nameserver");
            if !no_data.is_empty() {
                result.add_info(format!(
                    "selectors answered NOERROR without TXT data: {}",
                    no_data.join(", ")
                ));
            }
        }

        result
    }

    async fn lookup_selector(&self, domain: &str, selector: &str, nameserver: &Nameserver) -> SelectorLookup {
        let name = format!("{}._domainkey.{}", selector, domain.trim_end_matches('.'));
        match self
            .context
            .client()
            .lookup(&name, RecordType::TXT, nameserver.socket_addr())
            .await
        {
            Ok(response) if !txt_strings(response.answers()).is_empty() => SelectorLookup::Found,
            Ok(_) => SelectorLookup::NoData,
            Err(query::Error::ResponseCode { .. }) => SelectorLookup::Missing,
            Err(err) => {
                trace!(%name, "DKIM selector lookup failed: {}", err);
                SelectorLookup::Failed(err)
            }
        }
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Dkim.output(String::new(), IndexSet::new()))
    }
}

/// The second level label of `domain` followed by the configured selectors, without duplicates.
pub fn selectors(domain: &str, configured: &[String]) -> Vec<String> {
    let sld = domain.trim_end_matches('.').rsplit('.').nth(1).map(str::to_lowercase);

    let selectors: IndexSet<String> = sld.into_iter().chain(configured.iter().cloned()).collect();
    selectors.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use hickory_proto::op::ResponseCode;
    use spectral::prelude::*;

    use super::*;
    use crate::checks::testing::{context, context_with, nameservers, ns1, ns2};
    use crate::config::ScanConfig;
    use crate::utils::tests::{response, response_with_rcode, txt_record, StaticTransport, StaticWhois};

    fn dkim_key(name: &str) -> hickory_proto::op::Message {
        response(vec![txt_record(name, "v=DKIM1; k=rsa; p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA")], vec![])
    }

    #[test]
    fn selectors_start_with_second_level_label() {
        let configured = vec!["default".to_string(), "example".to_string(), "google".to_string()];

        let selectors = selectors("mail.Example.com.", &configured);

        assert_that(&selectors).is_equal_to(vec!["example".to_string(), "default".to_string(), "google".to_string()]);
    }

    #[tokio::test]
    async fn found_selectors_are_listed() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new()
            .with_default_answer("google._domainkey.example.com", RecordType::TXT, dkim_key("google._domainkey.example.com"))
            .with_answer(ns1(), "selector1._domainkey.example.com", RecordType::TXT, dkim_key("selector1._domainkey.example.com"));
        let mut check = DkimCheck::new(context(transport.clone()));

        check.start("example.com", &nameservers()).await.unwrap();
        let output = check.results();

        assert_that(&output.is_vulnerable()).is_false();
        assert_that(&output.results[0].information)
            .is_equal_to(vec!["selector = google".to_string(), "selector = selector1".to_string()]);
        assert_that(&output.results[1].information).is_equal_to(vec!["selector = google".to_string()]);
        assert_that(&transport.requests_for("example._domainkey.example.com", RecordType::TXT)).is_equal_to(2);
    }

    #[tokio::test]
    async fn no_selector_is_vulnerable() {
        crate::utils::tests::logging::init();
        let transport = StaticTransport::new().with_answer(
            ns2(),
            "default._domainkey.example.com",
            RecordType::TXT,
            response_with_rcode(ResponseCode::Refused),
        );
        let mut check = DkimCheck::new(context(transport));

        check.start("example.com", &nameservers()).await.unwrap();
        let output = check.results();

        assert_that(&output.vulnerable_results().count()).is_equal_to(2);
        assert_that(&output.results[0].information).is_equal_to(vec!["no DKIM record found on nameserver".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_nameserver_is_unresolved() {
        crate::utils::tests::logging::init();
        let config = ScanConfig::default().with_dkim_selectors(vec!["default"]);
        let transport = StaticTransport::new()
            .with_error(ns1(), "example._domainkey.example.com", RecordType::TXT, crate::query::Error::Timeout)
            .with_error(ns1(), "default._domainkey.example.com", RecordType::TXT, crate::query::Error::Timeout);
        let mut check = DkimCheck::new(context_with(transport, StaticWhois::new(), config));

        check.start("example.com", &nameservers()).await.unwrap();
        let output = check.results();

        assert_that(&output.results[0].vulnerable).is_false();
        assert_that(&output.results[0].information[0]).is_equal_to("query failed: request timed out".to_string());
        assert_that(&output.results[1].vulnerable).is_true();
    }

    #[tokio::test]
    async fn nodata_selectors_are_named() {
        crate::utils::tests::logging::init();
        let config = ScanConfig::default().with_dkim_selectors(vec!["default", "mail"]);
        let transport = StaticTransport::new()
            .with_default_answer("default._domainkey.example.com", RecordType::TXT, response(vec![], vec![]))
            .with_default_answer("mail._domainkey.example.com", RecordType::TXT, response(vec![], vec![]));
        let mut check = DkimCheck::new(context_with(transport.clone(), StaticWhois::new(), config));

        check.start("example.com", &nameservers()).await.unwrap();
        let output = check.results();

        assert_that(&output.results[0].vulnerable).is_true();
        assert_that(&output.results[0].information).is_equal_to(vec![
            "no DKIM record found on nameserver".to_string(),
            "selectors answered NOERROR without TXT data: default, mail".to_string(),
        ]);
        assert_that(&transport.requests().iter().all(|r| r.recursion_desired)).is_true();
    }
}
