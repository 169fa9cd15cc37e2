// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Presence of DNSKEY records; signatures are not validated.

use futures::future::join_all;
use hickory_proto::rr::RecordType;
use indexmap::IndexSet;

use crate::checks::{query_failed, CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::Result;

pub const NAME: &str = "DNSSEC implementation";
pub const DESCRIPTION: &[&str] = &[
    "DNSSEC signs zone data so resolvers can verify integrity and authenticated denial",
    "of existence. Without it, answers can be forged and caches poisoned.",
];

#[derive(Debug)]
pub struct DnssecCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl DnssecCheck {
    pub fn new(context: CheckContext) -> DnssecCheck {
        DnssecCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Dnssec.output(domain, nameservers.fqdns());

        let checks = nameservers.iter().map(|ns| self.check_nameserver(domain, ns));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let response = match self
            .context
            .client()
            .lookup(domain, RecordType::DNSKEY, nameserver.socket_addr())
            .await
        {
            Ok(response) => response,
            Err(err) => return query_failed(nameserver, domain, err),
        };

        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);
        let keys = response.answers().len();
        if keys == 0 {
            result.set_vulnerable();
            result.add_info("no DNSKEY record published");
            result.add_info(format!("PoC: dig -t DNSKEY +noall +answer {} @{}", domain, nameserver.fqdn()));
        } else {
            result.add_info(format!("{} DNSKEY records published", keys));
        }

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Dnssec.output(String::new(), IndexSet::new()))
    }
}
