// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use futures::future::join_all;
use hickory_proto::rr::{Record, RecordType};
use indexmap::IndexSet;

use crate::checks::{query_failed, CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::query::Request;
use crate::Result;

pub const NAME: &str = "GLUE Record";
pub const DESCRIPTION: &[&str] = &[
    "Glue records are A or AAAA records of nameservers delivered in the additional",
    "section of an NS answer. They break the circular dependency of resolving a",
    "nameserver that lives inside the zone it serves. Missing glue is of medium severity.",
];

#[derive(Debug)]
pub struct GlueCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl GlueCheck {
    pub fn new(context: CheckContext) -> GlueCheck {
        GlueCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Glue.output(domain, nameservers.fqdns());

        let checks = nameservers.iter().map(|ns| self.check_nameserver(domain, ns));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let request = match Request::new(domain, RecordType::NS) {
            Ok(request) => request.recursion_desired(false),
            Err(err) => return query_failed(nameserver, domain, err),
        };
        let response = match self.context.client().query(&request, nameserver.socket_addr()).await {
            Ok(response) => response,
            Err(err) => return query_failed(nameserver, domain, err),
        };

        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);
        match find_glue(response.additionals(), &nameserver.ipv4().to_string()) {
            Some(glue) => result.add_info(format!("glue record found: {}", glue)),
            None => {
                result.set_vulnerable();
                result.add_info(format!(
                    "no glue record for {} ({}) in additional section",
                    nameserver.fqdn(),
                    nameserver.ipv4()
                ));
            }
        }

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Glue.output(String::new(), IndexSet::new()))
    }
}

/// First A or AAAA record whose textual form contains `ip`.
fn find_glue<'a>(additionals: &'a [Record], ip: &str) -> Option<&'a Record> {
    additionals
        .iter()
        .filter(|r| matches!(r.record_type(), RecordType::A | RecordType::AAAA))
        .find(|r| r.to_string().contains(ip))
}
