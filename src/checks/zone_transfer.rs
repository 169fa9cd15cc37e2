// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use futures::future::join_all;
use hickory_proto::rr::{Record, RecordType};
use indexmap::IndexSet;
use tracing::debug;

use crate::checks::{CheckContext, CheckKind};
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::resources::txt_string;
use crate::Result;

pub const NAME: &str = "Unprotected Zone Transfer";
pub const DESCRIPTION: &[&str] = &[
    "A zone transfer (AXFR) copies the whole zone from one nameserver to another.",
    "If any host may request it, an attacker learns every record of the zone at once.",
];

#[derive(Debug)]
pub struct ZoneTransferCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl ZoneTransferCheck {
    pub fn new(context: CheckContext) -> ZoneTransferCheck {
        ZoneTransferCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Zone.output(domain, nameservers.fqdns());

        let checks = nameservers.iter().map(|ns| self.check_nameserver(domain, ns));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);

        let records = match self.context.client().transfer(domain, nameserver.socket_addr()).await {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                result.add_info(refused(nameserver, "no records transferred"));
                return result;
            }
            Err(err) => {
                debug!(nameserver = nameserver.fqdn(), "Zone transfer failed: {}", err);
                result.add_info(refused(nameserver, err));
                return result;
            }
        };

        result.set_vulnerable();
        result.add_info(format!("zone transfer succeeded: {} records disclosed", records.len()));
        result.extend_info(records.iter().filter_map(disclosed));

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Zone.output(String::new(), IndexSet::new()))
    }
}

fn refused<R: std::fmt::Display>(nameserver: &Nameserver, reason: R) -> String {
    format!("{} refuses unauthenticated zone transfers ({})", nameserver.fqdn(), reason)
}

/// Renders records worth showing as evidence; everything else is only counted.
fn disclosed(record: &Record) -> Option<String> {
    let data = match record.record_type() {
        RecordType::TXT => txt_string(record)?,
        RecordType::A | RecordType::AAAA | RecordType::MX | RecordType::NS | RecordType::CNAME => {
            record.data().to_string()
        }
        _ => return None,
    };

    Some(format!("{} ==> ({}) {}", record.name(), record.record_type(), data))
}
