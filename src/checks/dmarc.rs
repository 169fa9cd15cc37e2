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
use crate::resources::parsed_txt::{Dmarc, Policy};
use crate::resources::txt_strings;
use crate::Result;

pub const NAME: &str = "DMARC Record";
pub const DESCRIPTION: &[&str] = &[
    "DMARC ties SPF and DKIM together and tells receivers what to do with mails failing",
    "both: nothing (none), deliver as spam (quarantine), or refuse them (reject).",
];

const NO_RECORD: &str = "no DMARC record found";

#[derive(Debug)]
pub struct DmarcCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl DmarcCheck {
    pub fn new(context: CheckContext) -> DmarcCheck {
        DmarcCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Dmarc.output(domain, nameservers.fqdns());

        let checks = nameservers.iter().map(|ns| self.check_nameserver(domain, ns));
        output.results = join_all(checks).await;
        self.output = Some(output);

        Ok(())
    }

    async fn check_nameserver(&self, domain: &str, nameserver: &Nameserver) -> SingleCheckResult {
        let name = format!("_dmarc.{}", domain.trim_end_matches('.'));
        let mut result = SingleCheckResult::new(nameserver.fqdn(), domain);

        let answers = match self
            .context
            .client()
            .lookup(&name, RecordType::TXT, nameserver.socket_addr())
            .await
        {
            Ok(response) => txt_strings(response.answers()),
            Err(err) if err.is_nxdomain() => Vec::new(),
            Err(err) => return query_failed(nameserver, domain, err),
        };

        let Some(record) = answers
            .into_iter()
            .find(|txt| txt.trim_start().to_ascii_lowercase().starts_with("v=dmarc1"))
        else {
            result.add_info(NO_RECORD);
            return result;
        };
        result.add_info(format!("DMARC record: {}", record));

        match Dmarc::from_str(&record) {
            Ok(dmarc) => {
                let (vulnerable, information) = evaluate(&dmarc);
                if vulnerable {
                    result.set_vulnerable();
                }
                result.extend_info(information);
            }
            Err(err) => result.add_info(format!("invalid DMARC record: {}", err)),
        }

        if result.vulnerable {
            result.add_info(format!("PoC: dig -t TXT +noall +answer {} @{}", name, nameserver.fqdn()));
        }

        result
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Dmarc.output(String::new(), IndexSet::new()))
    }
}

/// `none` and `quarantine` are too weak, for the domain as well as for its subdomains.
pub fn evaluate(dmarc: &Dmarc) -> (bool, Vec<String>) {
    let mut vulnerable = false;
    let mut information = Vec::new();

    let policy = dmarc.policy();
    match policy {
        Some(Policy::None) => {
            vulnerable = true;
            information.push("insecure policy: none".to_string());
        }
        Some(Policy::Quarantine) => {
            vulnerable = true;
            information.push("partially secure policy: quarantine".to_string());
        }
        Some(Policy::Reject) => information.push("secure policy: reject".to_string()),
        None => information.push("missing or invalid policy tag".to_string()),
    }

    if let (Some(sp), Some(p)) = (dmarc.subdomain_policy(), policy) {
        if sp < p {
            vulnerable = true;
            information.push(format!("weaker subdomain policy: {}", sp));
        }
    }

    let pct = dmarc.percentage();
    if pct < 100 {
        information.push(format!("policy applies to {}% of failing mails only", pct));
    }

    (vulnerable, information)
}
