// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Distribution of the nameservers over autonomous systems and countries.
//!
//! Unlike the other checks the verdict is not per nameserver: all nameservers that could be mapped to an AS are
//! aggregated and every one of them carries the same verdict.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::checks::{CheckContext, CheckKind};
use crate::nameserver::NameserverSet;
use crate::output::{CheckOutput, SingleCheckResult};
use crate::services::whois::AsnInfo;
use crate::Result;

pub const NAME: &str = "BGP Georedundancy";
pub const DESCRIPTION: &[&str] = &[
    "For ASNs, one important thing to check is georedundancy.",
    "Always check the geographic zone in which an ASN is located.",
    "This is important to guarantee availability.",
];

#[derive(Debug)]
pub struct GeoRedundancyCheck {
    context: CheckContext,
    output: Option<CheckOutput>,
}

impl GeoRedundancyCheck {
    pub fn new(context: CheckContext) -> GeoRedundancyCheck {
        GeoRedundancyCheck { context, output: None }
    }

    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        let mut output = CheckKind::Geo.output(domain, nameservers.fqdns());

        let lookups = self
            .context
            .whois()
            .lookup_all(nameservers.iter().map(|ns| ns.ipv4()))
            .await;

        let mut participants: IndexMap<usize, AsnInfo> = IndexMap::new();
        for (index, (nameserver, lookup)) in nameservers.iter().zip(lookups).enumerate() {
            match lookup {
                Ok(info) => {
                    participants.insert(index, info);
                    output.push(SingleCheckResult::new(nameserver.fqdn(), domain));
                }
                Err(err) => {
                    debug!(nameserver = nameserver.fqdn(), "WHOIS lookup failed: {}", err);
                    output.push(SingleCheckResult::unresolved(
                        nameserver.fqdn(),
                        domain,
                        format!("skipped from georedundancy: {}", err),
                    ));
                }
            }
        }

        if !participants.is_empty() {
            let (vulnerable, information) = evaluate(participants.values());
            for (index, info) in &participants {
                let result = &mut output.results[*index];
                if vulnerable {
                    result.set_vulnerable();
                }
                result.add_info(format!("AS{} ({})", info.asn, info.holder));
                result.extend_info(information.clone());
            }
        }
        self.output = Some(output);

        Ok(())
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Geo.output(String::new(), IndexSet::new()))
    }
}

/// Aggregates ASNs and countries; nameservers without a known country do not count as a location.
pub fn evaluate<'a, I: IntoIterator<Item = &'a AsnInfo>>(infos: I) -> (bool, Vec<String>) {
    let mut asns: IndexSet<u32> = IndexSet::new();
    let mut locations: IndexSet<String> = IndexSet::new();
    for info in infos {
        asns.insert(info.asn);
        if let Some(country) = &info.country {
            locations.insert(country.clone());
        }
    }

    let mut vulnerable = false;
    let mut information = Vec::new();
    if asns.len() < 2 {
        vulnerable = true;
        information.push("bad georedundancy: single AS".to_string());
    }
    match locations.len() {
        0 => {
            vulnerable = true;
            information.push("bad georedundancy: no known location".to_string());
        }
        1 => {
            vulnerable = true;
            information.push("bad georedundancy: 1 location".to_string());
        }
        n if asns.len() > 2 * n => {
            vulnerable = true;
            information.push("ideally, you should have every 1 or 2 ASNs in different countries".to_string());
        }
        _ => {}
    }

    information.push(format!(
        "{} ASNs distributed over {} locations",
        asns.len(),
        locations.len()
    ));
    information.push(format!(
        "countries: {}",
        locations.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    ));

    (vulnerable, information)
}
