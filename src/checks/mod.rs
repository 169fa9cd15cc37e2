// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The security checks.
//!
//! Every check goes through the same life cycle: it is created by [`Check::init`] from its [`CheckKind`] and a shared
//! [`CheckContext`], runs exactly once via [`Check::start`], and is consumed by [`Check::results`]. Failures of a
//! single nameserver never abort a check; they are recorded as non-vulnerable results explaining what went wrong.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::instrument;

use crate::config::ScanConfig;
use crate::nameserver::{Nameserver, NameserverSet};
use crate::output::{CheckOutput, SingleCheckResult};
use crate::query::QueryClient;
use crate::services::whois::WhoisClient;
use crate::{Error, Result};

pub mod amplification;
pub mod dkim;
pub mod dmarc;
pub mod dnssec;
pub mod georedundancy;
pub mod glue;
pub mod soa;
pub mod spf;
pub mod zone_transfer;

pub use amplification::AmplificationCheck;
pub use dkim::DkimCheck;
pub use dmarc::DmarcCheck;
pub use dnssec::DnssecCheck;
pub use georedundancy::GeoRedundancyCheck;
pub use glue::GlueCheck;
pub use soa::SoaCheck;
pub use spf::SpfCheck;
pub use zone_transfer::ZoneTransferCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Soa,
    Any,
    Glue,
    Zone,
    Dnssec,
    Spf,
    Dmarc,
    Dkim,
    Geo,
}

impl CheckKind {
    /// All kinds in canonical order.
    pub fn all() -> Vec<CheckKind> {
        vec![
            CheckKind::Soa,
            CheckKind::Any,
            CheckKind::Glue,
            CheckKind::Zone,
            CheckKind::Dnssec,
            CheckKind::Spf,
            CheckKind::Dmarc,
            CheckKind::Dkim,
            CheckKind::Geo,
        ]
    }

    /// Parses check identifiers, each possibly a comma separated list; `all` selects every kind.
    ///
    /// Duplicates are dropped, the first occurrence determines the order.
    pub fn parse_list<I: IntoIterator<Item = S>, S: AsRef<str>>(values: I) -> Result<Vec<CheckKind>> {
        let mut kinds: IndexSet<CheckKind> = IndexSet::new();
        for value in values {
            for id in value.as_ref().split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if id.eq_ignore_ascii_case("all") {
                    kinds.extend(CheckKind::all());
                } else {
                    kinds.insert(id.parse()?);
                }
            }
        }

        Ok(kinds.into_iter().collect())
    }

    pub fn id(&self) -> &'static str {
        match self {
            CheckKind::Soa => "soa",
            CheckKind::Any => "any",
            CheckKind::Glue => "glue",
            CheckKind::Zone => "zone",
            CheckKind::Dnssec => "dnssec",
            CheckKind::Spf => "spf",
            CheckKind::Dmarc => "dmarc",
            CheckKind::Dkim => "dkim",
            CheckKind::Geo => "geo",
        }
    }

    /// Human readable name used as [`CheckOutput::name`].
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Soa => soa::NAME,
            CheckKind::Any => amplification::NAME,
            CheckKind::Glue => glue::NAME,
            CheckKind::Zone => zone_transfer::NAME,
            CheckKind::Dnssec => dnssec::NAME,
            CheckKind::Spf => spf::NAME,
            CheckKind::Dmarc => dmarc::NAME,
            CheckKind::Dkim => dkim::NAME,
            CheckKind::Geo => georedundancy::NAME,
        }
    }

    pub fn description(&self) -> &'static [&'static str] {
        match self {
            CheckKind::Soa => soa::DESCRIPTION,
            CheckKind::Any => amplification::DESCRIPTION,
            CheckKind::Glue => glue::DESCRIPTION,
            CheckKind::Zone => zone_transfer::DESCRIPTION,
            CheckKind::Dnssec => dnssec::DESCRIPTION,
            CheckKind::Spf => spf::DESCRIPTION,
            CheckKind::Dmarc => dmarc::DESCRIPTION,
            CheckKind::Dkim => dkim::DESCRIPTION,
            CheckKind::Geo => georedundancy::DESCRIPTION,
        }
    }

    /// An output of this kind without results.
    pub fn output<D: Into<String>>(&self, domain: D, nameservers: IndexSet<String>) -> CheckOutput {
        CheckOutput::new(self.name(), domain, nameservers, self.description())
    }

    /// Output of a check that could not produce its own; one unresolved result per nameserver.
    pub fn unresolved_output<R: fmt::Display>(&self, domain: &str, nameservers: &NameserverSet, reason: R) -> CheckOutput {
        let mut output = self.output(domain, nameservers.fqdns());
        for ns in nameservers.iter() {
            output.push(SingleCheckResult::unresolved(ns.fqdn(), domain, &reason));
        }
        output
    }
}

impl FromStr for CheckKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CheckKind::all()
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ParserError {
                what: s.to_string(),
                to: "CheckKind",
                why: format!(
                    "unknown check, expected one of {}, all",
                    CheckKind::all().iter().map(CheckKind::id).collect::<Vec<_>>().join(", ")
                ),
            })
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Handles shared by all checks of a scan.
#[derive(Debug, Clone)]
pub struct CheckContext {
    client: QueryClient,
    whois: WhoisClient,
    config: Arc<ScanConfig>,
}

impl CheckContext {
    pub fn new(client: QueryClient, whois: WhoisClient, config: Arc<ScanConfig>) -> CheckContext {
        CheckContext { client, whois, config }
    }

    /// Network backed clients configured by `config`.
    pub fn from_config(config: Arc<ScanConfig>) -> Result<CheckContext> {
        let whois = WhoisClient::from_config(&config)?;
        Ok(CheckContext::new(QueryClient::from_config(&config), whois, config))
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn whois(&self) -> &WhoisClient {
        &self.whois
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

#[derive(Debug)]
pub enum Check {
    Soa(SoaCheck),
    Amplification(AmplificationCheck),
    Glue(GlueCheck),
    ZoneTransfer(ZoneTransferCheck),
    Dnssec(DnssecCheck),
    Spf(SpfCheck),
    Dmarc(DmarcCheck),
    Dkim(DkimCheck),
    GeoRedundancy(GeoRedundancyCheck),
}

impl Check {
    pub fn init(kind: CheckKind, context: CheckContext) -> Check {
        match kind {
            CheckKind::Soa => Check::Soa(SoaCheck::new(context)),
            CheckKind::Any => Check::Amplification(AmplificationCheck::new(context)),
            CheckKind::Glue => Check::Glue(GlueCheck::new(context)),
            CheckKind::Zone => Check::ZoneTransfer(ZoneTransferCheck::new(context)),
            CheckKind::Dnssec => Check::Dnssec(DnssecCheck::new(context)),
            CheckKind::Spf => Check::Spf(SpfCheck::new(context)),
            CheckKind::Dmarc => Check::Dmarc(DmarcCheck::new(context)),
            CheckKind::Dkim => Check::Dkim(DkimCheck::new(context)),
            CheckKind::Geo => Check::GeoRedundancy(GeoRedundancyCheck::new(context)),
        }
    }

    pub fn kind(&self) -> CheckKind {
        match self {
            Check::Soa(_) => CheckKind::Soa,
            Check::Amplification(_) => CheckKind::Any,
            Check::Glue(_) => CheckKind::Glue,
            Check::ZoneTransfer(_) => CheckKind::Zone,
            Check::Dnssec(_) => CheckKind::Dnssec,
            Check::Spf(_) => CheckKind::Spf,
            Check::Dmarc(_) => CheckKind::Dmarc,
            Check::Dkim(_) => CheckKind::Dkim,
            Check::GeoRedundancy(_) => CheckKind::Geo,
        }
    }

    /// Runs the check once; an `Err` still leaves the partial output available via [`Check::results`].
    #[instrument(name = "check", level = "info", skip_all, fields(check = %self.kind(), domain = %domain))]
    pub async fn start(&mut self, domain: &str, nameservers: &NameserverSet) -> Result<()> {
        match self {
            Check::Soa(check) => check.start(domain, nameservers).await,
            Check::Amplification(check) => check.start(domain, nameservers).await,
            Check::Glue(check) => check.start(domain, nameservers).await,
            Check::ZoneTransfer(check) => check.start(domain, nameservers).await,
            Check::Dnssec(check) => check.start(domain, nameservers).await,
            Check::Spf(check) => check.start(domain, nameservers).await,
            Check::Dmarc(check) => check.start(domain, nameservers).await,
            Check::Dkim(check) => check.start(domain, nameservers).await,
            Check::GeoRedundancy(check) => check.start(domain, nameservers).await,
        }
    }

    pub fn results(self) -> CheckOutput {
        match self {
            Check::Soa(check) => check.results(),
            Check::Amplification(check) => check.results(),
            Check::Glue(check) => check.results(),
            Check::ZoneTransfer(check) => check.results(),
            Check::Dnssec(check) => check.results(),
            Check::Spf(check) => check.results(),
            Check::Dmarc(check) => check.results(),
            Check::Dkim(check) => check.results(),
            Check::GeoRedundancy(check) => check.results(),
        }
    }
}

fn query_failed<E: fmt::Display>(nameserver: &Nameserver, domain: &str, error: E) -> SingleCheckResult {
    SingleCheckResult::unresolved(nameserver.fqdn(), domain, format!("query failed: {}", error))
}
