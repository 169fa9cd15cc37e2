// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Resolution of the authoritative nameservers of a domain.
//!
//! Resolution is all or nothing: if a single nameserver name cannot be resolved to an IPv4 address, the whole
//! resolution fails instead of silently scanning an incomplete set.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use futures::future::try_join_all;
use hickory_proto::rr::{RData, RecordType};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::ScanConfig;
use crate::query::QueryClient;
use crate::{Error, Result};

mod load;

pub use load::resolve_from_file;

const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nameserver {
    fqdn: String,
    ipv4: Ipv4Addr,
}

impl Nameserver {
    /// Creates a nameserver; the FQDN is stored lower case without trailing dot.
    pub fn new<T: AsRef<str>>(fqdn: T, ipv4: Ipv4Addr) -> Nameserver {
        Nameserver {
            fqdn: normalize(fqdn.as_ref()),
            ipv4,
        }
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        self.ipv4
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ipv4.into(), DNS_PORT)
    }
}

impl fmt::Display for Nameserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fqdn, self.ipv4)
    }
}

/// Ordered, duplicate free set of nameservers; immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameserverSet {
    nameservers: IndexMap<String, Nameserver>,
}

impl NameserverSet {
    pub fn new<I: IntoIterator<Item = Nameserver>>(nameservers: I) -> NameserverSet {
        let nameservers = nameservers.into_iter().map(|ns| (ns.fqdn.clone(), ns)).collect();
        NameserverSet { nameservers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nameserver> {
        self.nameservers.values()
    }

    pub fn fqdns(&self) -> IndexSet<String> {
        self.nameservers.keys().cloned().collect()
    }

    pub fn ip<T: AsRef<str>>(&self, fqdn: T) -> Option<Ipv4Addr> {
        self.nameservers.get(&normalize(fqdn.as_ref())).map(Nameserver::ipv4)
    }

    pub fn len(&self) -> usize {
        self.nameservers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nameservers.is_empty()
    }
}

impl FromIterator<Nameserver> for NameserverSet {
    fn from_iter<I: IntoIterator<Item = Nameserver>>(iter: I) -> Self {
        NameserverSet::new(iter)
    }
}

/// Where the nameservers to check come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameserverSource {
    /// Live NS resolution of the scanned domain
    Domain,
    /// Newline separated nameserver names
    File(PathBuf),
}

impl NameserverSource {
    pub async fn resolve(&self, client: &QueryClient, config: &ScanConfig, domain: &str) -> Result<NameserverSet> {
        match self {
            NameserverSource::Domain => resolve(client, config, domain).await,
            NameserverSource::File(path) => resolve_from_file(client, config, path).await,
        }
    }
}

/// Resolves the NS records of `domain` and then each nameserver's IPv4 address via the bootstrap resolver.
#[instrument(name = "resolve nameservers", level = "info", skip(client, config))]
pub async fn resolve(client: &QueryClient, config: &ScanConfig, domain: &str) -> Result<NameserverSet> {
    let response = client
        .lookup(domain, RecordType::NS, config.bootstrap_resolver)
        .await
        .map_err(|e| Error::resolution(domain, e))?;

    let names: IndexSet<String> = response
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::NS(ns) => Some(normalize(&ns.0.to_string())),
            _ => None,
        })
        .collect();
    if names.is_empty() {
        return Err(Error::resolution(domain, "no NS records found"));
    }
    debug!(nameservers = ?names, "Found NS records");

    resolve_names(client, config, domain, names).await
}

pub(crate) async fn resolve_names<I: IntoIterator<Item = String>>(
    client: &QueryClient,
    config: &ScanConfig,
    origin: &str,
    names: I,
) -> Result<NameserverSet> {
    let lookups = names
        .into_iter()
        .map(|name| resolve_ipv4(client, config.bootstrap_resolver, name));
    let nameservers = try_join_all(lookups).await?;
    let set = NameserverSet::new(nameservers);
    info!(origin, count = set.len(), "Resolved nameservers");

    Ok(set)
}

async fn resolve_ipv4(client: &QueryClient, resolver: SocketAddr, name: String) -> Result<Nameserver> {
    let response = client
        .lookup(&name, RecordType::A, resolver)
        .await
        .map_err(|e| Error::resolution(name.as_str(), e))?;

    response
        .answers()
        .iter()
        .find_map(|r| match r.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .map(|ip| Nameserver::new(&name, ip))
        .ok_or_else(|| Error::resolution(name.as_str(), "no A record found"))
}

fn normalize(fqdn: &str) -> String {
    fqdn.trim().trim_end_matches('.').to_lowercase()
}
