// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! IP to AS and location lookups via the RIPEstat data API.
//!
//! A lookup takes three requests: `network-info` yields the origin AS of the covering prefix, `as-overview` the
//! registered holder of that AS, and `maxmind-geo-lite` the country of the address. Holders are cached per AS
//! because the nameservers of a domain often share their AS.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use lru_time_cache::LruCache;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::config::ScanConfig;
use crate::services::{Error, Result};

pub mod parser;

static SOURCE_APP: &str = env!("CARGO_PKG_NAME");

/// Upper bound of a single RIPEstat document; real answers are a few KiB.
pub const MAX_RESPONSE_SIZE: usize = 512 * 1024;

const HOLDER_CACHE_SIZE: usize = 256;
const HOLDER_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum QueryType {
    NetworkInfo,
    AsOverview,
    GeoLocation,
}

impl QueryType {
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryType::NetworkInfo => "network-info",
            QueryType::AsOverview => "as-overview",
            QueryType::GeoLocation => "maxmind-geo-lite",
        }
    }
}

/// Routing information of a single IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsnInfo {
    pub asn: u32,
    pub ip: IpAddr,
    /// Registered holder of the AS, e.g. `GOOGLE - Google LLC`
    pub holder: String,
    pub country: Option<String>,
}

/// Fetches one RIPEstat document and returns its JSON body.
pub trait WhoisTransport: Send + Sync + fmt::Debug {
    fn request(&self, query_type: QueryType, resource: String) -> BoxFuture<'_, Result<String>>;
}

#[derive(Debug, Clone)]
pub struct RipeStatTransport {
    client: reqwest::Client,
    base_url: String,
}

impl RipeStatTransport {
    pub fn new<T: Into<String>>(base_url: T, timeout: Duration) -> Result<RipeStatTransport> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(RipeStatTransport::with_client(client, base_url))
    }

    pub fn with_client<T: Into<String>>(client: reqwest::Client, base_url: T) -> RipeStatTransport {
        RipeStatTransport {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, query_type: QueryType) -> String {
        format!("{}/{}/data.json", self.base_url.trim_end_matches('/'), query_type.endpoint())
    }
}

impl WhoisTransport for RipeStatTransport {
    fn request(&self, query_type: QueryType, resource: String) -> BoxFuture<'_, Result<String>> {
        async move {
            let mut response = self
                .client
                .get(self.url(query_type))
                .query(&[("resource", resource.as_str()), ("sourceapp", SOURCE_APP)])
                .send()
                .await?
                .error_for_status()?;

            let mut body: Vec<u8> = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                    return Err(Error::ResponseTooLarge {
                        limit: MAX_RESPONSE_SIZE,
                    });
                }
                body.extend_from_slice(&chunk);
            }

            Ok(String::from_utf8_lossy(&body).into_owned())
        }
        .boxed()
    }
}

#[derive(Clone)]
pub struct WhoisClient {
    transport: Arc<dyn WhoisTransport>,
    timeout: Duration,
    holders: Arc<Mutex<LruCache<u32, String>>>,
}

impl WhoisClient {
    pub fn new(transport: Arc<dyn WhoisTransport>, timeout: Duration) -> WhoisClient {
        let holders = LruCache::with_expiry_duration_and_capacity(HOLDER_CACHE_TTL, HOLDER_CACHE_SIZE);
        WhoisClient {
            transport,
            timeout,
            holders: Arc::new(Mutex::new(holders)),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Result<WhoisClient> {
        let transport = RipeStatTransport::new(config.whois_url.as_str(), config.whois_timeout)?;
        Ok(WhoisClient::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn WhoisTransport>, config: &ScanConfig) -> WhoisClient {
        WhoisClient::new(transport, config.whois_timeout)
    }

    /// Resolves origin AS, holder, and country of `ip`.
    ///
    /// An address without origin AS is a parse error. A failed location lookup only leaves the country unknown.
    #[instrument(name = "whois", level = "debug", skip(self))]
    pub async fn lookup(&self, ip: Ipv4Addr) -> Result<AsnInfo> {
        let document = self.fetch(QueryType::NetworkInfo, ip.to_string()).await?;
        let asn = parser::parse_network_info(&document)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(format!("prefix of {} is not announced", ip)))?;

        let (holder, country) = futures::join!(self.holder(asn), self.country(ip));
        let holder = holder?;
        let country = country.unwrap_or_else(|err| {
            debug!(%ip, "Location lookup failed: {}", err);
            None
        });
        debug!(asn, holder = %holder, country = ?country, "Resolved AS");

        Ok(AsnInfo {
            asn,
            ip: IpAddr::V4(ip),
            holder,
            country,
        })
    }

    /// Looks up all addresses concurrently; results are in the order of `ips`.
    pub async fn lookup_all<I: IntoIterator<Item = Ipv4Addr>>(&self, ips: I) -> Vec<Result<AsnInfo>> {
        let lookups = ips.into_iter().map(|ip| self.lookup(ip));
        join_all(lookups).await
    }

    async fn holder(&self, asn: u32) -> Result<String> {
        if let Some(holder) = self.cached_holder(asn) {
            trace!(asn, "AS holder cache hit");
            return Ok(holder);
        }

        let document = self.fetch(QueryType::AsOverview, format!("AS{}", asn)).await?;
        let holder = parser::parse_as_overview(&document)?;
        if let Ok(mut holders) = self.holders.lock() {
            holders.insert(asn, holder.clone());
        }

        Ok(holder)
    }

    fn cached_holder(&self, asn: u32) -> Option<String> {
        self.holders.lock().ok()?.get(&asn).cloned()
    }

    async fn country(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        let document = self.fetch(QueryType::GeoLocation, ip.to_string()).await?;
        parser::parse_geo_location(&document)
    }

    async fn fetch(&self, query_type: QueryType, resource: String) -> Result<String> {
        let request = self.transport.request(query_type, resource);
        let document = tokio::time::timeout(self.timeout, request).await??;
        trace!(endpoint = query_type.endpoint(), bytes = document.len(), "Received RIPEstat document");

        Ok(document)
    }
}

impl fmt::Debug for WhoisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhoisClient")
            .field("transport", &self.transport)
            .field("timeout", &self.timeout)
            .finish()
    }
}
