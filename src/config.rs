// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Serialize;

/// Equivalent to dns.google; used for nameserver resolution and for checks scoped to a recursive resolver.
pub const DEFAULT_BOOTSTRAP_RESOLVER: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);

/// Number of answer records from which an ANY response counts as "considerably larger than the request".
pub const DEFAULT_AMPLIFICATION_THRESHOLD: usize = 5;

/// RIPEstat data API; serves network, AS, and location information of IP addresses.
pub const DEFAULT_WHOIS_URL: &str = "https://stat.ripe.net/data";

pub const DEFAULT_SPF_MAX_DEPTH: usize = 3;

pub static DEFAULT_DKIM_SELECTORS: &[&str] = &[
    "default",
    "dkim",
    "dkim-shared",
    "dkimpal",
    "email",
    "gamma",
    "google",
    "mail",
    "mdaemon",
    "selector",
    "selector1",
    "selector2",
    "selector3",
    "selector4",
    "selector5",
];

/// Configuration of a scan.
///
/// Passed explicitly to the nameserver resolution and to every check so tests can use other resolvers or thresholds
/// without touching process wide state.
#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    pub bootstrap_resolver: SocketAddr,
    /// Timeout of every single DNS query
    pub query_timeout: Duration,
    /// Timeout of a complete zone transfer session
    pub transfer_timeout: Duration,
    /// Timeout of the whole batch of checks
    pub scan_timeout: Duration,
    pub amplification_threshold: usize,
    pub spf_max_depth: usize,
    /// DKIM selectors to look up in addition to the second level label of the domain
    pub dkim_selectors: Vec<String>,
    /// Base URL of the RIPEstat data API
    pub whois_url: String,
    pub whois_timeout: Duration,
}

impl ScanConfig {
    pub fn with_bootstrap_resolver<T: Into<SocketAddr>>(self, bootstrap_resolver: T) -> ScanConfig {
        ScanConfig {
            bootstrap_resolver: bootstrap_resolver.into(),
            ..self
        }
    }

    pub fn with_query_timeout(self, query_timeout: Duration) -> ScanConfig {
        ScanConfig { query_timeout, ..self }
    }

    pub fn with_transfer_timeout(self, transfer_timeout: Duration) -> ScanConfig {
        ScanConfig {
            transfer_timeout,
            ..self
        }
    }

    pub fn with_scan_timeout(self, scan_timeout: Duration) -> ScanConfig {
        ScanConfig { scan_timeout, ..self }
    }

    pub fn with_amplification_threshold(self, amplification_threshold: usize) -> ScanConfig {
        ScanConfig {
            amplification_threshold,
            ..self
        }
    }

    pub fn with_spf_max_depth(self, spf_max_depth: usize) -> ScanConfig {
        ScanConfig { spf_max_depth, ..self }
    }

    pub fn with_dkim_selectors<I: IntoIterator<Item = T>, T: Into<String>>(self, selectors: I) -> ScanConfig {
        ScanConfig {
            dkim_selectors: selectors.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn with_whois_url<T: Into<String>>(self, whois_url: T) -> ScanConfig {
        ScanConfig {
            whois_url: whois_url.into(),
            ..self
        }
    }

    pub fn with_whois_timeout(self, whois_timeout: Duration) -> ScanConfig {
        ScanConfig { whois_timeout, ..self }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            bootstrap_resolver: DEFAULT_BOOTSTRAP_RESOLVER,
            query_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(300),
            amplification_threshold: DEFAULT_AMPLIFICATION_THRESHOLD,
            spf_max_depth: DEFAULT_SPF_MAX_DEPTH,
            dkim_selectors: DEFAULT_DKIM_SELECTORS.iter().map(ToString::to_string).collect(),
            whois_url: DEFAULT_WHOIS_URL.to_string(),
            whois_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use spectral::prelude::*;

    use super::*;

    #[test]
    fn defaults() {
        let config = ScanConfig::default();

        assert_that(&config.bootstrap_resolver).is_equal_to("8.8.8.8:53".parse::<SocketAddr>().unwrap());
        assert_that(&config.amplification_threshold).is_equal_to(5);
        assert_that(&config.spf_max_depth).is_equal_to(3);
        assert_that(&config.query_timeout).is_equal_to(Duration::from_secs(2));
        assert_that(&config.dkim_selectors).contains(&"selector1".to_string());
    }

    #[test]
    fn builder_overrides_single_field() {
        let config = ScanConfig::default()
            .with_bootstrap_resolver(([127, 0, 0, 1], 5353))
            .with_amplification_threshold(10);

        assert_that(&config.bootstrap_resolver).is_equal_to("127.0.0.1:5353".parse::<SocketAddr>().unwrap());
        assert_that(&config.amplification_threshold).is_equal_to(10);
        assert_that(&config.whois_url).is_equal_to(DEFAULT_WHOIS_URL.to_string());
    }
}
