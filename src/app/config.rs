// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::convert::TryFrom;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;

use crate::checks::CheckKind;
use crate::config::ScanConfig;
use crate::nameserver::NameserverSource;

#[derive(Debug)]
pub struct AppConfig {
    pub domain: String,
    pub outfile: Option<PathBuf>,
    pub nsfile: Option<PathBuf>,
    pub checks: Vec<CheckKind>,
    pub details: bool,
    pub no_color: bool,
    pub verbosity: u8,
    pub scan_config: ScanConfig,
}

impl AppConfig {
    pub fn nameserver_source(&self) -> NameserverSource {
        match &self.nsfile {
            Some(path) => NameserverSource::File(path.clone()),
            None => NameserverSource::Domain,
        }
    }
}

impl TryFrom<&ArgMatches> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ArgMatches) -> std::result::Result<Self, Self::Error> {
        let domain = args
            .get_one::<String>("domain")
            .context("no domain specified")
            .and_then(|d| validate_domain(d))?;
        let checks = CheckKind::parse_list(
            args.get_many::<String>("checks")
                .context("no checks specified")?,
        )
        .context("failed to parse checks")?;

        let scan_config = ScanConfig::default()
            .with_bootstrap_resolver(
                *args
                    .get_one::<SocketAddr>("bootstrap-resolver")
                    .context("no bootstrap resolver specified")?,
            )
            .with_query_timeout(Duration::from_secs(
                *args.get_one::<u64>("timeout").context("no timeout specified")?,
            ))
            .with_scan_timeout(Duration::from_secs(
                *args
                    .get_one::<u64>("scan-timeout")
                    .context("no scan timeout specified")?,
            ))
            .with_amplification_threshold(
                *args
                    .get_one::<usize>("amplification-threshold")
                    .context("no amplification threshold specified")?,
            )
            .with_whois_url(
                args.get_one::<String>("whois-url")
                    .context("no WHOIS URL specified")?
                    .as_str(),
            );

        let config = AppConfig {
            domain,
            outfile: args.get_one::<PathBuf>("outfile").cloned(),
            nsfile: args.get_one::<PathBuf>("nsfile").cloned(),
            checks,
            details: args.get_flag("details"),
            no_color: args.get_flag("no-color"),
            verbosity: args.get_count("v"),
            scan_config,
        };

        Ok(config)
    }
}

/// Accepts names with at least two labels of letters, digits, and hyphens; returns the name in lower case without
/// trailing dot.
pub fn validate_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();

    if labels.len() < 2 {
        return Err(anyhow!("'{}' is not a domain; expected at least two labels", domain));
    }
    if domain.len() > 253 {
        return Err(anyhow!("'{}' exceeds 253 characters", domain));
    }
    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(anyhow!("'{}' contains the invalid label '{}'", domain, label));
        }
    }

    Ok(domain)
}
