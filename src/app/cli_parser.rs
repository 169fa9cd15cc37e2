// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! This file is used by the build script. Therefore everything generating the command line parser must be included
//! here and must not depend on anything but `clap` and `std`.

use std::net::{IpAddr, SocketAddr};

use clap::builder::{PossibleValuesParser, RangedU64ValueParser};
use clap::{value_parser, Arg, ArgAction, Command};

pub static SUPPORTED_CHECKS: &[&str] = &["soa", "any", "glue", "zone", "dnssec", "spf", "dmarc", "dkim", "geo", "all"];

pub fn create_parser() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("domain")
                .required(true)
                .index(1)
                .value_name("DOMAIN")
                .help("Domain to scan, e.g. example.com"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .value_name("FILE")
                .value_parser(value_parser!(std::path::PathBuf))
                .help("Writes all check results as JSON to FILE"),
        )
        .arg(
            Arg::new("nsfile")
                .short('n')
                .long("nsfile")
                .value_name("FILE")
                .value_parser(value_parser!(std::path::PathBuf))
                .help("Reads the nameservers to check from FILE instead of resolving them")
                .long_help(
                    "Reads the nameservers to check from FILE instead of resolving the NS records of DOMAIN. FILE contains one nameserver name per line; empty lines and lines starting with # or // are ignored.",
                ),
        )
        .arg(
            Arg::new("checks")
                .short('c')
                .long("check")
                .value_name("CHECK")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_parser(PossibleValuesParser::new(SUPPORTED_CHECKS.iter().copied()))
                .ignore_case(true)
                .default_value("all")
                .help("Selects the checks to run"),
        )
        .arg(
            Arg::new("details")
                .short('D')
                .long("details")
                .action(ArgAction::SetTrue)
                .help("Prints descriptions and per nameserver evidence for every check"),
        )
        .arg(
            Arg::new("bootstrap-resolver")
                .long("bootstrap-resolver")
                .value_name("IP[:PORT]")
                .default_value("8.8.8.8:53")
                .value_parser(parse_socket_addr)
                .help("Sets the recursive resolver used to find the nameservers"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .default_value("2")
                .value_parser(RangedU64ValueParser::<u64>::new().range(1..))
                .help("Sets the timeout of a single DNS query"),
        )
        .arg(
            Arg::new("scan-timeout")
                .long("scan-timeout")
                .value_name("SECONDS")
                .default_value("300")
                .value_parser(RangedU64ValueParser::<u64>::new().range(1..))
                .help("Sets the timeout of the whole scan"),
        )
        .arg(
            Arg::new("amplification-threshold")
                .long("amplification-threshold")
                .value_name("NUMBER")
                .default_value("5")
                .value_parser(value_parser!(usize))
                .help("Sets the number of ANY answer records from which a nameserver counts as amplifying"),
        )
        .arg(
            Arg::new("whois-url")
                .long("whois-url")
                .value_name("URL")
                .default_value("https://stat.ripe.net/data")
                .help("Sets the base URL of the RIPEstat data API used to map nameserver addresses to ASNs"),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .action(ArgAction::SetTrue)
                .help("Disables colorful output"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets the level of verbosity"),
        )
}

/// Accepts a plain IP address and defaults to port 53.
fn parse_socket_addr(value: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|_| format!("'{}' is neither an IP address nor an IP address with port", value))
}
