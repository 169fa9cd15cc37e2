// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Parsers for the JSON documents of the RIPEstat data API.
//!
//! Every document wraps its payload in a `data` object:
//!
//! ```text
//! {"status": "ok", "data": {"asns": ["15169"], "prefix": "8.8.8.0/24"}}
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::services::{Error, Result};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Asn {
    Number(u32),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct NetworkInfoData {
    #[serde(default)]
    asns: Vec<Asn>,
}

#[derive(Debug, Deserialize)]
struct AsOverviewData {
    #[serde(default)]
    holder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoLocationData {
    #[serde(default)]
    located_resources: Vec<LocatedResource>,
}

#[derive(Debug, Deserialize)]
struct LocatedResource {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    covered_percentage: Option<f64>,
}

fn data<T: DeserializeOwned>(document: &str) -> Result<T> {
    serde_json::from_str::<Envelope<T>>(document)
        .map(|envelope| envelope.data)
        .map_err(Error::parse)
}

/// Returns the origin ASNs of the prefix covering the queried address; empty if the prefix is not announced.
pub fn parse_network_info(document: &str) -> Result<Vec<u32>> {
    let info: NetworkInfoData = data(document)?;

    info.asns
        .into_iter()
        .map(|asn| match asn {
            Asn::Number(asn) => Ok(asn),
            Asn::Text(text) => text
                .trim()
                .trim_start_matches("AS")
                .parse::<u32>()
                .map_err(|e| Error::parse(format!("invalid AS number '{}': {}", text, e))),
        })
        .collect()
}

/// Returns the registered holder of an AS, e.g. `GOOGLE - Google LLC`.
pub fn parse_as_overview(document: &str) -> Result<String> {
    let overview: AsOverviewData = data(document)?;

    overview
        .holder
        .map(|holder| holder.trim().to_string())
        .filter(|holder| !holder.is_empty())
        .ok_or_else(|| Error::parse("AS has no registered holder"))
}

/// Returns the country covering the largest share of the queried address space, if any is known.
pub fn parse_geo_location(document: &str) -> Result<Option<String>> {
    let geo: GeoLocationData = data(document)?;

    let country = geo
        .located_resources
        .into_iter()
        .flat_map(|resource| resource.locations)
        .filter_map(|location| {
            let country = location.country?.trim().to_uppercase();
            // "?" marks unknown locations
            if country.is_empty() || country == "?" {
                return None;
            }
            Some((country, location.covered_percentage.unwrap_or(0.0)))
        })
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(country, _)| country);

    Ok(country)
}
