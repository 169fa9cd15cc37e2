// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::str::FromStr;

use nom::Err;

use crate::{Error, Result};

/// A DMARC policy record as a list of `tag=value` pairs -- cf. https://tools.ietf.org/html/rfc7489#section-6.3
#[derive(Debug, PartialEq, Eq)]
pub struct Dmarc<'a> {
    tags: Vec<(&'a str, &'a str)>,
}

#[allow(clippy::should_implement_trait)]
impl<'a> Dmarc<'a> {
    pub fn from_str(txt: &'a str) -> Result<Dmarc<'a>> {
        match parser::dmarc(txt) {
            Ok((_, dmarc)) => Ok(dmarc),
            Err(Err::Incomplete(_)) => Err(Error::ParserError {
                what: txt.to_string(),
                to: "DMARC TXT record",
                why: "input is incomplete".to_string(),
            }),
            Err(Err::Error(e)) | Err(Err::Failure(e)) => Err(Error::ParserError {
                what: e.input.to_string(),
                to: "DMARC TXT record",
                why: e.code.description().to_string(),
            }),
        }
    }

    pub fn tags(&self) -> &[(&'a str, &'a str)] {
        &self.tags
    }

    /// Value of the first occurrence of `name`; tag names are case-insensitive.
    pub fn tag(&self, name: &str) -> Option<&'a str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// The requested policy; `None` if the tag is missing or has an unknown value.
    pub fn policy(&self) -> Option<Policy> {
        self.tag("p").and_then(|p| p.parse().ok())
    }

    /// Policy for subdomains; `None` if the tag is missing, in which case `p` applies.
    pub fn subdomain_policy(&self) -> Option<Policy> {
        self.tag("sp").and_then(|p| p.parse().ok())
    }

    /// Percentage of messages the policy is applied to; defaults to 100.
    pub fn percentage(&self) -> u8 {
        self.tag("pct").and_then(|p| p.parse().ok()).unwrap_or(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Policy {
    None,
    Quarantine,
    Reject,
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Policy::None),
            "quarantine" => Ok(Policy::Quarantine),
            "reject" => Ok(Policy::Reject),
            _ => Err(Error::ParserError {
                what: s.to_string(),
                to: "DMARC policy",
                why: "expected one of none, quarantine, reject".to_string(),
            }),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            Policy::None => "none",
            Policy::Quarantine => "quarantine",
            Policy::Reject => "reject",
        };
        f.write_str(str)
    }
}

pub(crate) mod parser {
    use nom::bytes::complete::{tag_no_case, take_while, take_while1};
    use nom::character::complete::{char, multispace0, space0};
    use nom::combinator::opt;
    use nom::multi::many0;
    use nom::sequence::{delimited, preceded, separated_pair, tuple};
    use nom::IResult;

    use super::Dmarc;

    pub fn dmarc(input: &str) -> IResult<&str, Dmarc> {
        let (input, _) = multispace0(input)?;
        let (input, version) = dmarc_version(input)?;
        let (input, mut tags) = many0(preceded(separator, dmarc_tag))(input)?;
        let (input, _) = opt(separator)(input)?;
        let (input, _) = multispace0(input)?;

        tags.insert(0, ("v", version));

        Ok((input, Dmarc { tags }))
    }

    fn separator(input: &str) -> IResult<&str, char> {
        delimited(space0, char(';'), space0)(input)
    }

    fn dmarc_version(input: &str) -> IResult<&str, &str> {
        let (input, _) = tuple((tag_no_case("v"), space0, char('='), space0))(input)?;
        tag_no_case("DMARC1")(input)
    }

    fn dmarc_tag(input: &str) -> IResult<&str, (&str, &str)> {
        let (input, (name, value)) = separated_pair(
            take_while1(|c: char| c.is_ascii_alphanumeric()),
            delimited(space0, char('='), space0),
            take_while(|c: char| c != ';'),
        )(input)?;

        Ok((input, (name, value.trim_end())))
    }
}
