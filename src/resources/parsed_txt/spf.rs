// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nom::Err;

use crate::{Error, Result};

#[derive(Debug, PartialEq, Eq)]
pub struct Spf<'a> {
    version: u32,
    words: Vec<Word<'a>>,
}

#[allow(clippy::should_implement_trait)]
impl<'a> Spf<'a> {
    /// Parses a complete SPF record; trailing terms this parser does not know make the whole record fail.
    pub fn from_str(txt: &'a str) -> Result<Spf<'a>> {
        match parser::complete_spf(txt.trim()) {
            Ok((_, spf)) => Ok(spf),
            Err(Err::Incomplete(_)) => Err(Error::ParserError {
                what: txt.to_string(),
                to: "SPF TXT record",
                why: "input is incomplete".to_string(),
            }),
            Err(Err::Error(e)) | Err(Err::Failure(e)) => Err(Error::ParserError {
                what: e.input.to_string(),
                to: "SPF TXT record",
                why: e.code.description().to_string(),
            }),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn words(&self) -> &Vec<Word<'a>> {
        &self.words
    }

    /// Qualifier of the `all` mechanism, if the record has one.
    pub fn all_qualifier(&self) -> Option<Qualifier> {
        self.words.iter().find_map(|w| match w {
            Word::Word(q, Mechanism::All) => Some(*q),
            _ => None,
        })
    }

    /// Domains referenced by `include:` mechanisms and the `redirect=` modifier, in record order.
    pub fn references(&self) -> Vec<&'a str> {
        self.words
            .iter()
            .filter_map(|w| match w {
                Word::Word(_, Mechanism::Include(domain)) => Some(*domain),
                Word::Modifier(Modifier::Redirect(domain)) => Some(*domain),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Word<'a> {
    Word(Qualifier, Mechanism<'a>),
    Modifier(Modifier<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    // +
    Pass,
    // ?
    Neutral,
    // ~
    Softfail,
    // -
    Fail,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Mechanism<'a> {
    All,
    A {
        domain_spec: Option<&'a str>,
        cidr_len: Option<&'a str>,
    },
    IPv4(&'a str),
    IPv6(&'a str),
    MX {
        domain_spec: Option<&'a str>,
        cidr_len: Option<&'a str>,
    },
    PTR(Option<&'a str>),
    Exists(&'a str),
    Include(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Modifier<'a> {
    Redirect(&'a str),
    Exp(&'a str),
}

impl From<Option<char>> for Qualifier {
    fn from(c_opt: Option<char>) -> Self {
        match c_opt {
            Some('?') => Qualifier::Neutral,
            Some('~') => Qualifier::Softfail,
            Some('-') => Qualifier::Fail,
            Some(_) | None => Qualifier::Pass,
        }
    }
}

/// SPF Parser -- cf. https://tools.ietf.org/html/rfc7208
pub(crate) mod parser {
    use nom::branch::alt;
    use nom::bytes::complete::{tag, tag_no_case, take_while1};
    use nom::character::complete::{char, digit1, space0, space1};
    use nom::combinator::{all_consuming, map, map_res, opt};
    use nom::multi::many1;
    use nom::sequence::terminated;
    use nom::IResult;

    use super::{Mechanism, Modifier, Qualifier, Spf, Word};

    pub fn spf(input: &str) -> IResult<&str, Spf> {
        let (input, version) = spf_version(input)?;
        let (input, words) = many1(spf_word)(input)?;

        Ok((input, Spf { version, words }))
    }

    pub fn complete_spf(input: &str) -> IResult<&str, Spf> {
        all_consuming(terminated(spf, space0))(input)
    }

    fn spf_version(input: &str) -> IResult<&str, u32> {
        let (input, _) = tag_no_case("v=spf")(input)?;
        let (input, version) = map_res(digit1, |s: &str| s.parse::<u32>())(input)?;

        Ok((input, version))
    }

    fn spf_word(input: &str) -> IResult<&str, Word> {
        let (input, _) = space1(input)?;
        alt((spf_word_modifier, spf_word_word))(input)
    }

    fn spf_word_word(input: &str) -> IResult<&str, Word> {
        let (input, qualifier) = map(opt(alt((char('+'), char('?'), char('~'), char('-')))), Qualifier::from)(input)?;
        let (input, mechanism) = spf_mechanism(input)?;

        Ok((input, Word::Word(qualifier, mechanism)))
    }

    fn spf_mechanism(input: &str) -> IResult<&str, Mechanism> {
        alt((
            spf_mechanism_all,
            spf_mechanism_include,
            spf_mechanism_ip4,
            spf_mechanism_ip6,
            spf_mechanism_exists,
            spf_mechanism_mx,
            spf_mechanism_ptr,
            spf_mechanism_a,
        ))(input)
    }

    fn spf_mechanism_all(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("all")(input)?;
        Ok((input, Mechanism::All))
    }

    fn spf_mechanism_a(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("a")(input)?;
        let (input, domain_spec) = opt(domain_spec)(input)?;
        let (input, cidr_len) = opt(cidr_len)(input)?;
        Ok((input, Mechanism::A { domain_spec, cidr_len }))
    }

    fn domain_spec(input: &str) -> IResult<&str, &str> {
        let (input, _) = tag(":")(input)?;
        take_while1(is_domain_spec_char)(input)
    }

    fn cidr_len(input: &str) -> IResult<&str, &str> {
        let (input, _) = tag("/")(input)?;
        digit1(input)
    }

    fn is_domain_spec_char(c: char) -> bool {
        c.is_alphanumeric() || ".-_".contains(c)
    }

    fn spf_mechanism_ip4(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("ip4:")(input)?;
        let (input, ipv4) = take_while1(is_ipv4_addr_range_char)(input)?;

        Ok((input, Mechanism::IPv4(ipv4)))
    }

    fn is_ipv4_addr_range_char(c: char) -> bool {
        c.is_ascii_digit() || c == '.' || c == '/'
    }

    fn spf_mechanism_ip6(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("ip6:")(input)?;
        let (input, ipv6) = take_while1(is_ipv6_addr_range_char)(input)?;

        Ok((input, Mechanism::IPv6(ipv6)))
    }

    fn is_ipv6_addr_range_char(c: char) -> bool {
        c.is_ascii_hexdigit() || c == ':' || c == '/' || c == '.'
    }

    fn spf_mechanism_mx(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("mx")(input)?;
        let (input, domain_spec) = opt(domain_spec)(input)?;
        let (input, cidr_len) = opt(cidr_len)(input)?;
        Ok((input, Mechanism::MX { domain_spec, cidr_len }))
    }

    fn spf_mechanism_ptr(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("ptr")(input)?;
        let (input, domain_spec) = opt(domain_spec)(input)?;
        Ok((input, Mechanism::PTR(domain_spec)))
    }

    fn spf_mechanism_exists(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("exists:")(input)?;
        let (input, domain_spec) = take_while1(is_domain_spec_macro_char)(input)?;

        Ok((input, Mechanism::Exists(domain_spec)))
    }

    fn is_domain_spec_macro_char(c: char) -> bool {
        c.is_alphanumeric() || ".-+,/_=%{}".contains(c)
    }

    fn spf_mechanism_include(input: &str) -> IResult<&str, Mechanism> {
        let (input, _) = tag_no_case("include:")(input)?;
        let (input, domain_spec) = take_while1(is_domain_spec_char)(input)?;

        Ok((input, Mechanism::Include(domain_spec)))
    }

    fn spf_word_modifier(input: &str) -> IResult<&str, Word> {
        let (input, modifier) = alt((spf_modifier_redirect, spf_modifier_exp))(input)?;

        Ok((input, Word::Modifier(modifier)))
    }

    fn spf_modifier_redirect(input: &str) -> IResult<&str, Modifier> {
        let (input, _) = tag_no_case("redirect=")(input)?;
        let (input, domain_spec) = take_while1(is_domain_spec_char)(input)?;

        Ok((input, Modifier::Redirect(domain_spec)))
    }

    fn spf_modifier_exp(input: &str) -> IResult<&str, Modifier> {
        let (input, _) = tag_no_case("exp=")(input)?;
        let (input, domain_spec) = take_while1(is_domain_spec_macro_char)(input)?;

        Ok((input, Modifier::Exp(domain_spec)))
    }
}
