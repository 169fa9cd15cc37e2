// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! SOA timers and serial against the recommendations of RIPE-203.

use chrono::{DateTime, NaiveDate, Utc};
use hickory_proto::rr::rdata::SOA;
use hickory_proto::rr::{RData, RecordType};
use indexmap::IndexSet;
use tracing::debug;

use crate::checks::{CheckContext, CheckKind};
use crate::nameserver::NameserverSet;
use crate::output::{CheckOutput, SingleCheckResult};
use crate::{Error, Result};

pub const NAME: &str = "SOA Record";
pub const DESCRIPTION: &[&str] = &[
    "The timers of the SOA record should follow the RIPE-203 recommendations",
    "so that secondary nameservers neither hammer the primary nor serve stale data.",
    "More information at https://www.ripe.net/publications/docs/ripe-203",
];

/// 24 hours
const MIN_REFRESH: i64 = 86_400;
/// 2 hours
const MIN_RETRY: i64 = 7_200;
/// 1000 hours
const MIN_EXPIRE: i64 = 3_600_000;

const COMPLIANT: &str = "compliant with RIPE-203";

/// Runs against the bootstrap resolver only, not against every authoritative nameserver.
#[derive(Debug)]
pub struct SoaCheck {
    context: CheckContext,
    now: Option<DateTime<Utc>>,
    output: Option<CheckOutput>,
}

impl SoaCheck {
    pub fn new(context: CheckContext) -> SoaCheck {
        SoaCheck {
            context,
            now: None,
            output: None,
        }
    }

    /// Fixes the point in time serial dates are compared with.
    pub fn with_now(self, now: DateTime<Utc>) -> SoaCheck {
        SoaCheck { now: Some(now), ..self }
    }

    pub async fn start(&mut self, domain: &str, _nameservers: &NameserverSet) -> Result<()> {
        let resolver = self.context.config().bootstrap_resolver;
        let nameserver = resolver.ip().to_string();
        let mut output = CheckKind::Soa.output(domain, IndexSet::from([nameserver.clone()]));

        let response = match self.context.client().lookup(domain, RecordType::SOA, resolver).await {
            Ok(response) => response,
            Err(err) => {
                output.push(SingleCheckResult::unresolved(
                    &nameserver,
                    domain,
                    format!("query failed: {}", err),
                ));
                self.output = Some(output);
                return Err(err.into());
            }
        };

        let soa = response.answers().iter().find_map(|r| match r.data() {
            RData::SOA(soa) => Some((soa.clone(), r.ttl())),
            _ => None,
        });
        let Some((soa, ttl)) = soa else {
            output.push(SingleCheckResult::unresolved(&nameserver, domain, "no SOA record in answer"));
            self.output = Some(output);
            return Err(Error::CheckError {
                check: NAME,
                reason: format!("no SOA record for {}", domain),
            });
        };
        debug!(serial = soa.serial(), "Received SOA record");

        let mut result = SingleCheckResult::new(nameserver, domain);
        let (vulnerable, information) = evaluate(&soa, ttl, self.now.unwrap_or_else(Utc::now));
        if vulnerable {
            result.set_vulnerable();
        }
        result.extend_info(information);
        output.push(result);
        self.output = Some(output);

        Ok(())
    }

    pub fn results(self) -> CheckOutput {
        self.output
            .unwrap_or_else(|| CheckKind::Soa.output(String::new(), IndexSet::new()))
    }
}

/// Returns whether the record violates RIPE-203 and one line of evidence per field.
pub fn evaluate(soa: &SOA, ttl: u32, now: DateTime<Utc>) -> (bool, Vec<String>) {
    let mut vulnerable = false;
    let mut information = vec![
        format!("Primary nameserver: {}", soa.mname()),
        format!("Responsible mailbox: {}", soa.rname()),
    ];

    if serial_is_plausible(soa.serial(), now) {
        information.push(format!("Serial number: {} - {}", soa.serial(), COMPLIANT));
    } else {
        vulnerable = true;
        information.push(format!(
            "Serial number: {} - should encode a date between 1970-01-01 and today (RIPE-203)",
            soa.serial()
        ));
    }

    for (field, value, minimum) in [
        ("Refresh", i64::from(soa.refresh()), MIN_REFRESH),
        ("Retry", i64::from(soa.retry()), MIN_RETRY),
        ("Expire", i64::from(soa.expire()), MIN_EXPIRE),
    ] {
        if value >= minimum {
            information.push(format!("{}: {} - {}", field, value, COMPLIANT));
        } else {
            vulnerable = true;
            information.push(format!(
                "{}: {} - should be at least {} seconds (RIPE-203)",
                field, value, minimum
            ));
        }
    }

    information.push(format!("TTL: {}", ttl));

    (vulnerable, information)
}

/// Serials starting with a valid `YYYYMMDD` date are date based; all others are read as Unix timestamps.
pub fn serial_date(serial: u32) -> Option<DateTime<Utc>> {
    let digits = serial.to_string();
    if let Some(date) = digits
        .get(..8)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y%m%d").ok())
    {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    DateTime::from_timestamp(i64::from(serial), 0)
}

fn serial_is_plausible(serial: u32, now: DateTime<Utc>) -> bool {
    serial_date(serial)
        .map(|date| date >= DateTime::<Utc>::UNIX_EPOCH && date <= now)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use hickory_proto::op::ResponseCode;
    use spectral::prelude::*;

    use super::*;
    use crate::checks::testing::{bootstrap, context, nameservers};
    use crate::utils::tests::{response, response_with_rcode, soa_record, StaticTransport};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn transport(serial: u32, refresh: u32, retry: u32, expire: u32) -> StaticTransport {
        StaticTransport::new().with_answer(
            bootstrap(),
            "example.com",
            RecordType::SOA,
            response(vec![soa_record("example.com", serial, refresh, retry, expire)], vec![]),
        )
    }

    async fn run(transport: StaticTransport) -> (Result<()>, CheckOutput) {
        crate::utils::tests::logging::init();
        let mut check = SoaCheck::new(context(transport)).with_now(now());
        let res = check.start("example.com", &nameservers()).await;
        (res, check.results())
    }

    #[tokio::test]
    async fn compliant_soa() {
        let (res, output) = run(transport(20240101, 86400, 7200, 3600000)).await;

        assert_that(&res).is_ok();
        assert_that(&output.is_vulnerable()).is_false();
        assert_that(&output.results.len()).is_equal_to(1);
        assert_that(&output.results[0].nameserver).is_equal_to("192.0.2.53".to_string());
        let compliant = output.results[0]
            .information
            .iter()
            .filter(|i| i.ends_with(COMPLIANT))
            .count();
        assert_that(&compliant).is_equal_to(4);
    }

    #[tokio::test]
    async fn short_refresh_is_vulnerable() {
        let (_, output) = run(transport(2024010101, 3600, 7200, 3600000)).await;

        assert_that(&output.is_vulnerable()).is_true();
        assert_that(&output.results[0].information)
            .contains(&"Refresh: 3600 - should be at least 86400 seconds (RIPE-203)".to_string());
    }

    #[tokio::test]
    async fn short_expire_is_vulnerable() {
        let (_, output) = run(transport(20240101, 86400, 7200, 604800)).await;

        assert_that(&output.is_vulnerable()).is_true();
    }

    #[tokio::test]
    async fn missing_soa_is_check_error() {
        let transport = StaticTransport::new().with_answer(
            bootstrap(),
            "example.com",
            RecordType::SOA,
            response(vec![], vec![]),
        );

        let (res, output) = run(transport).await;

        assert_that(&matches!(res, Err(Error::CheckError { .. }))).is_true();
        assert_that(&output.results.len()).is_equal_to(1);
        assert_that(&output.is_vulnerable()).is_false();
    }

    #[tokio::test]
    async fn failed_query_is_unresolved() {
        let transport = StaticTransport::new().with_answer(
            bootstrap(),
            "example.com",
            RecordType::SOA,
            response_with_rcode(ResponseCode::ServFail),
        );

        let (res, output) = run(transport).await;

        assert_that(&res).is_err();
        assert_that(&output.results[0].information[0].starts_with("query failed")).is_true();
    }

    #[test]
    fn date_based_serial() {
        assert_that(&serial_date(2024010101)).is_equal_to(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn epoch_based_serial() {
        assert_that(&serial_date(1704067200)).is_equal_to(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn serial_bounds() {
        assert_that(&serial_is_plausible(20240101, now())).is_true();
        assert_that(&serial_is_plausible(0, now())).is_true();
        assert_that(&serial_is_plausible(20300101, now())).is_false();
        assert_that(&serial_is_plausible(u32::MAX, now())).is_false();
    }
}
