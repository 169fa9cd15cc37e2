// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Helpers to read structured data out of DNS resource records.

use hickory_proto::rr::{RData, Record};

pub mod parsed_txt;

/// Concatenates the character strings of a TXT record; long SPF and DMARC records are split into several of them.
pub fn txt_string(record: &Record) -> Option<String> {
    match record.data() {
        RData::TXT(txt) => Some(
            txt.txt_data()
                .iter()
                .map(|bytes| String::from_utf8_lossy(bytes))
                .collect::<Vec<_>>()
                .join(""),
        ),
        _ => None,
    }
}

/// All TXT strings of an answer section in order.
pub fn txt_strings(records: &[Record]) -> Vec<String> {
    records.iter().filter_map(txt_string).collect()
}
