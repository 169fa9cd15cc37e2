// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use serde::Serializer;

pub fn ser_to_string<S, T: ToString>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&data.to_string())
}

#[cfg(test)]
mod tests {
    use hickory_proto::op::ResponseCode;
    use serde::Serialize;
    use spectral::prelude::*;

    use super::*;

    #[derive(Serialize)]
    struct Wrapper {
        #[serde(serialize_with = "ser_to_string")]
        rcode: ResponseCode,
    }

    #[test]
    fn serializes_via_display() {
        let json = serde_json::to_string(&Wrapper {
            rcode: ResponseCode::Refused,
        })
        .unwrap();

        assert_that(&json).is_equal_to(format!(r#"{{"rcode":"{}"}}"#, ResponseCode::Refused));
    }
}
