// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! nom based parsers for TXT records carrying mail policies.

mod dmarc;
mod spf;

pub use dmarc::{Dmarc, Policy};
pub use spf::{Mechanism, Modifier, Qualifier, Spf, Word};
