// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! dnshunter assesses the DNS and BGP security posture of a domain.
//!
//! The authoritative nameservers of a domain are resolved into a [`NameserverSet`], then every selected
//! [`checks::Check`] runs concurrently against that set. Each check yields one [`CheckOutput`] containing one
//! [`SingleCheckResult`] per examined nameserver.
//!
//! ```no_run
//! use dnshunter::{CheckKind, NameserverSource, Scan, ScanConfig};
//!
//! # async fn run() -> dnshunter::Result<()> {
//! let scan = Scan::new(ScanConfig::default())?;
//! let outputs = scan
//!     .run("example.com", &NameserverSource::Domain, &CheckKind::all())
//!     .await?;
//! for output in &outputs {
//!     println!("{}: vulnerable={}", output.name, output.is_vulnerable());
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "app-lib")]
pub mod app;
pub mod checks;
pub mod config;
pub mod error;
pub mod nameserver;
pub mod output;
pub mod query;
pub mod resources;
pub mod scan;
pub mod services;
pub mod utils;

pub use checks::CheckKind;
pub use config::ScanConfig;
pub use error::Error;
pub use hickory_proto::rr::{Name, RecordType};
pub use nameserver::{Nameserver, NameserverSet, NameserverSource};
pub use output::{CheckOutput, OutputSink, SingleCheckResult};
pub use scan::Scan;

pub type Result<T> = std::result::Result<T, Error>;
