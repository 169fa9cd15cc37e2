// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, instrument};

use crate::config::ScanConfig;
use crate::nameserver::{normalize, resolve_names, NameserverSet};
use crate::query::QueryClient;
use crate::{Error, Result};

/// Reads nameserver names line by line and resolves each via the bootstrap resolver.
///
/// Empty lines and lines starting with `#` or `//` are skipped.
#[instrument(name = "load nameservers", level = "info", skip(client, config, path), fields(path = %path.as_ref().display()))]
pub async fn resolve_from_file<P: AsRef<Path>>(
    client: &QueryClient,
    config: &ScanConfig,
    path: P,
) -> Result<NameserverSet> {
    let origin = path.as_ref().display().to_string();
    let names = read_names(path.as_ref())
        .await
        .map_err(|e| Error::resolution(origin.as_str(), e))?;
    if names.is_empty() {
        return Err(Error::resolution(origin, "no nameserver found in file"));
    }
    debug!(nameservers = ?names, "Read nameservers from file");

    resolve_names(client, config, &origin, names).await
}

async fn read_names(path: &Path) -> std::io::Result<Vec<String>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut names: Vec<String> = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let name = normalize(line);
        if !names.contains(&name) {
            names.push(name);
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;

    use hickory_proto::rr::RecordType;
    use spectral::prelude::*;

    use super::*;
    use crate::utils::tests::{a_record, response, StaticTransport};

    fn bootstrap() -> SocketAddr {
        "192.0.2.53:53".parse().unwrap()
    }

    #[tokio::test]
    async fn load_and_resolve() {
        crate::utils::tests::logging::init();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# primary").unwrap();
        writeln!(file, "ns1.example.com.").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "// secondary").unwrap();
        writeln!(file, "  NS2.example.com  ").unwrap();
        let config = ScanConfig::default().with_bootstrap_resolver(bootstrap());
        let transport = StaticTransport::new()
            .with_answer(
                bootstrap(),
                "ns1.example.com",
                RecordType::A,
                response(vec![a_record("ns1.example.com", [192, 0, 2, 1])], vec![]),
            )
            .with_answer(
                bootstrap(),
                "ns2.example.com",
                RecordType::A,
                response(vec![a_record("ns2.example.com", [192, 0, 2, 2])], vec![]),
            );
        let client = QueryClient::with_transport(Arc::new(transport.clone()), &config);

        let set = resolve_from_file(&client, &config, file.path()).await.unwrap();

        assert_that(&set.len()).is_equal_to(2);
        assert_that(&set.ip("ns2.example.com")).is_equal_to(Some(Ipv4Addr::new(192, 0, 2, 2)));
        assert_that(&transport.requests_for("example.com", RecordType::NS)).is_equal_to(0);
    }

    #[tokio::test]
    async fn empty_file_is_resolution_error() {
        crate::utils::tests::logging::init();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing to see").unwrap();
        let config = ScanConfig::default().with_bootstrap_resolver(bootstrap());
        let client = QueryClient::with_transport(Arc::new(StaticTransport::new()), &config);

        let res = resolve_from_file(&client, &config, file.path()).await;

        assert_that(&matches!(res, Err(Error::ResolutionError { .. }))).is_true();
    }

    #[tokio::test]
    async fn missing_file_is_resolution_error() {
        crate::utils::tests::logging::init();
        let config = ScanConfig::default();
        let client = QueryClient::with_transport(Arc::new(StaticTransport::new()), &config);

        let res = resolve_from_file(&client, &config, "/nonexistent/nameservers.txt").await;

        assert_that(&matches!(res, Err(Error::ResolutionError { .. }))).is_true();
    }
}
