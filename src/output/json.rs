// Copyright 2017-2021 Lukas Pustina <lukas@pustina.de>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::output::{CheckOutput, OutputSink};
use crate::Result;

#[derive(Debug, Default, Clone)]
pub struct JsonFormat {
    /// Pretty formatting
    pretty: bool,
}

impl JsonFormat {
    pub fn new(pretty: bool) -> JsonFormat {
        JsonFormat { pretty }
    }

    pub fn output<W: Write, T: Serialize + ?Sized>(&self, writer: &mut W, data: &T) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, data)?;
        } else {
            serde_json::to_writer(writer, data)?;
        }

        Ok(())
    }
}

/// Writes the batch as a JSON array to a file; an existing file is truncated.
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    format: JsonFormat,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> JsonFileSink {
        JsonFileSink {
            path: path.as_ref().to_path_buf(),
            format: JsonFormat::new(true),
        }
    }

    pub fn with_format(self, format: JsonFormat) -> JsonFileSink {
        JsonFileSink { format, ..self }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for JsonFileSink {
    fn write(&mut self, outputs: &[CheckOutput]) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        self.format.output(&mut writer, outputs)?;
        writer.flush()?;
        info!(path = %self.path.display(), checks = outputs.len(), "Wrote JSON report");

        Ok(())
    }
}
