//! Human-readable hourly report

use crate::aggregate::HourReport;
use crate::error::PipelineError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Width of the closing rule under each hour block
const FOOTER_WIDTH: usize = 82;

/// Append one hour block to `sink`
///
/// Hours before `start_hour` are skipped and `false` is returned. The sink is
/// never opened, flushed or closed here.
pub fn write_report<W: Write>(
    report: &HourReport,
    top_n: usize,
    start_hour: usize,
    sink: &mut W,
) -> io::Result<bool> {
    if report.hour < start_hour {
        return Ok(false);
    }

    writeln!(
        sink,
        "================= Top {} Congested Traffic Lights for Hour: {:02}:00 =================",
        top_n, report.hour
    )?;

    for entry in report.top(top_n) {
        writeln!(
            sink,
            "Traffic Light ID: {} -- Cars Passed: {}",
            entry.light_id, entry.total
        )?;
    }

    writeln!(sink, "{}", "=".repeat(FOOTER_WIDTH))?;

    Ok(true)
}

/// Report file owned by the coordinator for the whole run
///
/// Buffered; whatever was written is flushed on [`ReportFile::finish`] and,
/// best effort, when dropped after a failed hour.
pub struct ReportFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ReportFile {
    /// Create (truncate) the report file, creating parent directories
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        let sink_error = |source| PipelineError::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(sink_error)?;
        }

        let file = File::create(path).map_err(sink_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// [`write_report`] into this file
    ///
    /// Write failures are reported as [`PipelineError::SinkUnavailable`].
    pub fn write_hour(
        &mut self,
        report: &HourReport,
        top_n: usize,
        start_hour: usize,
    ) -> Result<bool, PipelineError> {
        write_report(report, top_n, start_hour, &mut self.writer).map_err(|source| {
            PipelineError::SinkUnavailable {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Flush buffered output to disk
    pub fn finish(mut self) -> Result<(), PipelineError> {
        let path = self.path.clone();
        let sink_error = |source| PipelineError::SinkUnavailable {
            path: path.clone(),
            source,
        };

        self.writer.flush().map_err(sink_error)?;
        self.writer.get_ref().sync_all().map_err(sink_error)?;
        Ok(())
    }
}

impl Write for ReportFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
