use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use llmbench_core::{BenchmarkReport, Result};

/// Destination for a finished report. A failure here is fatal for the run.
pub trait ReportSink {
    fn write(
        &self,
        report: &BenchmarkReport,
        model: &str,
        captured_at: DateTime<Local>,
    ) -> Result<PathBuf>;
}

/// `benchmark_results_<model>_<YYYYMMDD_HHMMSS>.json`
pub fn report_file_name(model: &str, captured_at: &DateTime<Local>) -> String {
    format!(
        "benchmark_results_{}_{}.json",
        model.replace(['/', '\\'], "_"),
        captured_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes pretty-printed JSON files into a directory.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for JsonReportSink {
    fn write(
        &self,
        report: &BenchmarkReport,
        model: &str,
        captured_at: DateTime<Local>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(report_file_name(model, &captured_at));

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(path = %path.display(), prompts = report.len(), "Saved benchmark results");
        Ok(path)
    }
}
