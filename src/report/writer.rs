use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::batch::RunSummary;
use crate::classify::ValidationResult;

use super::error::ReportError;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Receives every result of a run, in completion order.
///
/// `index` is the position of the address among the non-blank input lines,
/// so a sink that needs input order can resequence.
pub trait ResultSink {
    fn accept(&mut self, index: usize, result: &ValidationResult) -> Result<(), ReportError>;

    /// Called after each burst of accepted results.
    fn flush(&mut self) -> Result<(), ReportError> {
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), ReportError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Ndjson,
    #[cfg(feature = "with-csv")]
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Ndjson => "ndjson",
            #[cfg(feature = "with-csv")]
            Self::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "human" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            #[cfg(feature = "with-csv")]
            "csv" => Ok(Self::Csv),
            #[cfg(not(feature = "with-csv"))]
            "csv" => Err("format=csv nécessite la feature 'with-csv'".to_string()),
            other => Err(format!("unknown format '{other}', use: text|json|ndjson|csv")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// `-` means stdout.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// `validation_results_<unix-ts>.<ext>` in the working directory.
    pub fn timestamped(format: OutputFormat) -> Self {
        let ts = chrono::Utc::now().timestamp();
        Self::File(PathBuf::from(format!(
            "validation_results_{ts}.{}",
            format.extension()
        )))
    }
}

enum Output {
    Stdout(io::Stdout),
    File {
        file: File,
        tmp: PathBuf,
        path: PathBuf,
    },
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.write(buf),
            Self::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.flush(),
            Self::File { file, .. } => file.flush(),
        }
    }
}

/// Streams results to a file or stdout as they complete; nothing is
/// buffered beyond the I/O buffer, which is drained on every
/// [`ResultSink::flush`]. A file destination is written to
/// `<path>.tmp` and only renamed into place by [`ResultSink::finish`].
pub struct ResultWriter {
    format: OutputFormat,
    out: BufWriter<Output>,
    written: usize,
    finished: bool,
}

impl ResultWriter {
    pub fn create(destination: &Destination, format: OutputFormat) -> Result<Self, ReportError> {
        let output = match destination {
            Destination::Stdout => Output::Stdout(io::stdout()),
            Destination::File(path) => {
                let tmp = tmp_path(path);
                let file = File::create(&tmp).map_err(|e| ReportError::open(&tmp, e))?;
                Output::File {
                    file,
                    tmp,
                    path: path.clone(),
                }
            }
        };

        let mut writer = Self {
            format,
            out: BufWriter::new(output),
            written: 0,
            finished: false,
        };
        writer.write_header()?;
        Ok(writer)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn write_header(&mut self) -> Result<(), ReportError> {
        let header = match self.format {
            OutputFormat::Text => format!("EMAIL VALIDATION REPORT\n{}\n\n", "=".repeat(80)),
            OutputFormat::Json => "[\n".to_string(),
            _ => return Ok(()),
        };
        self.out
            .write_all(header.as_bytes())
            .map_err(ReportError::write)
    }

    fn write_record(&mut self, result: &ValidationResult) -> Result<(), ReportError> {
        match self.format {
            OutputFormat::Text => self
                .out
                .write_all(text_record(result).as_bytes())
                .map_err(ReportError::write)?,
            OutputFormat::Json => {
                let sep: &[u8] = if self.written == 0 { b"  " } else { b",\n  " };
                self.out.write_all(sep).map_err(ReportError::write)?;
                serde_json::to_writer(&mut self.out, result)?;
            }
            OutputFormat::Ndjson => {
                serde_json::to_writer(&mut self.out, result)?;
                self.out.write_all(b"\n").map_err(ReportError::write)?;
            }
            #[cfg(feature = "with-csv")]
            OutputFormat::Csv => {
                let mut wtr = csv::WriterBuilder::new()
                    .has_headers(self.written == 0)
                    .from_writer(&mut self.out);
                wtr.serialize(result)?;
                wtr.flush().map_err(ReportError::write)?;
            }
        }
        Ok(())
    }

    fn write_footer(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let footer = match self.format {
            OutputFormat::Text => text_summary(summary),
            OutputFormat::Json if self.written == 0 => "]\n".to_string(),
            OutputFormat::Json => "\n]\n".to_string(),
            _ => return Ok(()),
        };
        self.out
            .write_all(footer.as_bytes())
            .map_err(ReportError::write)
    }
}

impl ResultSink for ResultWriter {
    fn accept(&mut self, _index: usize, result: &ValidationResult) -> Result<(), ReportError> {
        self.write_record(result)?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.out.flush().map_err(ReportError::write)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        if self.finished {
            return Ok(());
        }
        self.write_footer(summary)?;
        self.out.flush().map_err(ReportError::write)?;
        if let Output::File { file, tmp, path } = self.out.get_ref() {
            file.sync_all().map_err(ReportError::write)?;
            std::fs::rename(tmp, path).map_err(|source| ReportError::Rename {
                from: tmp.clone(),
                to: path.clone(),
                source,
            })?;
        }
        self.finished = true;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) fn text_record(result: &ValidationResult) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Email: {}", result.email);
    let _ = writeln!(s, "Status: {}", result.status);
    let _ = writeln!(s, "Details: {}", result.details);
    if !result.mx_host.is_empty() {
        let _ = writeln!(s, "MX Host: {}", result.mx_host);
    }
    let _ = writeln!(
        s,
        "Attempts: {} ({:.2} ms)",
        result.attempts, result.response_time_ms
    );
    let _ = writeln!(s, "{RULE}");
    s
}

pub(crate) fn text_summary(summary: &RunSummary) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "\nSUMMARY");
    let _ = writeln!(s, "Total: {}", summary.total);
    let _ = writeln!(s, "Time: {:.2}s", summary.time_seconds);
    for (status, count) in summary.counts_by_status.iter().filter(|(_, n)| **n > 0) {
        let _ = writeln!(s, "{status}: {count}");
    }
    if summary.cancelled {
        let _ = writeln!(s, "Run cancelled before all addresses were checked");
    }
    s
}

/// Keeps every result and hands them back in input order.
#[derive(Debug, Default)]
pub struct OrderedResults {
    slots: Vec<Option<ValidationResult>>,
}

impl OrderedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_vec(self) -> Vec<ValidationResult> {
        self.slots.into_iter().flatten().collect()
    }
}

impl ResultSink for OrderedResults {
    fn accept(&mut self, index: usize, result: &ValidationResult) -> Result<(), ReportError> {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(result.clone());
        Ok(())
    }
}
