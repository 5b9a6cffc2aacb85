use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use mailprobe::report::ReportError;
use mailprobe::{ResultSink, ResultWriter, RunSummary, ValidationResult};

/// Report writer plus one progress line per address on stderr.
pub struct ConsoleSink {
    writer: ResultWriter,
    progress: Option<BufWriter<io::Stderr>>,
}

impl ConsoleSink {
    pub fn new(writer: ResultWriter, quiet: bool) -> Self {
        Self {
            writer,
            progress: (!quiet).then(|| BufWriter::new(io::stderr())),
        }
    }
}

impl ResultSink for ConsoleSink {
    fn accept(&mut self, index: usize, result: &ValidationResult) -> Result<(), ReportError> {
        if let Some(progress) = self.progress.as_mut() {
            writeln!(progress, "{}", progress_line(result)).map_err(ReportError::write)?;
        }
        self.writer.accept(index, result)
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        if let Some(progress) = self.progress.as_mut() {
            progress.flush().map_err(ReportError::write)?;
        }
        self.writer.flush()
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        self.flush()?;
        self.writer.finish(summary)
    }
}

pub fn progress_line(result: &ValidationResult) -> String {
    format!(
        "{:<13} {:40} -> {}",
        result.status.tag(),
        result.email,
        result.status
    )
}

pub fn print_result(result: &ValidationResult) {
    println!("{}", progress_line(result));
    println!("        details: {}", result.details);
    if !result.mx_host.is_empty() {
        println!("        mx: {}", result.mx_host);
    }
    println!(
        "        attempts: {} ({:.2} ms)",
        result.attempts, result.response_time_ms
    );
}

pub fn print_summary(summary: &RunSummary, destination: Option<&str>) {
    eprintln!();
    eprintln!("SUMMARY:");
    eprintln!("   Total: {}", summary.total);
    eprintln!("   Time: {:.2}s", summary.time_seconds);
    for (status, count) in summary.counts_by_status.iter().filter(|(_, n)| **n > 0) {
        eprintln!("   {status}: {count}");
    }
    if !summary.hosts.is_empty() {
        eprintln!("   MX hosts:");
        for (host, tally) in &summary.hosts {
            eprintln!(
                "     {host}: {}/{} ok, {:.1} ms avg",
                tally.successes,
                tally.attempts,
                tally.mean_latency_ms()
            );
        }
    }
    if summary.cancelled {
        eprintln!("   (interrompu: adresses restantes non vérifiées)");
    }
    if let Some(dest) = destination {
        eprintln!("\nResults saved to: {dest}");
    }
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(summary)?;
    write_all_atomically(path, &bytes)
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
