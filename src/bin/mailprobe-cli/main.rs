mod args;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use mailprobe::report::CheckLog;
use mailprobe::{Destination, OutputFormat, ResultWriter, Validator};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Cli, Commands};
use crate::output::ConsoleSink;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_json)?;

    let options = cli.batch_options()?;
    let validator = Validator::new(options).context("initialisation du résolveur DNS")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "mailprobe::cli", "Ctrl+C reçu, arrêt après les sondes en cours");
            on_signal.cancel();
        }
    });

    if let Some(Commands::Validate { email }) = &cli.cmd {
        let Some(result) = validator.validate_one(email, &cancel).await else {
            warn!(target: "mailprobe::cli", %email, "interrompu avant la réponse du serveur");
            return Ok(ExitCode::from(130));
        };
        match cli.format.as_str() {
            "json" | "ndjson" => println!("{}", serde_json::to_string(&result)?),
            _ => output::print_result(&result),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let format: OutputFormat = cli
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let destination = match cli.out.as_deref() {
        Some(arg) => Destination::parse(arg),
        None => Destination::timestamped(format),
    };
    let writer = ResultWriter::create(&destination, format).context("ouverture de la sortie")?;

    let validator = if cli.no_check_log {
        validator
    } else {
        let log = CheckLog::open(&cli.check_log).context("ouverture du journal des sessions")?;
        validator.with_check_log(log)
    };

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let sink = ConsoleSink::new(writer, cli.quiet);
    let (summary, _) = validator
        .run(reader.lines(), sink, &cancel)
        .await
        .context("validation interrompue")?;

    let saved = match &destination {
        Destination::File(path) => Some(path.display().to_string()),
        Destination::Stdout => None,
    };
    output::print_summary(&summary, saved.as_deref());
    if let Some(path) = &cli.summary {
        output::write_summary_json(path, &summary)?;
    }
    info!(target: "mailprobe::cli", total = summary.total, "done");

    Ok(if summary.cancelled {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing(level: Option<&str>, json: bool) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("mailprobe={level}"))
            .with_context(|| format!("invalid --log-level '{level}'"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mailprobe=info")),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}
