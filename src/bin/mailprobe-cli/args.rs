use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mailprobe::report::DEFAULT_CHECK_LOG;
use mailprobe::{BatchOptions, MxOptions, ProbeOptions, ValidationMode};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version)]
#[command(
    about = "Vérifie la délivrabilité d'adresses e-mail via SMTP, sans envoyer de message"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// fichier d'adresses (une par ligne); absent ou `-` = stdin
    #[arg(long, short = 'i', env = "MAILPROBE_INPUT")]
    pub input: Option<PathBuf>,

    /// destination du rapport: chemin ou `-` pour stdout
    /// (défaut: validation_results_<timestamp>.<ext>)
    #[arg(long, short = 'o', env = "MAILPROBE_OUT")]
    pub out: Option<String>,

    /// format: text|json|ndjson|csv
    #[arg(long, default_value = "text", env = "MAILPROBE_FORMAT")]
    pub format: String,

    /// mode: strict|relaxed
    #[arg(long, default_value = "strict", env = "MAILPROBE_MODE")]
    pub mode: String,

    /// sondes SMTP simultanées au maximum
    #[arg(
        long,
        default_value_t = 50,
        value_parser = clap::value_parser!(u16).range(1..=200),
        env = "MAILPROBE_CONCURRENCY"
    )]
    pub concurrency: u16,

    /// tentatives SMTP par adresse (première incluse)
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..=20),
        env = "MAILPROBE_MAX_RETRIES"
    )]
    pub max_retries: u32,

    /// secondes entre deux démarrages de sonde en mode séquentiel
    #[arg(long, default_value_t = 2.0, env = "MAILPROBE_RATE_LIMIT_DELAY")]
    pub rate_limit_delay: f64,

    /// délai de base avant une nouvelle tentative (secondes, multiplié par n)
    #[arg(long, default_value_t = 1.0, env = "MAILPROBE_RETRY_BACKOFF")]
    pub retry_backoff: f64,

    /// timeout par étape SMTP (secondes)
    #[arg(long, default_value_t = 5.0, env = "MAILPROBE_SMTP_TIMEOUT")]
    pub smtp_timeout: f64,

    /// timeout par requête DNS (secondes)
    #[arg(long, default_value_t = 3.0, env = "MAILPROBE_DNS_TIMEOUT")]
    pub dns_timeout: f64,

    /// requêtes DNS MX par domaine au maximum
    #[arg(long, default_value_t = 2, env = "MAILPROBE_DNS_ATTEMPTS")]
    pub dns_attempts: u32,

    /// port SMTP des serveurs MX
    #[arg(long, default_value_t = 25, env = "MAILPROBE_SMTP_PORT")]
    pub port: u16,

    /// nom annoncé dans EHLO/HELO
    #[arg(long, default_value = "localhost", env = "MAILPROBE_HELO")]
    pub helo: String,

    /// enveloppe MAIL FROM
    #[arg(long = "from", default_value = "validator@localhost", env = "MAILPROBE_MAIL_FROM")]
    pub mail_from: String,

    /// utilise les A/AAAA du domaine quand il n'a pas de MX
    #[arg(long, env = "MAILPROBE_IMPLICIT_MX")]
    pub implicit_mx: bool,

    /// domaine catch-all supplémentaire (répétable)
    #[arg(long = "catch-all")]
    pub catch_all: Vec<String>,

    /// journal NDJSON des sessions SMTP
    #[arg(long, default_value = DEFAULT_CHECK_LOG, env = "MAILPROBE_CHECK_LOG")]
    pub check_log: PathBuf,

    /// désactive le journal des sessions
    #[arg(long)]
    pub no_check_log: bool,

    /// écrit aussi le résumé en JSON dans ce fichier
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// pas de ligne de progression sur stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// niveau de log: error|warn|info|debug|trace (RUST_LOG sinon)
    #[arg(long, env = "MAILPROBE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// logs au format JSON
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// vérifie une seule adresse et affiche le résultat
    Validate { email: String },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn parsed_mode(&self) -> Result<ValidationMode> {
        match self.mode.as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "relaxed" => Ok(ValidationMode::Relaxed),
            other => bail!("unknown --mode '{other}', use: strict|relaxed"),
        }
    }

    pub fn batch_options(&self) -> Result<BatchOptions> {
        Ok(BatchOptions {
            concurrency: usize::from(self.concurrency),
            max_retries: self.max_retries,
            rate_limit_delay: seconds("--rate-limit-delay", self.rate_limit_delay)?,
            retry_backoff: seconds("--retry-backoff", self.retry_backoff)?,
            mode: self.parsed_mode()?,
            catch_all_domains: self.catch_all.clone(),
            probe: ProbeOptions {
                helo_domain: self.helo.clone(),
                mail_from: self.mail_from.clone(),
                port: self.port,
                step_timeout: seconds("--smtp-timeout", self.smtp_timeout)?,
            },
            mx: MxOptions {
                timeout: seconds("--dns-timeout", self.dns_timeout)?,
                attempts: self.dns_attempts.max(1),
                implicit_mx: self.implicit_mx,
            },
        })
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag} must be >= 0, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_onto_options() {
        let cli = Cli::try_parse_from(["mailprobe-cli"]).expect("parse");
        let opts = cli.batch_options().expect("options");
        assert_eq!(opts, BatchOptions::default());
    }

    #[test]
    fn concurrency_is_bounded() {
        assert!(Cli::try_parse_from(["mailprobe-cli", "--concurrency", "0"]).is_err());
        assert!(Cli::try_parse_from(["mailprobe-cli", "--concurrency", "201"]).is_err());
        assert!(Cli::try_parse_from(["mailprobe-cli", "--concurrency", "200"]).is_ok());
    }

    #[test]
    fn negative_durations_are_rejected() {
        let cli = Cli::try_parse_from(["mailprobe-cli", "--smtp-timeout=-1"]).expect("parse");
        assert!(cli.batch_options().is_err());
    }
}
