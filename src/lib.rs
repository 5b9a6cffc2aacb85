#![forbid(unsafe_code)]
//! mailprobe — vérification de délivrabilité SMTP d'adresses e-mail, sans
//! jamais envoyer de message.
//!
//! Pipeline: syntaxe ([`validator`]), résolution MX ([`mx`]), dialogue SMTP
//! jusqu'à `RCPT TO` ([`smtp_verify`]), classification ([`classify`]),
//! orchestration du lot ([`batch`]) et sorties ([`report`]).

pub mod batch;
pub mod classify;
pub mod mx;
pub mod report;
pub mod smtp_verify;
pub mod validator;

pub use batch::{BatchOptions, RunError, RunSummary, Validator};
pub use classify::{CatchAllPolicy, ValidationResult, ValidationStatus};
pub use mx::{MxError, MxOptions, MxRecord, resolve_mx};
pub use report::{
    CheckLog, Destination, OutputFormat, ReportError, ResultSink, ResultWriter,
};
pub use smtp_verify::{ProbeOptions, ProbeOutcome, probe_hosts};
pub use validator::{EmailAddress, SyntaxError, ValidationMode, parse_address};
