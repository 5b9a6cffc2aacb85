use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mx::MxRecord;
use crate::validator::EmailAddress;

use super::error::SessionError;
use super::options::ProbeOptions;
use super::session::SmtpSession;
use super::types::{HostAttempt, ProbeOutcome, ProbeReport, SessionState, SmtpReply};

/// Walks `hosts` in the given order (ascending priority). Moves on to the
/// next host only when no SMTP conversation could be established with the
/// current one; any server answer settles the report.
///
/// Returns `None` when `cancel` fires before the walk settles: a session
/// interrupted locally carries no verdict from the server.
pub async fn probe_hosts(
    hosts: &[MxRecord],
    target: &EmailAddress,
    options: &ProbeOptions,
    cancel: &CancellationToken,
) -> Option<ProbeReport> {
    let mut attempts: Vec<HostAttempt> = Vec::with_capacity(hosts.len().min(4));

    for record in hosts {
        if cancel.is_cancelled() {
            return None;
        }
        let attempt = probe_host(&record.host, target, options, cancel).await?;
        if !attempt.outcome.is_decisive() {
            debug!(
                target: "mailprobe::smtp",
                host = %record.host,
                outcome = ?attempt.outcome,
                transcript = ?attempt.transcript,
                "session ended without a verdict"
            );
        }
        let fall_through = attempt.outcome.is_connect_failure();
        if fall_through {
            debug!(
                target: "mailprobe::smtp",
                host = %record.host,
                "MX host unreachable, trying next"
            );
        }
        attempts.push(attempt);
        if !fall_through {
            break;
        }
    }

    let report = match attempts.last() {
        Some(last) => ProbeReport {
            outcome: last.outcome.clone(),
            mx_host: last.mx_host.clone(),
            hosts: attempts,
        },
        None => ProbeReport {
            outcome: ProbeOutcome::ConnectionRefused {
                message: "no MX host to connect to".to_string(),
            },
            mx_host: String::new(),
            hosts: attempts,
        },
    };
    Some(report)
}

/// One full session against `host`. Whenever a connection was opened it is
/// closed with `QUIT`, whatever the outcome, including on cancellation,
/// which yields `None`.
pub async fn probe_host(
    host: &str,
    target: &EmailAddress,
    options: &ProbeOptions,
    cancel: &CancellationToken,
) -> Option<HostAttempt> {
    let started = Instant::now();
    let connect = SmtpSession::connect(host, options.port, options.step_timeout);
    let mut session = match connect.await {
        Ok(session) => session,
        Err(err) => {
            let outcome = match err {
                SessionError::ConnectTimeout { .. } => ProbeOutcome::Timeout {
                    state: SessionState::Idle,
                },
                other => ProbeOutcome::ConnectionRefused {
                    message: other.to_string(),
                },
            };
            return Some(HostAttempt {
                mx_host: host.to_string(),
                outcome,
                latency: started.elapsed(),
                reached: SessionState::Idle,
                quit_sent: false,
                transcript: Vec::new(),
            });
        }
    };

    let outcome = tokio::select! {
        outcome = dialogue(&mut session, target, options) => Some(outcome),
        _ = cancel.cancelled() => None,
    };
    let reached = session.state();

    let quit_sent = session.quit().await;
    if !quit_sent {
        warn!(target: "mailprobe::smtp", host, "QUIT could not be sent (non-critical)");
    }

    let Some(outcome) = outcome else {
        debug!(target: "mailprobe::smtp", host, ?reached, quit_sent, "session cancelled");
        return None;
    };
    Some(HostAttempt {
        mx_host: host.to_string(),
        outcome,
        latency: started.elapsed(),
        reached,
        quit_sent,
        transcript: session.into_transcript(),
    })
}

/// `CONNECTED -> GREETED -> SENDER_OK -> RECIPIENT_CHECKED`.
async fn dialogue(
    session: &mut SmtpSession,
    target: &EmailAddress,
    options: &ProbeOptions,
) -> ProbeOutcome {
    let banner = match session.read_reply().await {
        Ok(reply) => reply,
        Err(err) => return transient_error("greeting", err),
    };
    if !banner.is_positive_completion() {
        return transient_reply("greeting", &banner);
    }

    let helo = options.helo_name();
    let ehlo = match session.command(&format!("EHLO {helo}")).await {
        Ok(reply) => reply,
        Err(err) => return transient_error("EHLO", err),
    };
    if !ehlo.is_positive_completion() {
        // serveurs anciens: retombe sur HELO
        if !ehlo.is_permanent_failure() {
            return transient_reply("EHLO", &ehlo);
        }
        match session.command(&format!("HELO {helo}")).await {
            Ok(reply) if reply.is_positive_completion() => {}
            Ok(reply) => return transient_reply("HELO", &reply),
            Err(err) => return transient_error("HELO", err),
        }
    }
    session.advance(SessionState::Greeted);

    let mail_from = format!("MAIL FROM:<{}>", options.mail_from);
    match session.command(&mail_from).await {
        Ok(reply) if reply.is_positive_completion() => {}
        Ok(reply) => return transient_reply("MAIL FROM", &reply),
        Err(err) => return transient_error("MAIL FROM", err),
    }
    session.advance(SessionState::SenderOk);

    let rcpt = format!("RCPT TO:<{}>", target.rcpt_path());
    let reply = match session.command(&rcpt).await {
        Ok(reply) => reply,
        Err(SessionError::Timeout { state }) => return ProbeOutcome::Timeout { state },
        Err(err) => return transient_error("RCPT TO", err),
    };
    session.advance(SessionState::RecipientChecked);
    rcpt_outcome(reply)
}

/// Any 5xx to `RCPT TO` is a verdict on the recipient, whatever the code.
pub(crate) fn rcpt_outcome(reply: SmtpReply) -> ProbeOutcome {
    if reply.is_positive_completion() {
        ProbeOutcome::Accepted { reply }
    } else if reply.is_permanent_failure() {
        ProbeOutcome::Rejected { reply }
    } else {
        ProbeOutcome::Transient {
            code: Some(reply.code),
            message: reply.text(),
        }
    }
}

fn transient_reply(step: &str, reply: &SmtpReply) -> ProbeOutcome {
    ProbeOutcome::Transient {
        code: Some(reply.code),
        message: format!("{step} refused: {reply}"),
    }
}

fn transient_error(step: &str, err: SessionError) -> ProbeOutcome {
    ProbeOutcome::Transient {
        code: None,
        message: format!("{step} failed: {err}"),
    }
}
