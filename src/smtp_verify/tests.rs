use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::probe::rcpt_outcome;
use super::{
    HostAttempt, ProbeOptions, ProbeOutcome, ProbeReport, SessionState, SmtpReply, probe_host,
    probe_hosts,
};
use crate::mx::MxRecord;
use crate::validator::{EmailAddress, ValidationMode, parse_address};

/// Behaviour of the scripted SMTP server.
#[derive(Clone, Copy)]
pub(crate) struct Script {
    pub banner: &'static str,
    pub ehlo: &'static str,
    /// Reply to a `RCPT TO:` line, chosen from the full command.
    pub rcpt: fn(&str) -> &'static str,
    /// Stop answering once a command with this prefix arrives.
    pub hang_on: Option<&'static str>,
    /// Pause before the banner.
    pub delay: Duration,
}

impl Script {
    pub(crate) fn replying(rcpt: fn(&str) -> &'static str) -> Self {
        Self {
            banner: "220 mock.smtp.test ESMTP\r\n",
            ehlo: "250-mock.smtp.test\r\n250 SIZE 10240000\r\n",
            rcpt,
            hang_on: None,
            delay: Duration::ZERO,
        }
    }
}

pub(crate) struct MockSmtp {
    pub port: u16,
    sessions: Arc<Mutex<Vec<Vec<String>>>>,
    peak: Arc<AtomicUsize>,
}

impl MockSmtp {
    pub(crate) async fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let sessions: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (sessions_bg, peak_bg) = (sessions.clone(), peak.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = {
                    let mut all = sessions_bg.lock().expect("sessions lock");
                    all.push(Vec::new());
                    all.len() - 1
                };
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak_bg.fetch_max(now, Ordering::SeqCst);
                let (sessions, active) = (sessions_bg.clone(), active.clone());
                tokio::spawn(async move {
                    let _ = serve(stream, script, &sessions, index).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            port,
            sessions,
            peak,
        }
    }

    /// Commands received, one list per accepted connection.
    pub(crate) fn sessions(&self) -> Vec<Vec<String>> {
        self.sessions.lock().expect("sessions lock").clone()
    }

    pub(crate) fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    script: Script,
    sessions: &Mutex<Vec<Vec<String>>>,
    index: usize,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    tokio::time::sleep(script.delay).await;
    reader.get_mut().write_all(script.banner.as_bytes()).await?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        sessions.lock().expect("sessions lock")[index].push(command.clone());

        if script.hang_on.is_some_and(|prefix| command.starts_with(prefix)) {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return Ok(());
        }
        let upper = command.to_ascii_uppercase();
        let reply = if upper.starts_with("EHLO") {
            script.ehlo
        } else if upper.starts_with("HELO") {
            "250 mock.smtp.test\r\n"
        } else if upper.starts_with("MAIL FROM:") {
            "250 2.1.0 Ok\r\n"
        } else if upper.starts_with("RCPT TO:") {
            (script.rcpt)(&command)
        } else if upper.starts_with("QUIT") {
            reader.get_mut().write_all(b"221 2.0.0 Bye\r\n").await?;
            return Ok(());
        } else {
            "502 5.5.2 Error: command not recognized\r\n"
        };
        reader.get_mut().write_all(reply.as_bytes()).await?;
    }
}

/// A port nothing listens on.
pub(crate) async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

fn target(email: &str) -> EmailAddress {
    parse_address(email, ValidationMode::Strict).expect("valid address")
}

fn options(port: u16) -> ProbeOptions {
    ProbeOptions {
        port,
        step_timeout: Duration::from_millis(500),
        ..ProbeOptions::default()
    }
}

fn loopback() -> Vec<MxRecord> {
    vec![MxRecord::new(10, "127.0.0.1")]
}

async fn walk(hosts: &[MxRecord], email: &str, port: u16) -> ProbeReport {
    probe_hosts(hosts, &target(email), &options(port), &CancellationToken::new())
        .await
        .expect("not cancelled")
}

async fn session(email: &str, port: u16) -> HostAttempt {
    probe_host("127.0.0.1", &target(email), &options(port), &CancellationToken::new())
        .await
        .expect("not cancelled")
}

fn reply(code: u16) -> SmtpReply {
    SmtpReply {
        code,
        lines: vec!["text".to_string()],
    }
}

#[tokio::test]
async fn accepted_recipient_then_quit() {
    let server = MockSmtp::spawn(Script::replying(|_| "250 2.1.5 Ok\r\n")).await;
    let report = walk(&loopback(), "user@example.com", server.port).await;

    assert!(matches!(report.outcome, ProbeOutcome::Accepted { .. }));
    assert_eq!(report.mx_host, "127.0.0.1");
    let commands = &server.sessions()[0];
    assert!(commands[0].starts_with("EHLO localhost"));
    assert_eq!(commands[1], "MAIL FROM:<validator@localhost>");
    assert_eq!(commands[2], "RCPT TO:<user@example.com>");
    assert_eq!(commands[3], "QUIT");
}

#[tokio::test]
async fn rejected_recipient_still_sends_quit() {
    let server = MockSmtp::spawn(Script::replying(|_| "550 5.1.1 User unknown\r\n")).await;
    let attempt = session("ghost@example.com", server.port).await;

    match &attempt.outcome {
        ProbeOutcome::Rejected { reply } => assert_eq!(reply.code, 550),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(attempt.reached, SessionState::RecipientChecked);
    assert!(attempt.quit_sent);
    assert_eq!(server.sessions()[0].last().map(String::as_str), Some("QUIT"));
    assert!(attempt.transcript.iter().any(|line| line.ends_with("C: QUIT")));
}

#[tokio::test]
async fn greylisting_is_transient() {
    let server = MockSmtp::spawn(Script::replying(|_| "451 4.7.1 Greylisted, retry later\r\n"))
        .await;
    let attempt = session("user@example.com", server.port).await;
    assert!(matches!(
        attempt.outcome,
        ProbeOutcome::Transient { code: Some(451), .. }
    ));
    assert!(attempt.outcome.is_retryable());
}

#[tokio::test]
async fn refused_greeting_is_transient_and_closed() {
    let mut script = Script::replying(|_| "250 Ok\r\n");
    script.banner = "554 5.7.1 No SMTP service here\r\n";
    let server = MockSmtp::spawn(script).await;
    let attempt = session("user@example.com", server.port).await;
    assert!(matches!(
        attempt.outcome,
        ProbeOutcome::Transient { code: Some(554), .. }
    ));
    assert_eq!(attempt.reached, SessionState::Connected);
    assert!(attempt.quit_sent);
}

#[tokio::test]
async fn silent_rcpt_times_out_and_quits() {
    let mut script = Script::replying(|_| "250 Ok\r\n");
    script.hang_on = Some("RCPT");
    let server = MockSmtp::spawn(script).await;
    let attempt = session("user@example.com", server.port).await;
    assert_eq!(
        attempt.outcome,
        ProbeOutcome::Timeout {
            state: SessionState::SenderOk
        }
    );
    assert!(attempt.quit_sent);
}

#[tokio::test]
async fn refused_connection_falls_through_to_next_host() {
    let server = MockSmtp::spawn(Script::replying(|_| "250 2.1.5 Ok\r\n")).await;
    // the mock only listens on 127.0.0.1, so 127.0.0.2 refuses
    let hosts = [MxRecord::new(5, "127.0.0.2"), MxRecord::new(10, "127.0.0.1")];
    let report = walk(&hosts, "user@example.com", server.port).await;
    assert_eq!(report.hosts.len(), 2);
    assert!(matches!(
        report.hosts[0].outcome,
        ProbeOutcome::ConnectionRefused { .. }
    ));
    assert!(matches!(report.outcome, ProbeOutcome::Accepted { .. }));
    assert_eq!(report.mx_host, "127.0.0.1");
}

#[tokio::test]
async fn all_hosts_refusing_yields_connection_refused() {
    let dead = closed_port().await;
    let hosts = [MxRecord::new(5, "127.0.0.1"), MxRecord::new(10, "127.0.0.1")];
    let report = walk(&hosts, "user@example.com", dead).await;
    assert!(matches!(
        report.outcome,
        ProbeOutcome::ConnectionRefused { .. }
    ));
    assert_eq!(report.hosts.len(), 2);
    assert!(report.hosts.iter().all(|h| !h.quit_sent));
}

#[tokio::test]
async fn cancellation_mid_session_yields_no_outcome() {
    let mut script = Script::replying(|_| "250 Ok\r\n");
    script.hang_on = Some("MAIL");
    let server = MockSmtp::spawn(script).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let mut options = options(server.port);
    options.step_timeout = Duration::from_secs(1);

    let started = std::time::Instant::now();
    let report = probe_hosts(&loopback(), &target("user@example.com"), &options, &cancel).await;
    assert!(report.is_none(), "cancelled session reported {report:?}");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(server.sessions().len(), 1);
}

#[tokio::test]
async fn cancelled_before_start_opens_nothing() {
    let server = MockSmtp::spawn(Script::replying(|_| "250 Ok\r\n")).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = probe_hosts(
        &loopback(),
        &target("user@example.com"),
        &options(server.port),
        &cancel,
    )
    .await;
    assert!(report.is_none());
    assert!(server.sessions().is_empty());
}

#[tokio::test]
async fn any_permanent_rcpt_code_is_a_rejection() {
    let server = MockSmtp::spawn(Script::replying(|_| {
        "501 5.1.3 Bad recipient address syntax\r\n"
    }))
    .await;
    let attempt = session("user@example.com", server.port).await;
    match &attempt.outcome {
        ProbeOutcome::Rejected { reply } => assert_eq!(reply.code, 501),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(!attempt.outcome.is_retryable());
}

#[test]
fn rcpt_reply_codes_map_to_outcomes() {
    for code in [250, 251] {
        assert!(matches!(rcpt_outcome(reply(code)), ProbeOutcome::Accepted { .. }));
    }
    for code in [500, 501, 503, 521, 550, 553, 554] {
        assert!(
            matches!(rcpt_outcome(reply(code)), ProbeOutcome::Rejected { .. }),
            "{code}"
        );
    }
    for code in [421, 450, 451, 452] {
        assert!(matches!(
            rcpt_outcome(reply(code)),
            ProbeOutcome::Transient { code: Some(c), .. } if c == code
        ));
    }
}

#[tokio::test]
async fn rejected_ehlo_falls_back_to_helo() {
    let mut script = Script::replying(|_| "250 2.1.5 Ok\r\n");
    script.ehlo = "502 5.5.2 Command not recognized\r\n";
    let server = MockSmtp::spawn(script).await;
    let attempt = session("user@example.com", server.port).await;

    assert!(matches!(attempt.outcome, ProbeOutcome::Accepted { .. }));
    let commands = &server.sessions()[0];
    assert!(commands[0].starts_with("EHLO "));
    assert!(commands[1].starts_with("HELO "));
    assert_eq!(commands[2], "MAIL FROM:<validator@localhost>");
    assert_eq!(commands.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn temporary_ehlo_failure_does_not_fall_back() {
    let mut script = Script::replying(|_| "250 2.1.5 Ok\r\n");
    script.ehlo = "421 4.3.2 Service shutting down\r\n";
    let server = MockSmtp::spawn(script).await;
    let attempt = session("user@example.com", server.port).await;

    assert!(matches!(
        attempt.outcome,
        ProbeOutcome::Transient { code: Some(421), .. }
    ));
    assert!(!server.sessions()[0].iter().any(|c| c.starts_with("HELO")));
}

#[test]
fn only_sessions_that_never_talked_fall_through() {
    let refused = ProbeOutcome::ConnectionRefused {
        message: "refused".into(),
    };
    assert!(refused.is_connect_failure());
    let connect_timeout = ProbeOutcome::Timeout {
        state: SessionState::Idle,
    };
    assert!(connect_timeout.is_connect_failure());

    for state in [
        SessionState::Connected,
        SessionState::Greeted,
        SessionState::SenderOk,
    ] {
        assert!(!ProbeOutcome::Timeout { state }.is_connect_failure());
    }
    assert!(!rcpt_outcome(reply(250)).is_connect_failure());
    assert!(!rcpt_outcome(reply(550)).is_connect_failure());
    assert!(!rcpt_outcome(reply(451)).is_connect_failure());
}
