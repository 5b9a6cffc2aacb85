use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::error::SessionError;
use super::types::{SessionState, SmtpReply};

const MAX_LINE: u64 = 4096;
const MAX_REPLY_LINES: usize = 64;

pub(crate) struct SmtpSession {
    host: String,
    reader: BufReader<TcpStream>,
    step_timeout: Duration,
    state: SessionState,
    transcript: Vec<String>,
}

impl SmtpSession {
    /// `IDLE -> CONNECTED`.
    pub(crate) async fn connect(
        host: &str,
        port: u16,
        step_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let stream = match timeout(step_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(SessionError::Connect {
                    host: host.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    host: host.to_string(),
                });
            }
        };
        Ok(Self {
            host: host.to_string(),
            reader: BufReader::new(stream),
            step_timeout,
            state: SessionState::Connected,
            transcript: Vec::new(),
        })
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn advance(&mut self, state: SessionState) {
        debug_assert!(state >= self.state, "session state moved backwards");
        self.state = state;
    }

    pub(crate) fn into_transcript(self) -> Vec<String> {
        self.transcript
    }

    fn record(&mut self, direction: &str, message: &str) {
        trace!(target: "mailprobe::smtp", host = %self.host, "{direction}: {message}");
        self.transcript
            .push(format!("[{}] {direction}: {message}", self.host));
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            self.record("S", &reply.code.to_string());
        } else {
            for line in &reply.lines {
                self.record("S", &format!("{} {}", reply.code, line));
            }
        }
    }

    /// Reads one (possibly multi-line) reply within the step deadline.
    pub(crate) async fn read_reply(&mut self) -> Result<SmtpReply, SessionError> {
        let reply = bounded(
            self.step_timeout,
            self.state,
            read_reply_from(&mut self.reader),
        )
        .await?;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Sends `command` and waits for its reply, both within the step deadline.
    pub(crate) async fn command(&mut self, command: &str) -> Result<SmtpReply, SessionError> {
        self.record("C", command);
        let line = format!("{command}\r\n");
        let stream = self.reader.get_mut();
        bounded(self.step_timeout, self.state, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        })
        .await?;
        self.read_reply().await
    }

    /// `* -> CLOSED`. Sends `QUIT`, waits briefly for the goodbye and shuts
    /// the socket down. Never fails: the verdict is already known. Returns
    /// whether `QUIT` reached the wire.
    pub(crate) async fn quit(&mut self) -> bool {
        self.record("C", "QUIT");
        let deadline = self.step_timeout;
        let stream = self.reader.get_mut();
        let sent = matches!(
            timeout(deadline, async {
                stream.write_all(b"QUIT\r\n").await?;
                stream.flush().await
            })
            .await,
            Ok(Ok(()))
        );
        if sent {
            if let Ok(Ok(reply)) = timeout(deadline, read_reply_from(&mut self.reader)).await {
                self.record_reply(&reply);
            }
        }
        let _ = timeout(deadline, self.reader.get_mut().shutdown()).await;
        self.state = SessionState::Closed;
        sent
    }
}

async fn bounded<T, F>(
    step_timeout: Duration,
    state: SessionState,
    fut: F,
) -> Result<T, SessionError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(step_timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.kind() == io::ErrorKind::InvalidData => {
            Err(SessionError::Protocol(err.to_string()))
        }
        Ok(Err(err)) => Err(SessionError::io(err)),
        Err(_) => Err(SessionError::Timeout { state }),
    }
}

async fn read_reply_from(reader: &mut BufReader<TcpStream>) -> io::Result<SmtpReply> {
    let mut code = None;
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let bytes = (&mut *reader).take(MAX_LINE).read_line(&mut raw).await?;
        if bytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            ));
        }
        if !raw.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "SMTP reply line too long",
            ));
        }
        raw.pop();
        if raw.ends_with('\r') {
            raw.pop();
        }

        let parsed_code = raw
            .get(..3)
            .and_then(|part| part.parse::<u16>().ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP reply: '{raw}'"),
                )
            })?;
        match code {
            Some(existing) if existing != parsed_code => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("inconsistent SMTP reply codes: {existing} vs {parsed_code}"),
                ));
            }
            Some(_) => {}
            None => code = Some(parsed_code),
        }

        let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
        lines.push(raw.get(4..).unwrap_or_default().to_string());
        if !continuation {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "SMTP reply has too many lines",
            ));
        }
    }
    Ok(SmtpReply {
        code: code.unwrap_or_default(),
        lines,
    })
}
