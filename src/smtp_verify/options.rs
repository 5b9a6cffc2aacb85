use std::borrow::Cow;
use std::time::Duration;

/// Configuration knobs for one SMTP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub helo_domain: String,
    pub mail_from: String,
    pub port: u16,
    /// Deadline applied to the TCP connect and to every command/reply step.
    pub step_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            helo_domain: "localhost".to_string(),
            mail_from: "validator@localhost".to_string(),
            port: 25,
            step_timeout: Duration::from_secs(5),
        }
    }
}

impl ProbeOptions {
    /// Name sent with `EHLO`. Falls back to the sender's domain, then to
    /// `localhost`.
    pub fn helo_name(&self) -> Cow<'_, str> {
        let helo = self.helo_domain.trim();
        if !helo.is_empty() {
            return Cow::Borrowed(helo);
        }
        match self.mail_from.rsplit_once('@') {
            Some((_, domain)) if !domain.is_empty() => Cow::Borrowed(domain),
            _ => Cow::Borrowed("localhost"),
        }
    }
}
