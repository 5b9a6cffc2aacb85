use std::time::Duration;

/// Bounds for the resolution step. These are independent from the SMTP
/// retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxOptions {
    pub timeout: Duration,
    pub attempts: u32,
    /// Use the domain's own A/AAAA records as an implicit mail host when it
    /// publishes no MX.
    pub implicit_mx: bool,
}

impl Default for MxOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            attempts: 2,
            implicit_mx: false,
        }
    }
}
