use serde::{Deserialize, Serialize};

/// One mail exchanger. Ordering is by priority first, so a sorted list puts
/// the preferred host at the front.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MxRecord {
    pub priority: u16,
    pub host: String,
}

impl MxRecord {
    pub fn new(priority: u16, host: impl Into<String>) -> Self {
        Self {
            priority,
            host: host.into(),
        }
    }
}
