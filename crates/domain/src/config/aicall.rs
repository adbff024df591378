use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aicall runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AicallConfig {
    /// Page size used when reading the ledger back for an engine turn. The
    /// whole live ledger is always replayed.
    #[serde(default = "d_100")]
    pub history_limit: usize,
    /// Deadline for one streaming turn, in seconds. `0` disables it.
    #[serde(default = "d_120")]
    pub turn_timeout_secs: u64,
    /// Capacity of the sentence and tool channels between the engine pump
    /// and the conversation controller.
    #[serde(default = "d_64")]
    pub stream_channel_capacity: usize,
    /// Delay before a `connect` tool terminates the session, giving the
    /// workflow time to take over the call.
    #[serde(default = "d_1000")]
    pub connect_terminate_delay_ms: u64,
    /// System prompt used when the AI has no init prompt of its own.
    #[serde(default)]
    pub default_init_prompt: String,
}

impl Default for AicallConfig {
    fn default() -> Self {
        Self {
            history_limit: d_100(),
            turn_timeout_secs: d_120(),
            stream_channel_capacity: d_64(),
            connect_terminate_delay_ms: d_1000(),
            default_init_prompt: String::new(),
        }
    }
}

impl AicallConfig {
    pub fn turn_timeout(&self) -> Option<std::time::Duration> {
        (self.turn_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.turn_timeout_secs))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_100() -> usize {
    100
}
fn d_120() -> u64 {
    120
}
fn d_64() -> usize {
    64
}
fn d_1000() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_turn_timeout() {
        let cfg = AicallConfig {
            turn_timeout_secs: 0,
            ..Default::default()
        };
        assert!(cfg.turn_timeout().is_none());
        assert_eq!(
            AicallConfig::default().turn_timeout(),
            Some(std::time::Duration::from_secs(120))
        );
    }
}
