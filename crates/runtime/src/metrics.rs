//! Runtime counters.
//!
//! [`RuntimeMetrics`] is constructed once and handed to every handler as an
//! `Arc`, so tests and embedded instances each get their own counters.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Default)]
struct Counters {
    aicalls_created: BTreeMap<String, u64>,
    transitions: BTreeMap<String, u64>,
    messages: BTreeMap<String, u64>,
    tool_executions: BTreeMap<String, u64>,
    engine_requests: BTreeMap<String, u64>,
    cleanup_warnings: BTreeMap<String, u64>,
    turns: u64,
    turn_timeouts: u64,
}

/// Point-in-time copy of all counters, served by `GET /v1/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Keyed by reference type.
    pub aicalls_created: BTreeMap<String, u64>,
    /// Keyed by target status.
    pub transitions: BTreeMap<String, u64>,
    /// Keyed by message role.
    pub messages: BTreeMap<String, u64>,
    /// Keyed by `<tool>:<success|failed>`.
    pub tool_executions: BTreeMap<String, u64>,
    /// Keyed by engine target.
    pub engine_requests: BTreeMap<String, u64>,
    /// Keyed by cleanup step.
    pub cleanup_warnings: BTreeMap<String, u64>,
    pub turns: u64,
    pub turn_timeouts: u64,
}

#[derive(Default)]
pub struct RuntimeMetrics {
    counters: RwLock<Counters>,
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aicall_created(&self, reference_type: &str) {
        bump(&mut self.counters.write().aicalls_created, reference_type);
    }

    pub fn transition(&self, status: &str) {
        bump(&mut self.counters.write().transitions, status);
    }

    pub fn message_created(&self, role: &str) {
        bump(&mut self.counters.write().messages, role);
    }

    pub fn tool_executed(&self, name: &str, success: bool) {
        let key = format!("{name}:{}", if success { "success" } else { "failed" });
        bump(&mut self.counters.write().tool_executions, &key);
    }

    pub fn engine_request(&self, target: &str) {
        bump(&mut self.counters.write().engine_requests, target);
    }

    pub fn cleanup_warning(&self, step: &str) {
        bump(&mut self.counters.write().cleanup_warnings, step);
    }

    pub fn turn_completed(&self, timed_out: bool) {
        let mut c = self.counters.write();
        c.turns += 1;
        if timed_out {
            c.turn_timeouts += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.read();
        MetricsSnapshot {
            aicalls_created: c.aicalls_created.clone(),
            transitions: c.transitions.clone(),
            messages: c.messages.clone(),
            tool_executions: c.tool_executions.clone(),
            engine_requests: c.engine_requests.clone(),
            cleanup_warnings: c.cleanup_warnings.clone(),
            turns: c.turns,
            turn_timeouts: c.turn_timeouts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_keyed_and_independent() {
        let m = RuntimeMetrics::new();
        m.tool_executed("connect", true);
        m.tool_executed("connect", true);
        m.tool_executed("connect", false);
        m.turn_completed(true);
        m.turn_completed(false);

        let snap = m.snapshot();
        assert_eq!(snap.tool_executions["connect:success"], 2);
        assert_eq!(snap.tool_executions["connect:failed"], 1);
        assert_eq!(snap.turns, 2);
        assert_eq!(snap.turn_timeouts, 1);

        let other = RuntimeMetrics::new();
        assert_eq!(other.snapshot(), MetricsSnapshot::default());
    }
}
