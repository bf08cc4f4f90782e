use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Direction of a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Became connected / present / plugged in / online.
    Rising,
    /// Became disconnected / absent / unplugged / offline.
    Falling,
}

/// Per-(signal, edge) "last emitted at" timestamps.
///
/// An edge is let through only if the same edge of the same signal was not
/// emitted within the window.
#[derive(Debug, Default)]
pub struct EdgeGate {
    last: HashMap<(String, Edge), Instant>,
}

impl EdgeGate {
    pub fn allow(&mut self, signal: &str, edge: Edge, window: Duration, now: Instant) -> bool {
        let key = (signal.to_owned(), edge);

        if let Some(&at) = self.last.get(&key) {
            if now.saturating_duration_since(at) < window {
                return false;
            }
        }

        self.last.insert(key, now);
        true
    }
}
