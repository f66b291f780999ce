//! Per-connection liveness flag.

/// What a sweep should do with a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The connection answered the last probe; send another one.
    Probe,
    /// The last probe went unanswered; force-close the connection.
    Terminate,
}

/// Tracks whether a connection has proven itself alive since the last sweep.
///
/// ```text
///   alive ──(check → Probe)──→ unconfirmed ──(check → Terminate)
///     ↑                            │
///     └────────(acknowledge)───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    alive: bool,
}

impl Heartbeat {
    /// A freshly accepted connection counts as alive.
    pub fn new() -> Self {
        Self { alive: true }
    }

    /// Runs one sweep step.
    ///
    /// Clears the flag when returning [`Verdict::Probe`]; leaves it
    /// untouched when returning [`Verdict::Terminate`].
    pub fn check(&mut self) -> Verdict {
        if !self.alive {
            return Verdict::Terminate;
        }
        self.alive = false;
        Verdict::Probe
    }

    /// Records a probe acknowledgment from the peer.
    pub fn acknowledge(&mut self) {
        self.alive = true;
    }

    /// Whether the connection has been confirmed since the last sweep.
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
