//! Generation-tracked cancellation for mentor streams.
//!
//! Only the most recently started stream is authoritative. Starting a new
//! one cancels the previous token, and results carrying an older
//! generation are dropped by the owner.

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle given to one in-flight stream.
#[derive(Debug, Clone)]
pub struct StreamTicket {
    generation: u64,
    token: CancellationToken,
}

impl StreamTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
pub struct StreamSessions {
    generation: u64,
    current: Option<CancellationToken>,
}

impl StreamSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is in flight and start a new generation.
    pub fn begin(&mut self) -> StreamTicket {
        if let Some(previous) = self.current.take() {
            previous.cancel();
            debug!("Superseded stream generation {}", self.generation);
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        StreamTicket {
            generation: self.generation,
            token,
        }
    }

    /// Whether results produced under `ticket` should still be applied.
    pub fn is_current(&self, ticket: &StreamTicket) -> bool {
        ticket.generation == self.generation && !ticket.is_cancelled()
    }

    /// Same check for results that only carry their generation, such as
    /// events sent back from a spawned stream task.
    pub fn is_current_generation(&self, generation: u64) -> bool {
        generation == self.generation && self.current.is_some()
    }

    /// Cancel the in-flight stream without starting another.
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
