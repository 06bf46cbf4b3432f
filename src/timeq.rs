/*
Timed links for the reference scheduler.

Shared transfer resources (the inter-core bus and the off-chip link) are wrapped by a TimedLink,
which enforces a service law:
    - A base latency plus a throughput component expressed in bytes-per-cycle

Transfers are served in the order they are reserved. A reservation yields a `Ticket` describing
when the payload will be available at the destination.
*/

use serde::Deserialize;

pub type Cycle = u64;

// Result of reserving a transfer on a timed link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    issued_at: Cycle,
    start_at: Cycle,
    ready_at: Cycle,
    size_bytes: u64,
}

impl Ticket {
    // Cycle at which the transfer was requested.
    pub fn issued_at(&self) -> Cycle {
        self.issued_at
    }

    // Cycle at which the link started serving the transfer.
    pub fn start_at(&self) -> Cycle {
        self.start_at
    }

    // Cycle at which the payload is available to the consumer.
    pub fn ready_at(&self) -> Cycle {
        self.ready_at
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    // Cycles spent waiting for the link to become free.
    pub fn queueing_delay(&self) -> Cycle {
        self.start_at - self.issued_at
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    // Fixed latency added to every transfer
    pub base_latency: Cycle,
    // Throughput
    pub bytes_per_cycle: u64,
    // Energy charged per transferred bit
    pub energy_per_bit: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_latency: 0,
            bytes_per_cycle: 64,
            energy_per_bit: 0.0,
        }
    }
}

// Single-lane link that enforces the configured latency/bandwidth budget.
#[derive(Debug, Clone)]
pub struct TimedLink {
    config: LinkConfig,
    busy_until: Cycle,
}

impl TimedLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            busy_until: 0,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    // Reserve the link for a transfer of `size_bytes` that becomes ready to send at `now`.
    pub fn reserve(&mut self, now: Cycle, size_bytes: u64) -> Ticket {
        let start_at = self.busy_until.max(now);
        let ready_at = self.next_ready_cycle(start_at, size_bytes);
        self.busy_until = start_at.saturating_add(self.service_cycles(size_bytes));
        Ticket {
            issued_at: now,
            start_at,
            ready_at,
            size_bytes,
        }
    }

    // Returns the earliest cycle at which a new transfer could begin service.
    pub fn available_at(&self) -> Cycle {
        self.busy_until
    }

    pub fn transfer_energy(&self, size_bits: u64) -> f64 {
        size_bits as f64 * self.config.energy_per_bit
    }

    fn service_cycles(&self, size_bytes: u64) -> Cycle {
        ceil_div_u64(size_bytes, self.config.bytes_per_cycle.max(1))
    }

    fn next_ready_cycle(&self, start: Cycle, size_bytes: u64) -> Cycle {
        start
            .saturating_add(self.config.base_latency)
            .saturating_add(self.service_cycles(size_bytes))
    }
}

fn ceil_div_u64(nom: u64, denom: u64) -> Cycle {
    debug_assert!(denom > 0);
    nom.div_ceil(denom)
}
