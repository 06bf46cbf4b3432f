use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::workload::Operand;

pub type CoreId = u32;

/// Access bandwidth demanded from one memory instance, in bits per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryAccesses {
    pub rd_out_to_low: f64,
    pub wr_in_by_low: f64,
    pub rd_out_to_high: f64,
    pub wr_in_by_high: f64,
}

impl MemoryAccesses {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total(&self) -> f64 {
        self.rd_out_to_low + self.wr_in_by_low + self.rd_out_to_high + self.wr_in_by_high
    }
}

impl Add for MemoryAccesses {
    type Output = MemoryAccesses;

    fn add(mut self, rhs: MemoryAccesses) -> MemoryAccesses {
        self += rhs;
        self
    }
}

impl AddAssign for MemoryAccesses {
    fn add_assign(&mut self, rhs: MemoryAccesses) {
        self.rd_out_to_low += rhs.rd_out_to_low;
        self.wr_in_by_low += rhs.wr_in_by_low;
        self.rd_out_to_high += rhs.rd_out_to_high;
        self.wr_in_by_high += rhs.wr_in_by_high;
    }
}

/// One level of a core's memory hierarchy, listed innermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLevel {
    /// Name of the memory instance backing this level.
    pub name: String,
    pub operands: Vec<Operand>,
    pub capacity_bits: u64,
    #[serde(default)]
    pub offchip: bool,
}

impl MemoryLevel {
    pub fn serves(&self, operand: Operand) -> bool {
        self.operands.contains(&operand)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Core {
    pub id: CoreId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memory: Vec<MemoryLevel>,
}

impl Core {
    pub fn new(id: CoreId, memory: Vec<MemoryLevel>) -> Self {
        Self {
            id,
            name: format!("Core {id}"),
            memory,
        }
    }

    /// Outermost on-chip level holding `operand`.
    pub fn top_onchip_level(&self, operand: Operand) -> Option<&MemoryLevel> {
        self.memory
            .iter()
            .rev()
            .find(|level| !level.offchip && level.serves(operand))
    }

    /// Whether `bits` of `operand` fit in the core's on-chip memory.
    pub fn fits_on_chip(&self, operand: Operand, bits: u64) -> bool {
        self.top_onchip_level(operand)
            .map(|level| bits <= level.capacity_bits)
            .unwrap_or(false)
    }

    /// Outermost memory instance of the hierarchy.
    pub fn top_instance(&self) -> Option<&MemoryLevel> {
        self.memory.last()
    }
}
