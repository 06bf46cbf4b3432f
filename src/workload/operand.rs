use std::fmt;
use std::str::FromStr;

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// Tensor operand of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operand {
    Input,
    Weight,
    Output,
}

// memory-operand aliases resolve onto the layer operand they serve
static OPERAND_NAMES: phf::Map<&'static str, Operand> = phf_map! {
    "I" => Operand::Input,
    "I1" => Operand::Input,
    "W" => Operand::Weight,
    "I2" => Operand::Weight,
    "O" => Operand::Output,
};

impl Operand {
    pub const ALL: [Operand; 3] = [Operand::Input, Operand::Weight, Operand::Output];

    pub fn name(&self) -> &'static str {
        match self {
            Operand::Input => "I",
            Operand::Weight => "W",
            Operand::Output => "O",
        }
    }
}

impl FromStr for Operand {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OPERAND_NAMES
            .get(value)
            .copied()
            .ok_or_else(|| format!("unknown operand '{}', expected one of: I, W, O", value))
    }
}

impl TryFrom<String> for Operand {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operand> for String {
    fn from(operand: Operand) -> Self {
        operand.name().to_string()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loop dimension of a layer's nested-loop description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoopDim {
    B,
    K,
    C,
    OY,
    OX,
    FY,
    FX,
    G,
}

static LOOP_DIM_NAMES: phf::Map<&'static str, LoopDim> = phf_map! {
    "B" => LoopDim::B,
    "K" => LoopDim::K,
    "C" => LoopDim::C,
    "OY" => LoopDim::OY,
    "OX" => LoopDim::OX,
    "FY" => LoopDim::FY,
    "FX" => LoopDim::FX,
    "G" => LoopDim::G,
};

impl LoopDim {
    /// Dimensions along which a layer's output can be split across cores.
    pub const SPLITTABLE: [LoopDim; 2] = [LoopDim::K, LoopDim::G];

    pub fn name(&self) -> &'static str {
        match self {
            LoopDim::B => "B",
            LoopDim::K => "K",
            LoopDim::C => "C",
            LoopDim::OY => "OY",
            LoopDim::OX => "OX",
            LoopDim::FY => "FY",
            LoopDim::FX => "FX",
            LoopDim::G => "G",
        }
    }
}

impl FromStr for LoopDim {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LOOP_DIM_NAMES
            .get(value)
            .copied()
            .ok_or_else(|| format!("unknown loop dimension '{}'", value))
    }
}

impl TryFrom<String> for LoopDim {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LoopDim> for String {
    fn from(dim: LoopDim) -> Self {
        dim.name().to_string()
    }
}

impl fmt::Display for LoopDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
