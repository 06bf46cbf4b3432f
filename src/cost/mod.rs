pub mod lut;

pub use lut::{
    get_loop_size, CostModelConfig, CostModelLut, EquivalenceClass, PerformanceRecord, TemporalLoop,
};
