pub mod apply;
pub mod candidate;
pub mod feasibility;
pub mod fitness;

pub use apply::{too_large_operands, AllocationResult, Allocator, FlexibleGroup};
pub use candidate::{group_options, random_candidate, Candidate};
pub use feasibility::{
    split_latency, Cost, EnergyTable, FeasibilityBuilder, FeasibilityCache, FeasibilityTable, SplitBound,
    SplitKey, IMPOSSIBLE,
};
pub use fitness::{
    evaluate_parallel, BaseFitnessEvaluator, DetailedFitness, Fitness, FitnessEvaluator,
    StandardFitnessEvaluator, METRICS, WEIGHTS,
};
