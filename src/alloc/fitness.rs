use std::sync::Arc;
use std::thread;

use log::debug;
use serde::Serialize;

use crate::alloc::{
    Allocator, AllocationResult, FeasibilityBuilder, FeasibilityCache, FeasibilityTable, FlexibleGroup,
    SplitBound,
};
use crate::cost::CostModelLut;
use crate::error::EvalError;
use crate::hardware::{Accelerator, CoreId};
use crate::report::StageLog;
use crate::sched::{ListScheduler, ScheduleResult, Scheduler};
use crate::stages::{StageConfig, StageDecomposer, StageRecord};
use crate::workload::{NodeKey, Operand, Workload};

/// Both objectives are minimized: the search maximizes their negation.
pub const WEIGHTS: [f64; 2] = [-1.0, -1.0];
pub const METRICS: [&str; 2] = ["energy", "latency"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fitness {
    pub energy: f64,
    pub latency: f64,
}

impl Fitness {
    /// Energy-delay product.
    pub fn edp(&self) -> f64 {
        self.energy * self.latency
    }
}

#[derive(Debug, Clone)]
pub struct DetailedFitness {
    pub fitness: Fitness,
    pub schedule: ScheduleResult,
    /// Present when the evaluator knows the workload's stages.
    pub stages: Option<Vec<StageRecord>>,
}

/// Scores allocation candidates for an external search.
pub trait FitnessEvaluator: Send + Sync {
    fn weights(&self) -> [f64; 2] {
        WEIGHTS
    }

    fn metrics(&self) -> [&'static str; 2] {
        METRICS
    }

    fn get_fitness(&self, candidate: &[CoreId]) -> Result<Fitness, EvalError>;

    fn get_fitness_detailed(&self, candidate: &[CoreId]) -> Result<DetailedFitness, EvalError> {
        let _ = candidate;
        Err(EvalError::NotImplemented("this evaluator"))
    }
}

/// Inputs shared by every evaluator; does not score candidates itself.
#[derive(Debug, Clone)]
pub struct BaseFitnessEvaluator {
    pub workload: Arc<Workload>,
    pub accelerator: Arc<Accelerator>,
    pub lut: Arc<CostModelLut>,
}

impl BaseFitnessEvaluator {
    pub fn new(workload: Workload, accelerator: Accelerator, lut: CostModelLut) -> Self {
        Self {
            workload: Arc::new(workload),
            accelerator: Arc::new(accelerator),
            lut: Arc::new(lut),
        }
    }
}

impl FitnessEvaluator for BaseFitnessEvaluator {
    fn get_fitness(&self, _candidate: &[CoreId]) -> Result<Fitness, EvalError> {
        Err(EvalError::NotImplemented("BaseFitnessEvaluator"))
    }
}

/// Applies a candidate to a private copy of the workload and schedules it.
pub struct StandardFitnessEvaluator<S: Scheduler = ListScheduler> {
    base: BaseFitnessEvaluator,
    groups: Vec<FlexibleGroup>,
    prefetch: Vec<Operand>,
    order: Vec<NodeKey>,
    scheduler: S,
    fixed: AllocationResult,
    cores: Vec<CoreId>,
    split_bound: SplitBound,
    feasibility: FeasibilityCache,
    decomposer: Option<StageDecomposer>,
    stage_log: Option<Arc<StageLog>>,
}

impl<S: Scheduler> StandardFitnessEvaluator<S> {
    pub fn new(
        base: BaseFitnessEvaluator,
        groups: Vec<FlexibleGroup>,
        prefetch: Vec<Operand>,
        order: Vec<NodeKey>,
        scheduler: S,
    ) -> Result<Self, EvalError> {
        let fixed = Allocator::new(&base.accelerator, &base.lut).derive_fixed(&base.workload, &groups)?;
        let cores = base.accelerator.compute_core_ids();
        Ok(Self {
            base,
            groups,
            prefetch,
            order,
            scheduler,
            fixed,
            cores,
            split_bound: SplitBound::default(),
            feasibility: FeasibilityCache::new(),
            decomposer: None,
            stage_log: None,
        })
    }

    /// Restricts the feasibility table to `cores`.
    pub fn with_candidate_cores(mut self, cores: Vec<CoreId>, split_bound: SplitBound) -> Self {
        self.cores = cores;
        self.split_bound = split_bound;
        self.feasibility = FeasibilityCache::new();
        self
    }

    pub fn with_stages(mut self, config: &StageConfig) -> Result<Self, EvalError> {
        self.decomposer = if config.is_empty() {
            None
        } else {
            Some(StageDecomposer::new(config, &self.base.workload)?)
        };
        Ok(self)
    }

    pub fn with_stage_log(mut self, log: Arc<StageLog>) -> Self {
        self.stage_log = Some(log);
        self
    }

    pub fn groups(&self) -> &[FlexibleGroup] {
        &self.groups
    }

    pub fn workload(&self) -> &Workload {
        &self.base.workload
    }

    /// Feasibility table over the candidate cores, built on first use.
    pub fn feasibility_table(&self) -> Result<Arc<FeasibilityTable>, EvalError> {
        self.feasibility.get_or_build(|| {
            FeasibilityBuilder::new(&self.base.accelerator, &self.base.lut)
                .with_bound(self.split_bound)
                .build(self.base.workload.nodes(), &self.cores)
        })
    }

    /// The workload copy the scheduler receives for `candidate`.
    pub fn allocated_workload(&self, candidate: &[CoreId]) -> Result<Workload, EvalError> {
        let allocation = Allocator::new(&self.base.accelerator, &self.base.lut).derive(
            &self.base.workload,
            &self.groups,
            candidate,
        )?;
        let mut workload = Workload::clone(&self.base.workload);
        workload.apply(&self.fixed)?;
        workload.apply(&allocation)?;
        Ok(workload)
    }

    pub fn evaluate(&self, candidate: &[CoreId]) -> Result<ScheduleResult, EvalError> {
        let workload = self.allocated_workload(candidate)?;
        let accelerator = Accelerator::clone(&self.base.accelerator);
        let schedule = self.scheduler.run(workload, accelerator, &self.prefetch, &self.order)?;
        debug!(
            "candidate {:?}: energy {:.3e}, latency {}",
            candidate, schedule.total_energy, schedule.total_latency
        );
        Ok(schedule)
    }
}

impl<S: Scheduler> FitnessEvaluator for StandardFitnessEvaluator<S> {
    fn get_fitness(&self, candidate: &[CoreId]) -> Result<Fitness, EvalError> {
        let schedule = self.evaluate(candidate)?;
        Ok(Fitness {
            energy: schedule.total_energy,
            latency: schedule.total_latency as f64,
        })
    }

    fn get_fitness_detailed(&self, candidate: &[CoreId]) -> Result<DetailedFitness, EvalError> {
        let schedule = self.evaluate(candidate)?;
        let stages = self
            .decomposer
            .as_ref()
            .map(|decomposer| decomposer.decompose(&schedule))
            .transpose()?;
        if let (Some(log), Some(stages)) = (self.stage_log.as_ref(), stages.as_ref()) {
            log.write_stages(candidate, stages)?;
        }
        Ok(DetailedFitness {
            fitness: Fitness {
                energy: schedule.total_energy,
                latency: schedule.total_latency as f64,
            },
            schedule,
            stages,
        })
    }
}

/// Scores `candidates` on up to `threads` worker threads, preserving order.
pub fn evaluate_parallel<E: FitnessEvaluator + ?Sized>(
    evaluator: &E,
    candidates: &[Vec<CoreId>],
    threads: usize,
) -> Vec<Result<Fitness, EvalError>> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let chunk_size = candidates.len().div_ceil(threads.max(1));
    thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|candidate| evaluator.get_fitness(candidate))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
