use std::fs;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::alloc::{
    evaluate_parallel, group_options, random_candidate, BaseFitnessEvaluator, FitnessEvaluator, FlexibleGroup,
    StandardFitnessEvaluator,
};
use crate::error::EvalError;
use crate::hardware::CoreId;
use crate::report::{RunSummary, StageLog};
use crate::sched::ListScheduler;
use crate::stages::{StageConfig, StageSpec};
use crate::unit_tests::fixtures::{accelerator, conv, record, tagged, uniform_lut};
use crate::workload::{NodeKey, NodeTag, Workload};

fn early_exit_workload() -> Workload {
    let nodes = vec![
        tagged(conv(0, 0, 16), NodeTag::Stem, 10),
        tagged(conv(1, 0, 32), NodeTag::Block(0), 40),
        tagged(conv(2, 0, 8), NodeTag::Exit(0), 5),
        tagged(conv(3, 0, 64), NodeTag::Block(1), 40),
        tagged(conv(4, 0, 4), NodeTag::Exit(1), 5),
    ];
    let edges = [(0, 1), (1, 2), (1, 3), (3, 4)]
        .into_iter()
        .map(|(src, dst)| (NodeKey::new(src, 0), NodeKey::new(dst, 0)))
        .collect();
    Workload::new(nodes, edges).expect("valid workload")
}

fn stage_config() -> StageConfig {
    StageConfig {
        stages: vec![
            StageSpec {
                blocks: vec![0],
                exits: vec![0],
            },
            StageSpec {
                blocks: vec![1],
                exits: vec![1],
            },
        ],
    }
}

fn base() -> BaseFitnessEvaluator {
    let workload = early_exit_workload();
    let lut = uniform_lut(
        workload.nodes(),
        &[(0, record(100.0, 10.0, 16, 1)), (1, record(50.0, 20.0, 16, 1))],
    );
    BaseFitnessEvaluator::new(workload, accelerator(2), lut)
}

fn evaluator() -> StandardFitnessEvaluator<ListScheduler> {
    let base = base();
    let groups = (0..5).map(|id| FlexibleGroup::new(id, 0)).collect();
    let order = base.workload.keys();
    StandardFitnessEvaluator::new(base, groups, Vec::new(), order, ListScheduler::new())
        .expect("evaluator")
        .with_stages(&stage_config())
        .expect("valid stages")
}

fn all_candidates(groups: usize, cores: &[CoreId]) -> Vec<Vec<CoreId>> {
    let mut candidates = vec![Vec::new()];
    for _ in 0..groups {
        candidates = candidates
            .into_iter()
            .flat_map(|prefix| {
                cores.iter().map(move |&core| {
                    let mut next = prefix.clone();
                    next.push(core);
                    next
                })
            })
            .collect();
    }
    candidates
}

#[test]
fn base_evaluator_is_only_an_interface() {
    let base = base();
    assert!(matches!(base.get_fitness(&[0, 0, 0, 0, 0]), Err(EvalError::NotImplemented(_))));
    assert!(matches!(
        base.get_fitness_detailed(&[0, 0, 0, 0, 0]),
        Err(EvalError::NotImplemented(_))
    ));
    assert_eq!([-1.0, -1.0], base.weights());
    assert_eq!(["energy", "latency"], base.metrics());
}

#[test]
fn fitness_is_total_energy_and_latency() {
    let evaluator = evaluator();
    let on_first = evaluator.get_fitness(&[0, 0, 0, 0, 0]).expect("fitness");
    assert_eq!(50.0, on_first.energy);
    assert_eq!(500.0, on_first.latency);

    let on_second = evaluator.get_fitness(&[1, 1, 1, 1, 1]).expect("fitness");
    assert_eq!(100.0, on_second.energy);
    assert_eq!(250.0, on_second.latency);
    assert_eq!(25_000.0, on_second.edp());
}

#[test]
fn evaluation_leaves_the_shared_workload_untouched() {
    let evaluator = evaluator();
    evaluator.get_fitness(&[1, 0, 1, 0, 1]).expect("fitness");
    assert!(evaluator.workload().nodes().iter().all(|node| node.eval.core.is_none()));

    let allocated = evaluator.allocated_workload(&[1, 0, 1, 0, 1]).expect("allocated");
    let cores: Vec<_> = allocated.nodes().iter().map(|node| node.eval.core).collect();
    assert_eq!(vec![Some(1), Some(0), Some(1), Some(0), Some(1)], cores);
}

#[test]
fn evaluation_is_deterministic() {
    let evaluator = evaluator();
    let first = evaluator.get_fitness(&[0, 1, 1, 0, 1]).expect("fitness");
    let second = evaluator.get_fitness(&[0, 1, 1, 0, 1]).expect("fitness");
    assert_eq!(first, second);
}

#[test]
fn parallel_evaluation_matches_sequential() {
    let evaluator = evaluator();
    let candidates = all_candidates(5, &[0, 1]);
    assert_eq!(32, candidates.len());

    let sequential: Vec<_> = candidates
        .iter()
        .map(|candidate| evaluator.get_fitness(candidate).expect("fitness"))
        .collect();
    let parallel: Vec<_> = evaluate_parallel(&evaluator, &candidates, 4)
        .into_iter()
        .map(|result| result.expect("fitness"))
        .collect();
    assert_eq!(sequential, parallel);
}

#[test]
fn wrong_candidate_length_is_reported() {
    let evaluator = evaluator();
    assert!(matches!(
        evaluator.get_fitness(&[0, 0]),
        Err(EvalError::CandidateLength { expected: 5, got: 2 })
    ));
}

#[test]
fn detailed_fitness_decomposes_stages() {
    let evaluator = evaluator();
    let detailed = evaluator.get_fitness_detailed(&[0, 0, 0, 0, 0]).expect("detailed");
    assert_eq!(50.0, detailed.fitness.energy);
    assert_eq!(500, detailed.schedule.total_latency);

    let stages = detailed.stages.expect("stages configured");
    assert_eq!(2, stages.len());
    // stem, block 0, exit 0 back to back on one core
    assert_eq!(300, stages[0].latency);
    assert_eq!(30.0, stages[0].energy);
    assert_eq!(0.0, stages[0].energy_overhead);
    assert_eq!(1.0, stages[1].cum_macs_fraction);
    assert_eq!(1.0, stages[1].cum_energy_fraction);
}

#[test]
fn detailed_fitness_without_stages_only_returns_the_schedule() {
    let base = base();
    let groups = (0..5).map(|id| FlexibleGroup::new(id, 0)).collect();
    let order = base.workload.keys();
    let evaluator = StandardFitnessEvaluator::new(base, groups, Vec::new(), order, ListScheduler::new())
        .expect("evaluator");
    let detailed = evaluator.get_fitness_detailed(&[1, 1, 1, 1, 1]).expect("detailed");
    assert!(detailed.stages.is_none());
    assert_eq!(5, detailed.schedule.nodes.len());
}

#[test]
fn stage_records_are_persisted() {
    let dir = std::env::temp_dir().join(format!("eenn_alloc_stage_log_{}", std::process::id()));
    let log = Arc::new(StageLog::create(&dir).expect("log dir"));
    let evaluator = evaluator().with_stage_log(Arc::clone(&log));

    evaluator.get_fitness_detailed(&[0, 1, 0, 1, 0]).expect("detailed");
    let text = fs::read_to_string(dir.join("stages.jsonl")).expect("stage log");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(2, lines.len());
    assert_eq!(1, lines[0]["stage_id"]);
    assert_eq!(serde_json::json!([0, 1, 0, 1, 0]), lines[1]["candidate"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn stage_log_write_failures_are_reported() {
    let dir = std::env::temp_dir().join(format!("eenn_alloc_summary_{}", std::process::id()));
    let log = StageLog::create(&dir).expect("log dir");
    let summary = RunSummary {
        candidate: vec![0, 1],
        total_energy: 2.0,
        total_latency: 8,
        stages: Vec::new(),
    };
    log.write_summary(&summary).expect("summary written");
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).expect("summary")).expect("json");
    assert_eq!(8, written["total_latency"]);

    fs::remove_dir_all(&dir).expect("cleanup");
    assert!(log.write_summary(&summary).is_err());
}

#[test]
fn feasibility_table_is_built_once() {
    let evaluator = evaluator();
    let first = evaluator.feasibility_table().expect("table");
    let second = evaluator.feasibility_table().expect("table");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(5 * 2 * 2, first.len());
}

#[test]
fn random_candidates_from_group_options_evaluate() {
    let evaluator = evaluator();
    let table = evaluator.feasibility_table().expect("table");
    let options = group_options(&table, evaluator.workload(), evaluator.groups()).expect("options");
    assert!(options.iter().all(|cores| cores == &vec![0, 1]));

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let candidate = random_candidate(&mut rng, &options).expect("every group has a core");
        assert_eq!(5, candidate.len());
        evaluator.get_fitness(&candidate).expect("feasible candidate evaluates");
    }
}

#[test]
fn groups_without_feasible_core_yield_no_candidate() {
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(None, random_candidate(&mut rng, &[vec![0], Vec::new()]));
    assert_eq!(Some(vec![3]), random_candidate(&mut rng, &[vec![3]]));
}
