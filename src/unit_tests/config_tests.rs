use crate::alloc::{
    group_options, BaseFitnessEvaluator, FitnessEvaluator, FlexibleGroup, SplitBound, StandardFitnessEvaluator,
};
use crate::config::Problem;
use crate::error::EvalError;
use crate::sched::ListScheduler;
use crate::workload::{LoopDim, Node, NodeKey, NodeTag, Operand};

const TWO_EXIT_DUAL_CORE: &str = include_str!("../../configs/two_exit_dual_core.toml");

fn evaluator(problem: Problem) -> StandardFitnessEvaluator<ListScheduler> {
    let Problem {
        search,
        stages,
        workload,
        accelerator,
        lut,
        ..
    } = problem;
    let base = BaseFitnessEvaluator::new(workload, accelerator, lut);
    StandardFitnessEvaluator::new(
        base,
        search.flexible_groups,
        search.prefetch,
        search.scheduling_order,
        ListScheduler::new(),
    )
    .expect("evaluator")
    .with_candidate_cores(search.cores, search.split_bound)
    .with_stages(&stages)
    .expect("valid stages")
}

#[test]
fn sample_problem_loads() {
    let problem = Problem::from_toml(TWO_EXIT_DUAL_CORE).expect("valid problem");
    assert_eq!(8, problem.run.samples);
    assert_eq!(42, problem.run.seed);
    assert_eq!(2, problem.run.threads);
    assert!(problem.run.detailed);

    assert_eq!(5, problem.workload.len());
    assert_eq!(4, problem.workload.edges().len());
    assert_eq!(5, problem.lut.len());
    assert_eq!(2, problem.stages.len());
    assert_eq!(Some(2), problem.accelerator.offchip_core_id());

    let flexible: Vec<_> = (0..5).map(|id| FlexibleGroup::new(id, 0)).collect();
    assert_eq!(flexible, problem.search.flexible_groups);
    assert_eq!(vec![Operand::Weight], problem.search.prefetch);
    assert_eq!(SplitBound::CandidateCores, problem.search.split_bound);
}

#[test]
fn unset_search_fields_fall_back_to_the_problem() {
    let problem = Problem::from_toml(TWO_EXIT_DUAL_CORE).expect("valid problem");
    // the off-chip core never runs computation
    assert_eq!(vec![0, 1], problem.search.cores);
    assert_eq!(problem.workload.keys(), problem.search.scheduling_order);
    assert_eq!(None, problem.search.candidate);
}

#[test]
fn tags_come_from_names_or_explicit_entries() {
    let problem = Problem::from_toml(TWO_EXIT_DUAL_CORE).expect("valid problem");
    let tags: Vec<_> = problem.workload.nodes().iter().map(|node| node.tag).collect();
    assert_eq!(
        vec![
            NodeTag::Stem,
            NodeTag::Block(0),
            NodeTag::Exit(0),
            NodeTag::Block(1),
            NodeTag::Exit(1)
        ],
        tags
    );
}

#[test]
fn memory_operand_aliases_resolve() {
    let problem = Problem::from_toml(TWO_EXIT_DUAL_CORE).expect("valid problem");
    let core = problem.accelerator.get_core(1).expect("core 1");
    assert_eq!(Operand::ALL.to_vec(), core.memory[0].operands);
    assert_eq!("Core 0", problem.accelerator.get_core(0).expect("core 0").name);
    assert_eq!(Some("dram"), problem.accelerator.offchip_instance().map(|level| level.name.as_str()));
}

#[test]
fn sample_problem_evaluates() {
    let evaluator = evaluator(Problem::from_toml(TWO_EXIT_DUAL_CORE).expect("valid problem"));

    let detailed = evaluator.get_fitness_detailed(&[0, 0, 0, 0, 0]).expect("feasible");
    assert_eq!(1_294_600.0, detailed.fitness.energy);
    assert_eq!(29_410.0, detailed.fitness.latency);
    let stages = detailed.stages.expect("stages configured");
    assert_eq!(2, stages.len());
    assert_eq!(1.0, stages[1].cum_latency_fraction);

    // the last exit was only characterized on core 0
    assert!(matches!(
        evaluator.get_fitness(&[0, 0, 0, 0, 1]),
        Err(EvalError::MissingRecord { core: 1, .. })
    ));
    let table = evaluator.feasibility_table().expect("table");
    let options = group_options(&table, evaluator.workload(), evaluator.groups()).expect("options");
    assert_eq!(vec![vec![0, 1], vec![0, 1], vec![0, 1], vec![0, 1], vec![0]], options);
}

#[test]
fn missing_sections_take_defaults() {
    let problem = Problem::from_toml("").expect("empty problem");
    assert_eq!(16, problem.run.samples);
    assert_eq!(4, problem.run.threads);
    assert!(problem.workload.is_empty());
    assert!(problem.stages.is_empty());
    assert!(problem.search.cores.is_empty());
    assert!(problem.lut.is_empty());
}

#[test]
fn invalid_sections_are_named() {
    let err = Problem::from_toml("[search]\nsplit_bound = \"sometimes\"\n")
        .err()
        .expect("unknown split bound");
    assert!(format!("{err:#}").contains("invalid [search] section"));

    let err = Problem::from_toml("[[workload.edges]]\nsrc = { id = 0 }\ndst = { id = 1 }\n")
        .err()
        .expect("edge between unknown nodes");
    assert!(matches!(
        err.downcast_ref::<EvalError>(),
        Some(EvalError::UnknownNode(key)) if *key == NodeKey::new(0, 0)
    ));
}

#[test]
fn operand_and_loop_names_parse() {
    assert_eq!(Ok(Operand::Input), "I1".parse::<Operand>());
    assert_eq!(Ok(Operand::Weight), "I2".parse::<Operand>());
    assert_eq!(Ok(Operand::Output), "O".parse::<Operand>());
    assert!("X".parse::<Operand>().is_err());

    assert_eq!(Ok(LoopDim::OX), "OX".parse::<LoopDim>());
    assert!("ox".parse::<LoopDim>().is_err());
    assert_eq!("FY", LoopDim::FY.to_string());
}

#[test]
fn node_entries_deserialize() {
    let node: Node = toml::from_str(
        r#"
        id = 7
        sub_id = 2
        op_type = "conv"
        tag = { kind = "block", index = 3 }
        loop_sizes = { K = 8, G = 2 }
        precision = { W = 4 }
        operand_size = { W = 100 }
        "#,
    )
    .expect("valid node");
    assert_eq!(NodeKey::new(7, 2), node.key());
    assert_eq!(NodeTag::Block(3), node.tag);
    assert_eq!(Some(&2), node.loop_sizes.get(&LoopDim::G));
    assert_eq!(400, node.operand_bits(Operand::Weight));
    assert_eq!(None, node.eval.core);

    let stem: Node = toml::from_str("id = 0\nop_type = \"conv\"\ntag = { kind = \"stem\" }\n").expect("unit tag");
    assert_eq!(NodeTag::Stem, stem.tag);
}
