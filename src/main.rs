use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use eenn_alloc::alloc::{
    evaluate_parallel, group_options, random_candidate, BaseFitnessEvaluator, Fitness, FitnessEvaluator,
    StandardFitnessEvaluator,
};
use eenn_alloc::config::Problem;
use eenn_alloc::hardware::CoreId;
use eenn_alloc::report::{create_run_dir, RunSummary, StageLog};
use eenn_alloc::sched::ListScheduler;
use log::{info, warn, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(version, about)]
struct EennAllocArgs {
    #[arg(help = "Path to problem.toml")]
    problem_path: PathBuf,
    #[arg(long, value_delimiter = ',', help = "Evaluate this allocation (one core per flexible group)")]
    candidate: Option<Vec<CoreId>>,
    #[arg(long, help = "Override number of random candidates")]
    samples: Option<usize>,
    #[arg(long, help = "Override random seed")]
    seed: Option<u64>,
    #[arg(long, help = "Override number of evaluation threads")]
    threads: Option<usize>,
    #[arg(long, help = "Enable log at level (0:warn, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help = "Directory for per-stage logs")]
    stage_log_dir: Option<PathBuf>,
}

fn level_filter(level: u64) -> LevelFilter {
    match level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

pub fn main() -> anyhow::Result<()> {
    let argv = EennAllocArgs::parse();
    let text = fs::read_to_string(&argv.problem_path)
        .with_context(|| format!("failed to read {}", argv.problem_path.display()))?;
    let mut problem = Problem::from_toml(&text)?;

    // override toml configs with argv
    let run = &mut problem.run;
    run.log_level = argv.log.unwrap_or(run.log_level);
    run.samples = argv.samples.unwrap_or(run.samples);
    run.seed = argv.seed.unwrap_or(run.seed);
    run.threads = argv.threads.unwrap_or(run.threads);
    if argv.stage_log_dir.is_some() {
        run.stage_log_dir = argv.stage_log_dir.clone();
    }
    env_logger::Builder::new()
        .filter_level(level_filter(run.log_level))
        .parse_default_env()
        .init();

    let Problem {
        run,
        search,
        stages,
        workload,
        accelerator,
        lut,
    } = problem;
    let base = BaseFitnessEvaluator::new(workload, accelerator, lut);
    let mut evaluator = StandardFitnessEvaluator::new(
        base,
        search.flexible_groups.clone(),
        search.prefetch.clone(),
        search.scheduling_order.clone(),
        ListScheduler::new(),
    )?
    .with_candidate_cores(search.cores.clone(), search.split_bound)
    .with_stages(&stages)?;

    let stage_log = if run.detailed {
        match create_run_dir(run.stage_log_dir.as_deref()) {
            Some(dir) => Some(Arc::new(StageLog::create(&dir)?)),
            None => {
                warn!("cannot create stage log directory, stage records are not persisted");
                None
            }
        }
    } else {
        None
    };
    if let Some(log) = stage_log.as_ref() {
        evaluator = evaluator.with_stage_log(Arc::clone(log));
    }

    let candidate = match argv.candidate.or(search.candidate) {
        Some(candidate) => candidate,
        None => best_random_candidate(&evaluator, run.samples, run.seed, run.threads)?,
    };

    if !run.detailed {
        let fitness = evaluator.get_fitness(&candidate)?;
        println!("candidate {:?}: energy {:.6e}, latency {}", candidate, fitness.energy, fitness.latency);
        return Ok(());
    }

    let detailed = evaluator.get_fitness_detailed(&candidate)?;
    println!(
        "candidate {:?}: energy {:.6e}, latency {}",
        candidate, detailed.fitness.energy, detailed.fitness.latency
    );
    for stage in detailed.stages.iter().flatten() {
        println!(
            "  stage {}: latency {:>10} energy {:.4e} overhead {:.4e} cum latency {:.3} cum energy {:.3} cum macs {:.3}",
            stage.stage_id,
            stage.latency,
            stage.energy,
            stage.energy_overhead,
            stage.cum_latency_fraction,
            stage.cum_energy_fraction,
            stage.cum_macs_fraction,
        );
    }
    if let Some(log) = stage_log {
        log.write_summary(&RunSummary {
            candidate: candidate.clone(),
            total_energy: detailed.schedule.total_energy,
            total_latency: detailed.schedule.total_latency,
            stages: detailed.stages.unwrap_or_default(),
        })
        .with_context(|| format!("failed to write summary to {}", log.dir().display()))?;
        info!("stage log written to {}", log.dir().display());
    }
    Ok(())
}

fn best_random_candidate(
    evaluator: &StandardFitnessEvaluator<ListScheduler>,
    samples: usize,
    seed: u64,
    threads: usize,
) -> anyhow::Result<Vec<CoreId>> {
    let table = evaluator.feasibility_table()?;
    let options = group_options(&table, evaluator.workload(), evaluator.groups())?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut candidates = Vec::with_capacity(samples);
    for _ in 0..samples.max(1) {
        match random_candidate(&mut rng, &options) {
            Some(candidate) => candidates.push(candidate),
            None => bail!("some flexible group has no feasible core"),
        }
    }

    let results = evaluate_parallel(evaluator, &candidates, threads);
    let mut best: Option<(Vec<CoreId>, Fitness)> = None;
    for (candidate, result) in candidates.into_iter().zip(results) {
        let fitness = result?;
        info!("candidate {:?}: energy {:.4e}, latency {}", candidate, fitness.energy, fitness.latency);
        if best.as_ref().map_or(true, |(_, b)| fitness.edp() < b.edp()) {
            best = Some((candidate, fitness));
        }
    }
    match best {
        Some((candidate, _)) => Ok(candidate),
        None => bail!("no candidate evaluated"),
    }
}
