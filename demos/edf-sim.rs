// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::clap::{
    Arg,
    ArgAction,
    ArgMatches,
    Command,
};
use ::std::{
    cmp::Ordering,
    time::Instant,
};
use ::tcpnsim::{
    run_batch,
    runtime::logging,
    specification::config::Config,
    BatchOutcome,
    CancellationToken,
    Fail,
    GlobalSpecification,
    Scheduler,
    SchedulingDecision,
    SimulationTrace,
    SystemTask,
    TaskId,
};

//======================================================================================================================
// Program Arguments
//======================================================================================================================

#[derive(Debug)]
pub struct ProgramArguments {
    configs: Vec<String>,
    workers: usize,
    quantum: Option<f64>,
}

impl ProgramArguments {
    const DEFAULT_CONFIG: &'static str = "demos/config/edf.yaml";
    const DEFAULT_WORKERS: usize = 1;

    pub fn new() -> Result<Self> {
        let matches: ArgMatches = Command::new("edf-sim")
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .action(ArgAction::Append)
                    .required(false)
                    .value_name("PATH")
                    .help("Adds a YAML problem description to the batch"),
            )
            .arg(
                Arg::new("workers")
                    .long("workers")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("COUNT")
                    .help("Sets the number of worker threads"),
            )
            .arg(
                Arg::new("quantum")
                    .long("quantum")
                    .value_parser(clap::value_parser!(f64))
                    .required(false)
                    .value_name("SECONDS")
                    .help("Sets the scheduling quantum (defaults to the time step)"),
            )
            .get_matches();

        let mut args: ProgramArguments = ProgramArguments {
            configs: vec![Self::DEFAULT_CONFIG.to_string()],
            workers: Self::DEFAULT_WORKERS,
            quantum: None,
        };

        if let Some(configs) = matches.get_many::<String>("config") {
            args.configs = configs.cloned().collect();
        }
        if let Some(workers) = matches.get_one::<usize>("workers") {
            args.set_workers(*workers)?;
        }
        if let Some(quantum) = matches.get_one::<f64>("quantum") {
            args.set_quantum(*quantum)?;
        }

        Ok(args)
    }

    pub fn get_configs(&self) -> &[String] {
        &self.configs
    }

    pub fn get_workers(&self) -> usize {
        self.workers
    }

    pub fn get_quantum(&self) -> Option<f64> {
        self.quantum
    }

    fn set_workers(&mut self, workers: usize) -> Result<()> {
        if workers == 0 {
            anyhow::bail!("at least one worker is needed");
        }
        self.workers = workers;
        Ok(())
    }

    fn set_quantum(&mut self, quantum: f64) -> Result<()> {
        if quantum <= 0.0 || !quantum.is_finite() {
            anyhow::bail!("quantum must be positive (quantum={:?})", quantum);
        }
        self.quantum = Some(quantum);
        Ok(())
    }
}

//======================================================================================================================
// Scheduler
//======================================================================================================================

/// Global earliest-deadline-first at full clock. Running jobs keep their core while they stay among the `m` most
/// urgent ones.
struct GlobalEdf {
    quantum: Option<f64>,
}

impl Scheduler for GlobalEdf {
    /// Number of cores.
    type State = usize;

    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        _periodic: &[SystemTask],
        _aperiodic: &[SystemTask],
    ) -> Result<(f64, usize), Fail> {
        Ok((self.quantum.unwrap_or(spec.simulation.dt), spec.cpu.number_of_cores()))
    }

    fn aperiodic_arrive(
        &self,
        _cores: &mut usize,
        _time: f64,
        _arrived: &[SystemTask],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<bool, Fail> {
        Ok(true)
    }

    fn schedule_policy(
        &self,
        cores: &mut usize,
        _time: f64,
        executable: &[SystemTask],
        active: &[Option<TaskId>],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        let mut queue: Vec<&SystemTask> = executable.iter().collect();
        queue.sort_by(|a: &&SystemTask, b: &&SystemTask| {
            let da: f64 = a.next_deadline.unwrap_or(f64::INFINITY);
            let db: f64 = b.next_deadline.unwrap_or(f64::INFINITY);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal).then(a.id.cmp(&b.id))
        });
        let urgent: Vec<TaskId> = queue.iter().take(*cores).map(|task: &&SystemTask| task.id).collect();

        let mut assignment: Vec<Option<TaskId>> = active
            .iter()
            .map(|slot: &Option<TaskId>| slot.filter(|id: &TaskId| urgent.contains(id)))
            .collect();
        assignment.resize(*cores, None);
        for id in urgent {
            if assignment.contains(&Some(id)) {
                continue;
            }
            if let Some(slot) = assignment.iter_mut().find(|slot: &&mut Option<TaskId>| slot.is_none()) {
                *slot = Some(id);
            }
        }
        Ok(SchedulingDecision::new(assignment))
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn report(path: &str, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Completed(trace) => {
            println!(
                "{}: {} tick(s), {} deadline miss(es)",
                path,
                trace.ticks(),
                trace.deadline_misses.len()
            );
            for miss in &trace.deadline_misses {
                println!("  task {} job {} missed its deadline at {} s", miss.task, miss.job, miss.deadline);
            }
            report_thermal(trace);
        },
        BatchOutcome::NotSchedulable(cause) => println!("{}: not schedulable ({})", path, cause),
        BatchOutcome::Failed(e) => println!("{}: failed ({:?})", path, e),
    }
}

fn report_thermal(trace: &SimulationTrace) {
    let peaks: &Vec<Vec<f64>> = match &trace.max_core_temperatures {
        Some(peaks) => peaks,
        None => return,
    };
    for (k, series) in peaks.iter().enumerate() {
        let peak: f64 = series.iter().cloned().fold(f64::MIN, f64::max);
        let energy: f64 = trace.total_energy(k).unwrap_or(0.0);
        println!("  core {}: peak {:.3} C, {:.3} J", k, peak, energy);
    }
}

fn main() -> Result<()> {
    logging::initialize();
    let args: ProgramArguments = ProgramArguments::new()?;

    let mut specs: Vec<GlobalSpecification> = Vec::with_capacity(args.get_configs().len());
    for path in args.get_configs() {
        let spec: GlobalSpecification = match Config::new(path).and_then(|config: Config| config.global_specification())
        {
            Ok(spec) => spec,
            Err(e) => anyhow::bail!("failed to read {}: {:?}", path, e),
        };
        specs.push(spec);
    }

    let start: Instant = Instant::now();
    let quantum: Option<f64> = args.get_quantum();
    let outcomes: Vec<BatchOutcome> = run_batch(
        &specs,
        args.get_workers(),
        |_| GlobalEdf { quantum },
        &CancellationToken::new(),
    );
    for (path, outcome) in args.get_configs().iter().zip(outcomes.iter()) {
        report(path, outcome);
    }
    println!("{} run(s) in {:?}", outcomes.len(), start.elapsed());

    if outcomes.iter().all(BatchOutcome::is_completed) {
        Ok(())
    } else {
        anyhow::bail!("some runs did not complete")
    }
}
