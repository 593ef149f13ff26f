//! # Ring Latency Benchmark - Main Entry Point
//!
//! 1. **Parse arguments** and install logging
//! 2. **Start the substrate**, timing how long it takes on every rank
//! 3. **Run the sweep** on every rank; the coordinator prints the results
//! 4. **Shut the substrate down**, each rank reporting how long that took
//!
//! A failing rank logs its diagnostic and then either exits or aborts the
//! whole job, depending on the kind of failure.

use anyhow::Result;
use clap::Parser;
use ring_latency::benchmark::{terminate, BenchmarkRunner};
use ring_latency::cli::{Args, Settings};
use ring_latency::logging;
use ring_latency::results::ResultsManager;
use ring_latency::substrate::{LocalUniverse, Substrate, SubstrateKind, COORDINATOR};
use ring_latency::timing::{Clock, Elapsed, MonotonicClock};
use ring_latency::utils::format_duration;
use tracing::{debug, info};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet, args.log_file.as_deref())?;

    let settings = Settings::from_args(&args)?;
    debug!("Configuration: {:?}", settings);

    let outcome = match settings.substrate {
        SubstrateKind::Local => run_local(settings),
        SubstrateKind::Mpi => run_mpi(settings),
    };
    logging::shutdown();
    outcome
}

/// Run one rank's sweep, terminating the job on failure
fn run_rank(runner: &BenchmarkRunner, comm: &mut dyn Substrate, init: Elapsed) {
    let mut results = (comm.rank() == COORDINATOR).then(|| ResultsManager::new(runner.settings()));
    if let Err(err) = runner.run(comm, init, results.as_mut()) {
        terminate(comm, &err);
    }
}

fn run_local(settings: Settings) -> Result<()> {
    let clock = MonotonicClock;
    let start = clock.now()?;
    let universe = LocalUniverse::new(settings.ranks)?;
    let init = clock.now()?.elapsed_since(start);
    info!(
        "Started {} local ranks in {}",
        universe.size(),
        format_duration(init.into())
    );

    let pin = settings.pin;
    let runner = BenchmarkRunner::new(settings);
    universe.launch(pin, |mut comm| {
        run_rank(&runner, &mut comm, init);

        let rank = comm.rank();
        let start = MonotonicClock.now()?;
        drop(comm);
        let finalize = MonotonicClock.now()?.elapsed_since(start);
        println!("# finalize[{}]: {}", rank, finalize);
        Ok(())
    })?;

    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(settings: Settings) -> Result<()> {
    use ring_latency::substrate::MpiComm;

    let clock = MonotonicClock;
    let start = clock.now()?;
    let mut comm = MpiComm::initialize()?;
    let init = clock.now()?.elapsed_since(start);

    let runner = BenchmarkRunner::new(settings);
    run_rank(&runner, &mut comm, init);

    let rank = comm.rank();
    let start = clock.now()?;
    comm.finalize();
    let finalize = clock.now()?.elapsed_since(start);
    println!("# finalize[{}]: {}", rank, finalize);
    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_settings: Settings) -> Result<()> {
    anyhow::bail!("The MPI substrate is not available in this build, rebuild with `--features mpi`")
}
