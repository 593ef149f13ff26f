//! # Benchmark Engine Module
//!
//! Drives one rank through a complete sweep:
//!
//! 1. **Preconditions**: the mode's process count is checked before any
//!    message is exchanged
//! 2. **Environment**: processor names and start-up times are gathered at
//!    the coordinator, which prints the run header
//! 3. **Sweep**: for every message size, run the configured number of trials,
//!    then either reduce locally and gather the statistics, or gather the raw
//!    samples for the time-evolution output
//!
//! Every rank executes the same sequence of collectives, so the sweep stays
//! in lockstep without any extra coordination. Errors are returned, never
//! acted on; `terminate` turns them into the right kind of exit.

use crate::aggregate::{gather_environment, gather_evolution, gather_summary};
use crate::cli::Settings;
use crate::error::{FailureAction, RingError, RingResult};
use crate::metrics::SampleSet;
use crate::modes::{run_trial, TrialEnv, TrialParams};
use crate::results::ResultsManager;
use crate::ring::RankContext;
use crate::substrate::{Substrate, COORDINATOR};
use crate::timing::{Clock, Elapsed, MonotonicClock};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, error, info};

/// Runs the sweep on a single rank
pub struct BenchmarkRunner {
    settings: Settings,
    clock: Box<dyn Clock>,
}

impl BenchmarkRunner {
    /// Create a runner timed by the monotonic clock
    pub fn new(settings: Settings) -> Self {
        Self::with_clock(settings, Box::new(MonotonicClock))
    }

    pub fn with_clock(settings: Settings, clock: Box<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the whole sweep on this rank.
    ///
    /// `init` is how long the substrate took to start on this rank. Only the
    /// coordinator passes a `ResultsManager`; it receives the header and one
    /// record per message size.
    pub fn run(
        &self,
        comm: &mut dyn Substrate,
        init: Elapsed,
        mut results: Option<&mut ResultsManager>,
    ) -> Result<()> {
        let ctx = RankContext::of(comm);
        self.settings.mode.check_processes(&ctx)?;

        if ctx.rank == COORDINATOR {
            info!(
                "Running {} on {} processes, {} trials per size",
                self.settings.mode, ctx.size, self.settings.trials
            );
        }

        if let Some(env) = gather_environment(comm, init, COORDINATOR)? {
            if let Some(results) = results.as_deref_mut() {
                results.write_header(env)?;
            }
        }

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        for message_size in self.settings.sizes() {
            let samples = self.run_size(comm, message_size, &mut rng)?;

            if self.settings.time_evolution {
                let table = gather_evolution(comm, message_size, &samples, COORDINATOR)?;
                if let (Some(table), Some(results)) = (table, results.as_deref_mut()) {
                    results.record_evolution(table)?;
                }
            } else {
                let stats = samples.reduce();
                let summary = gather_summary(comm, message_size, &stats, COORDINATOR)?;
                if let (Some(summary), Some(results)) = (summary, results.as_deref_mut()) {
                    results.record_summary(summary)?;
                }
            }
        }

        if let Some(results) = results {
            results.finalize()?;
        }
        Ok(())
    }

    /// Run every trial at one message size
    pub fn run_size(
        &self,
        comm: &mut dyn Substrate,
        message_size: usize,
        rng: &mut dyn RngCore,
    ) -> RingResult<SampleSet> {
        let rank = comm.rank();
        let mut samples = SampleSet::with_capacity(self.settings.trials);
        let mut env = TrialEnv {
            comm,
            clock: &*self.clock,
            rng,
        };

        for trial in 0..self.settings.trials {
            let params = TrialParams {
                message_size,
                tag: self.settings.tag_for(trial),
                wait: self.settings.wait,
            };
            let sample = run_trial(self.settings.mode, &mut env, &params)?;
            samples.record(&sample);
        }

        debug!(
            "Rank {} finished {} trials at size {}",
            rank, self.settings.trials, message_size
        );
        Ok(samples)
    }
}

/// How a failed run must end
pub fn failure_action(err: &anyhow::Error) -> FailureAction {
    err.downcast_ref::<RingError>()
        .map(RingError::failure_action)
        .unwrap_or(FailureAction::ExitProcess)
}

/// Report `err` for this rank and terminate accordingly
pub fn terminate(comm: &dyn Substrate, err: &anyhow::Error) -> ! {
    error!("Rank {}: {:#}", comm.rank(), err);
    crate::logging::shutdown();
    match failure_action(err) {
        FailureAction::AbortJob => comm.abort(1),
        FailureAction::ExitProcess => std::process::exit(1),
    }
}
