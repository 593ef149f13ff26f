//! # Round-Trip Modes
//!
//! A trial threads one envelope around the ring and back to rank 0:
//!
//! ```text
//! rank 0 ──send──▶ rank 1 ──send──▶ ... ──send──▶ rank N-1 ──send──▶ rank 0
//! ```
//!
//! The modes share that shape and differ in what happens before the trial and
//! how the incoming message is taken:
//!
//! | Mode                  | Before the trial    | Receive              |
//! |-----------------------|---------------------|----------------------|
//! | `round_trip`          | nothing             | plain receive        |
//! | `round_trip_sync`     | full-ring barrier   | plain receive        |
//! | `round_trip_wait`     | fixed sleep         | plain receive        |
//! | `round_trip_msg_size` | nothing             | probe, check, receive|
//! | `send`                | nothing             | odd ranks only       |
//!
//! `send` is not a ring: even ranks send one hop to `rank + 1`, odd ranks
//! receive from `rank - 1`, and rank 0 never closes the loop.
//!
//! Each substrate call is timed on its own, never the trial as a whole.

use crate::error::{RingError, RingResult};
use crate::metrics::TrialSample;
use crate::ring::{check_message_size, Envelope, RankContext};
use crate::substrate::{Substrate, SubstrateError, MESSAGE_TAG};
use crate::timing::{Clock, Elapsed};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Available trial strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum RoundTripMode {
    /// Baseline ring round trip
    #[clap(name = "round_trip")]
    RoundTrip,

    /// Probe the incoming size before every receive and require it to match
    #[clap(name = "round_trip_msg_size")]
    RoundTripMsgSize,

    /// Sleep for the configured wait before every trial
    #[clap(name = "round_trip_wait")]
    RoundTripWait,

    /// Barrier across all ranks before every trial
    #[clap(name = "round_trip_sync")]
    RoundTripSync,

    /// One-hop send from even ranks to odd ranks
    #[clap(name = "send")]
    Send,
}

impl RoundTripMode {
    pub fn name(&self) -> &'static str {
        match self {
            RoundTripMode::RoundTrip => "round_trip",
            RoundTripMode::RoundTripMsgSize => "round_trip_msg_size",
            RoundTripMode::RoundTripWait => "round_trip_wait",
            RoundTripMode::RoundTripSync => "round_trip_sync",
            RoundTripMode::Send => "send",
        }
    }

    /// Fewest processes the mode can run with
    pub fn min_processes(&self) -> usize {
        match self {
            RoundTripMode::Send => 2,
            _ => 1,
        }
    }

    /// Whether the probe channel carries measurements
    pub fn probes(&self) -> bool {
        matches!(self, RoundTripMode::RoundTripMsgSize)
    }

    pub fn check_processes(&self, ctx: &RankContext) -> RingResult<()> {
        if ctx.size < self.min_processes() {
            return Err(RingError::NotEnoughProcesses {
                mode: self.name(),
                required: self.min_processes(),
                actual: ctx.size,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for RoundTripMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs of a single trial
#[derive(Debug, Clone, Copy)]
pub struct TrialParams {
    /// Envelope length in elements
    pub message_size: usize,
    pub tag: i32,
    /// Delay before the trial in `round_trip_wait`
    pub wait: Duration,
}

/// Everything a mode needs to run one trial on this rank
pub struct TrialEnv<'a> {
    pub comm: &'a mut dyn Substrate,
    pub clock: &'a dyn Clock,
    pub rng: &'a mut dyn RngCore,
}

/// Run one trial of `mode`
pub fn run_trial(
    mode: RoundTripMode,
    env: &mut TrialEnv<'_>,
    params: &TrialParams,
) -> RingResult<TrialSample> {
    match mode {
        RoundTripMode::RoundTrip => round_trip(env, params),
        RoundTripMode::RoundTripSync => round_trip_sync(env, params),
        RoundTripMode::RoundTripWait => round_trip_wait(env, params),
        RoundTripMode::RoundTripMsgSize => round_trip_msg_size(env, params),
        RoundTripMode::Send => send(env, params),
    }
}

/// Time a single substrate call
fn timed<T>(
    clock: &dyn Clock,
    rank: usize,
    call: impl FnOnce() -> Result<T, SubstrateError>,
) -> RingResult<(T, Elapsed)> {
    let start = clock.now()?;
    let value = call().map_err(|source| RingError::Substrate { rank, source })?;
    let end = clock.now()?;
    Ok((value, end.elapsed_since(start)))
}

/// Build the trial envelope; only originating ranks get to randomize it
fn envelope(env: &mut TrialEnv<'_>, params: &TrialParams, originates: bool) -> RingResult<Envelope> {
    let rng = if originates {
        Some(&mut *env.rng as &mut dyn RngCore)
    } else {
        None
    };
    Envelope::new(params.message_size, params.tag, rng)
}

pub fn round_trip(env: &mut TrialEnv<'_>, params: &TrialParams) -> RingResult<TrialSample> {
    check_message_size(params.message_size)?;
    let ctx = RankContext::of(&*env.comm);
    let mut data = envelope(env, params, ctx.is_initiator())?;
    let mut sample = TrialSample::default();

    if let Some(source) = ctx.predecessor() {
        let comm = &mut *env.comm;
        let buf = data.as_mut_slice();
        sample.recv = timed(env.clock, ctx.rank, || comm.recv(source, MESSAGE_TAG, buf))?.1;
    }

    let comm = &mut *env.comm;
    let buf = data.as_slice();
    sample.send = timed(env.clock, ctx.rank, || {
        comm.send(ctx.successor(), MESSAGE_TAG, buf)
    })?
    .1;

    if ctx.is_initiator() {
        let comm = &mut *env.comm;
        let buf = data.as_mut_slice();
        sample.recv = timed(env.clock, ctx.rank, || {
            comm.recv(ctx.closing_source(), MESSAGE_TAG, buf)
        })?
        .1;
    }

    Ok(sample)
}

pub fn round_trip_sync(env: &mut TrialEnv<'_>, params: &TrialParams) -> RingResult<TrialSample> {
    check_message_size(params.message_size)?;
    let rank = env.comm.rank();
    env.comm
        .barrier()
        .map_err(|source| RingError::BarrierFailed { rank, source })?;
    round_trip(env, params)
}

pub fn round_trip_wait(env: &mut TrialEnv<'_>, params: &TrialParams) -> RingResult<TrialSample> {
    check_message_size(params.message_size)?;
    if !params.wait.is_zero() {
        std::thread::sleep(params.wait);
    }
    round_trip(env, params)
}

/// Probe `source`, insist on the expected size, then receive
fn probed_recv(
    env: &mut TrialEnv<'_>,
    ctx: &RankContext,
    source: usize,
    data: &mut Envelope,
    sample: &mut TrialSample,
) -> RingResult<()> {
    let comm = &mut *env.comm;
    let (probed, probe_time) = timed(env.clock, ctx.rank, || comm.probe(source, MESSAGE_TAG))?;
    sample.probe = probe_time;

    if probed != data.len() {
        return Err(RingError::SizeMismatch {
            rank: ctx.rank,
            expected: data.len(),
            probed,
        });
    }

    let comm = &mut *env.comm;
    let buf = data.as_mut_slice();
    sample.recv = timed(env.clock, ctx.rank, || comm.recv(source, MESSAGE_TAG, buf))?.1;
    Ok(())
}

pub fn round_trip_msg_size(
    env: &mut TrialEnv<'_>,
    params: &TrialParams,
) -> RingResult<TrialSample> {
    check_message_size(params.message_size)?;
    let ctx = RankContext::of(&*env.comm);
    let mut data = envelope(env, params, ctx.is_initiator())?;
    let mut sample = TrialSample::default();

    if let Some(source) = ctx.predecessor() {
        probed_recv(env, &ctx, source, &mut data, &mut sample)?;
    }

    let comm = &mut *env.comm;
    let buf = data.as_slice();
    sample.send = timed(env.clock, ctx.rank, || {
        comm.send(ctx.successor(), MESSAGE_TAG, buf)
    })?
    .1;

    if ctx.is_initiator() {
        probed_recv(env, &ctx, ctx.closing_source(), &mut data, &mut sample)?;
    }

    Ok(sample)
}

pub fn send(env: &mut TrialEnv<'_>, params: &TrialParams) -> RingResult<TrialSample> {
    let ctx = RankContext::of(&*env.comm);
    RoundTripMode::Send.check_processes(&ctx)?;
    check_message_size(params.message_size)?;

    let sends = ctx.rank % 2 == 0;
    let mut data = envelope(env, params, sends)?;
    let mut sample = TrialSample::default();
    let comm = &mut *env.comm;

    if sends {
        let buf = data.as_slice();
        sample.send = timed(env.clock, ctx.rank, || {
            comm.send(ctx.successor(), MESSAGE_TAG, buf)
        })?
        .1;
    } else {
        let buf = data.as_mut_slice();
        sample.recv = timed(env.clock, ctx.rank, || {
            comm.recv(ctx.rank - 1, MESSAGE_TAG, buf)
        })?
        .1;
    }

    Ok(sample)
}
