//! # Cross-Process Aggregation
//!
//! Once per message size every rank hands its results to the coordinator via
//! a fixed-size gather. Two shapes exist:
//!
//! - **Summary**: each rank sends its 15-value `StatVector`; the coordinator
//!   computes the max, min and mean of every statistic column across ranks
//!   and finds the rank with the largest mean on each channel.
//! - **Time evolution**: each rank sends its raw per-trial samples; the
//!   coordinator regroups them by trial index, keeping rank order.
//!
//! The pure combination steps (`summarize`, `interleave`) are separate from
//! the gathers so they can be tested without a substrate.

use crate::error::{RingError, RingResult};
use crate::metrics::{Channel, ChannelStats, SampleSet, StatVector, CHANNELS, STAT_VECTOR_LEN};
use crate::substrate::{Substrate, SubstrateError, MAX_PROCESSOR_NAME};
use crate::timing::Elapsed;
use serde::{Deserialize, Serialize};

/// Max, min and mean of one statistic column across ranks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spread {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for value in values {
            count += 1;
            sum += value;
            max = max.max(value);
            min = min.min(value);
        }

        if count == 0 {
            return Self::default();
        }
        Self {
            max,
            min,
            mean: sum / count as f64,
        }
    }
}

/// Cross-rank view of one timing channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub max: Spread,
    pub min: Spread,
    pub mean: Spread,
    pub median: Spread,
    pub variance: Spread,
    /// Rank with the largest mean on this channel
    pub slowest_rank: usize,
}

impl ChannelSummary {
    fn from_ranks(stats: &[ChannelStats]) -> Self {
        let column = |pick: fn(&ChannelStats) -> f64| Spread::of(stats.iter().map(pick));

        // First rank wins a tie
        let slowest_rank = stats
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, best_mean), (rank, s)| {
                if s.mean > best_mean {
                    (rank, s.mean)
                } else {
                    (best, best_mean)
                }
            })
            .0;

        Self {
            max: column(|s| s.max),
            min: column(|s| s.min),
            mean: column(|s| s.mean),
            median: column(|s| s.median),
            variance: column(|s| s.variance),
            slowest_rank,
        }
    }

    /// The five headline figures: max of maxes, min of mins, mean of means,
    /// mean of medians, mean of variances
    pub fn headline(&self) -> [f64; 5] {
        [
            self.max.max,
            self.min.min,
            self.mean.mean,
            self.median.mean,
            self.variance.mean,
        ]
    }
}

/// Coordinator's combination of every rank's statistics at one size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub message_size: usize,
    pub processes: usize,
    pub send: ChannelSummary,
    pub recv: ChannelSummary,
    pub probe: ChannelSummary,
}

impl GlobalSummary {
    pub fn channel(&self, channel: Channel) -> &ChannelSummary {
        match channel {
            Channel::Send => &self.send,
            Channel::Receive => &self.recv,
            Channel::Probe => &self.probe,
        }
    }

    /// Slowest rank per channel: send, recv, probe
    pub fn slowest_ranks(&self) -> [usize; CHANNELS] {
        [
            self.send.slowest_rank,
            self.recv.slowest_rank,
            self.probe.slowest_rank,
        ]
    }
}

/// Combine per-rank statistics, ordered by rank
pub fn summarize(message_size: usize, stats: &[StatVector]) -> GlobalSummary {
    let per_channel = |channel: Channel| {
        let column: Vec<ChannelStats> = stats.iter().map(|s| *s.channel(channel)).collect();
        ChannelSummary::from_ranks(&column)
    };

    GlobalSummary {
        message_size,
        processes: stats.len(),
        send: per_channel(Channel::Send),
        recv: per_channel(Channel::Receive),
        probe: per_channel(Channel::Probe),
    }
}

fn substrate_error(comm: &dyn Substrate) -> impl Fn(SubstrateError) -> RingError {
    let rank = comm.rank();
    move |source| RingError::Substrate { rank, source }
}

/// Gather every rank's statistics and summarize them at `root`
pub fn gather_summary(
    comm: &mut dyn Substrate,
    message_size: usize,
    local: &StatVector,
    root: usize,
) -> RingResult<Option<GlobalSummary>> {
    let on_error = substrate_error(comm);
    let gathered = comm.gather_f64(&local.to_flat(), root).map_err(&on_error)?;

    let Some(flat) = gathered else {
        return Ok(None);
    };
    let stats = flat
        .chunks_exact(STAT_VECTOR_LEN)
        .map(|chunk| StatVector::from_flat(chunk).unwrap_or_default())
        .collect::<Vec<_>>();
    Ok(Some(summarize(message_size, &stats)))
}

/// Raw samples regrouped by trial index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionTable {
    pub message_size: usize,
    /// `rows[trial][rank]` = `[send, recv, probe]`
    pub rows: Vec<Vec<[f64; CHANNELS]>>,
}

impl EvolutionTable {
    pub fn trials(&self) -> usize {
        self.rows.len()
    }
}

/// Regroup gathered samples by trial.
///
/// `flat` holds, for each rank in order, `send ++ recv ++ probe` with
/// `trials` values each.
pub fn interleave(message_size: usize, flat: &[f64], trials: usize) -> EvolutionTable {
    let per_rank = trials * CHANNELS;
    let ranks = if per_rank == 0 { 0 } else { flat.len() / per_rank };

    let rows = (0..trials)
        .map(|trial| {
            (0..ranks)
                .map(|rank| {
                    let base = rank * per_rank;
                    [
                        flat[base + trial],
                        flat[base + trials + trial],
                        flat[base + 2 * trials + trial],
                    ]
                })
                .collect()
        })
        .collect();

    EvolutionTable { message_size, rows }
}

/// Gather every rank's raw samples and regroup them at `root`
pub fn gather_evolution(
    comm: &mut dyn Substrate,
    message_size: usize,
    samples: &SampleSet,
    root: usize,
) -> RingResult<Option<EvolutionTable>> {
    let on_error = substrate_error(comm);
    let gathered = comm.gather_f64(&samples.to_flat(), root).map_err(&on_error)?;
    Ok(gathered.map(|flat| interleave(message_size, &flat, samples.len())))
}

/// Where each rank runs and how long the substrate took to start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReport {
    pub library_version: String,
    pub processor_names: Vec<String>,
    /// Substrate start-up time per rank, in seconds
    pub init_seconds: Vec<f64>,
}

/// Encode a processor name as a fixed-width, zero-padded record
pub fn encode_name(name: &str) -> [u8; MAX_PROCESSOR_NAME] {
    let mut record = [0u8; MAX_PROCESSOR_NAME];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_PROCESSOR_NAME - 1);
    record[..len].copy_from_slice(&bytes[..len]);
    record
}

/// Split gathered name records back into strings
pub fn decode_names(records: &[u8]) -> Vec<String> {
    records
        .chunks(MAX_PROCESSOR_NAME)
        .map(|record| {
            let end = record.iter().position(|&b| b == 0).unwrap_or(record.len());
            String::from_utf8_lossy(&record[..end]).into_owned()
        })
        .collect()
}

/// Gather processor names and start-up times at `root`
pub fn gather_environment(
    comm: &mut dyn Substrate,
    init: Elapsed,
    root: usize,
) -> RingResult<Option<EnvironmentReport>> {
    let on_error = substrate_error(comm);
    let record = encode_name(&comm.processor_name());
    let names = comm.gather_bytes(&record, root).map_err(&on_error)?;
    let init_seconds = comm
        .gather_f64(&[init.as_secs_f64()], root)
        .map_err(&on_error)?;

    Ok(match (names, init_seconds) {
        (Some(names), Some(init_seconds)) => Some(EnvironmentReport {
            library_version: comm.library_version(),
            processor_names: decode_names(&names),
            init_seconds,
        }),
        _ => None,
    })
}
