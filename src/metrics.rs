//! # Sample Collection and Local Reduction
//!
//! Each trial yields up to three timing samples: how long the send call took,
//! how long the receive call took and, in the probing mode, how long the probe
//! took. A `SampleSet` accumulates them for every trial at one message size;
//! `SampleSet::reduce` sorts each channel and condenses it into five summary
//! statistics, giving one `StatVector` per rank per message size.

use crate::timing::Elapsed;
use serde::{Deserialize, Serialize};

/// Number of timing channels per trial
pub const CHANNELS: usize = 3;

/// Statistics computed per channel
pub const STATS_PER_CHANNEL: usize = 5;

/// Length of a flattened `StatVector`
pub const STAT_VECTOR_LEN: usize = CHANNELS * STATS_PER_CHANNEL;

/// Timing channels in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Send,
    Receive,
    Probe,
}

impl Channel {
    pub const ALL: [Channel; CHANNELS] = [Channel::Send, Channel::Receive, Channel::Probe];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Send => "send",
            Channel::Receive => "recv",
            Channel::Probe => "probe",
        }
    }
}

/// Durations measured during a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialSample {
    pub send: Elapsed,
    pub recv: Elapsed,
    pub probe: Elapsed,
}

/// Per-trial samples of one rank at one message size, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub send: Vec<f64>,
    pub recv: Vec<f64>,
    pub probe: Vec<f64>,
}

impl SampleSet {
    pub fn with_capacity(trials: usize) -> Self {
        Self {
            send: Vec::with_capacity(trials),
            recv: Vec::with_capacity(trials),
            probe: Vec::with_capacity(trials),
        }
    }

    /// Append the samples of one trial
    pub fn record(&mut self, sample: &TrialSample) {
        self.send.push(sample.send.as_secs_f64());
        self.recv.push(sample.recv.as_secs_f64());
        self.probe.push(sample.probe.as_secs_f64());
    }

    pub fn len(&self) -> usize {
        self.send.len()
    }

    pub fn is_empty(&self) -> bool {
        self.send.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Send => &self.send,
            Channel::Receive => &self.recv,
            Channel::Probe => &self.probe,
        }
    }

    /// Channels concatenated as `send ++ recv ++ probe`, the layout used by
    /// the time-evolution gather
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.len() * CHANNELS);
        flat.extend_from_slice(&self.send);
        flat.extend_from_slice(&self.recv);
        flat.extend_from_slice(&self.probe);
        flat
    }

    /// Sort every channel and summarize it
    pub fn reduce(mut self) -> StatVector {
        StatVector {
            send: ChannelStats::from_samples(&mut self.send),
            recv: ChannelStats::from_samples(&mut self.recv),
            probe: ChannelStats::from_samples(&mut self.probe),
        }
    }
}

/// Summary statistics of one timing channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub median: f64,
    /// Population variance
    pub variance: f64,
}

impl ChannelStats {
    /// Sorts `samples` in place and summarizes them.
    ///
    /// An empty channel summarizes to all zeros.
    pub fn from_samples(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_by(|a, b| a.total_cmp(b));

        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            samples[n / 2]
        } else {
            (samples[n / 2 - 1] + samples[n / 2]) / 2.0
        };
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            max: samples[n - 1],
            min: samples[0],
            mean,
            median,
            variance,
        }
    }

    pub fn to_array(&self) -> [f64; STATS_PER_CHANNEL] {
        [self.max, self.min, self.mean, self.median, self.variance]
    }

    fn from_slice(values: &[f64]) -> Self {
        Self {
            max: values[0],
            min: values[1],
            mean: values[2],
            median: values[3],
            variance: values[4],
        }
    }
}

/// Statistics of all three channels for one rank at one message size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatVector {
    pub send: ChannelStats,
    pub recv: ChannelStats,
    pub probe: ChannelStats,
}

impl StatVector {
    pub fn channel(&self, channel: Channel) -> &ChannelStats {
        match channel {
            Channel::Send => &self.send,
            Channel::Receive => &self.recv,
            Channel::Probe => &self.probe,
        }
    }

    /// Flat wire layout: send, recv, probe; each max, min, mean, median, variance
    pub fn to_flat(&self) -> [f64; STAT_VECTOR_LEN] {
        let mut flat = [0.0; STAT_VECTOR_LEN];
        for (i, channel) in Channel::ALL.iter().enumerate() {
            flat[i * STATS_PER_CHANNEL..(i + 1) * STATS_PER_CHANNEL]
                .copy_from_slice(&self.channel(*channel).to_array());
        }
        flat
    }

    /// Inverse of `to_flat`; `None` unless exactly `STAT_VECTOR_LEN` values
    pub fn from_flat(values: &[f64]) -> Option<Self> {
        if values.len() != STAT_VECTOR_LEN {
            return None;
        }
        let mut chunks = values.chunks_exact(STATS_PER_CHANNEL).map(ChannelStats::from_slice);
        Some(Self {
            send: chunks.next()?,
            recv: chunks.next()?,
            probe: chunks.next()?,
        })
    }
}
