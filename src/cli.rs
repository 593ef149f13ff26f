use crate::modes::RoundTripMode;
use crate::ring::RANDOM_FILL_TAG;
use crate::sizes::{size_sequence, validate_exponent_range};
use crate::substrate::SubstrateKind;
use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ring Latency Benchmark - Measure message-passing latency around a ring of processes
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Trial strategy to run
    #[clap(value_enum, help_heading = "Core Options")]
    pub mode: RoundTripMode,

    /// Fill the payload with seeded random values at the originating rank
    #[clap(short = 'r', long, default_value_t = false, help_heading = "Core Options")]
    pub random_fill: bool,

    /// Seed for the random payload generator
    #[clap(short = 's', long, default_value_t = crate::defaults::SEED, help_heading = "Core Options")]
    pub seed: u64,

    /// Number of trials per message size
    #[clap(short = 't', long = "times", default_value_t = crate::defaults::TRIALS, help_heading = "Core Options")]
    pub times: usize,

    /// Milliseconds to sleep before every trial in round_trip_wait
    #[clap(short = 'w', long = "wait", default_value_t = crate::defaults::WAIT_MS, help_heading = "Core Options")]
    pub wait_ms: u64,

    /// Print every trial of every rank instead of the summary statistics
    #[clap(short = 'e', long, default_value_t = false, help_heading = "Core Options")]
    pub time_evolution: bool,

    /// Message-passing substrate to run on
    #[clap(long, value_enum, default_value_t = SubstrateKind::Local)]
    pub substrate: SubstrateKind,

    /// Number of ranks for the local substrate (defaults to the CPU core count)
    #[clap(short = 'n', long)]
    pub ranks: Option<usize>,

    /// Pin each local rank to its own core
    #[clap(long, default_value_t = false)]
    pub pin: bool,

    /// Exponent of the smallest message size (2^N elements)
    #[clap(long, default_value_t = crate::defaults::MIN_EXPONENT)]
    pub min_exponent: u32,

    /// Exponent of the largest message size (2^N elements)
    #[clap(long, default_value_t = crate::defaults::MAX_EXPONENT)]
    pub max_exponent: u32,

    /// Output file for results (JSON format)
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log errors
    #[clap(short = 'q', long, default_value_t = false, help_heading = "Logging")]
    pub quiet: bool,

    /// Also write logs to this file
    #[clap(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,
}

/// Validated run configuration, shared by every rank
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub mode: RoundTripMode,
    pub random_fill: bool,
    pub seed: u64,
    pub trials: usize,
    pub wait: Duration,
    pub time_evolution: bool,
    pub substrate: SubstrateKind,
    pub ranks: usize,
    pub pin: bool,
    pub min_exponent: u32,
    pub max_exponent: u32,
    pub output_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: RoundTripMode::RoundTrip,
            random_fill: false,
            seed: crate::defaults::SEED,
            trials: crate::defaults::TRIALS,
            wait: Duration::from_millis(crate::defaults::WAIT_MS),
            time_evolution: false,
            substrate: SubstrateKind::Local,
            ranks: crate::utils::get_cpu_cores(),
            pin: false,
            min_exponent: crate::defaults::MIN_EXPONENT,
            max_exponent: crate::defaults::MAX_EXPONENT,
            output_file: None,
        }
    }
}

impl Settings {
    /// Build settings from parsed arguments, rejecting unusable values
    pub fn from_args(args: &Args) -> Result<Self> {
        let settings = Self {
            mode: args.mode,
            random_fill: args.random_fill,
            seed: args.seed,
            trials: args.times,
            wait: Duration::from_millis(args.wait_ms),
            time_evolution: args.time_evolution,
            substrate: args.substrate,
            ranks: args.ranks.unwrap_or_else(crate::utils::get_cpu_cores),
            pin: args.pin,
            min_exponent: args.min_exponent,
            max_exponent: args.max_exponent,
            output_file: args.output_file.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            bail!("Number of trials must be at least 1");
        }
        if self.ranks == 0 {
            bail!("Number of ranks must be at least 1");
        }
        validate_exponent_range(self.min_exponent, self.max_exponent)
    }

    /// Tag carried by trial `trial`: the random-fill marker, or the trial index
    pub fn tag_for(&self, trial: usize) -> i32 {
        if self.random_fill {
            RANDOM_FILL_TAG
        } else {
            i32::try_from(trial).unwrap_or(i32::MAX)
        }
    }

    /// Message sizes of the sweep, in elements
    pub fn sizes(&self) -> Vec<usize> {
        size_sequence(self.min_exponent, self.max_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Settings> {
        let args = Args::try_parse_from(argv)?;
        Settings::from_args(&args)
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&["ring-latency", "round_trip"]).unwrap();
        assert_eq!(settings.mode, RoundTripMode::RoundTrip);
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.trials, 10);
        assert_eq!(settings.wait, Duration::ZERO);
        assert!(!settings.random_fill);
        assert!(!settings.time_evolution);
        assert_eq!(settings.substrate, SubstrateKind::Local);
        assert!(settings.ranks >= 1);
        assert_eq!(settings.sizes().len(), 21);
    }

    #[test]
    fn test_short_flags() {
        let settings = parse(&[
            "ring-latency",
            "-r",
            "-s",
            "7",
            "-t",
            "3",
            "-w",
            "250",
            "-e",
            "-n",
            "4",
            "round_trip_wait",
        ])
        .unwrap();
        assert_eq!(settings.mode, RoundTripMode::RoundTripWait);
        assert!(settings.random_fill);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.trials, 3);
        assert_eq!(settings.wait, Duration::from_millis(250));
        assert!(settings.time_evolution);
        assert_eq!(settings.ranks, 4);
    }

    /// Unknown modes and flags are rejected by the parser
    #[test]
    fn test_rejects_unknown_input() {
        assert!(Args::try_parse_from(["ring-latency", "ping_pong"]).is_err());
        assert!(Args::try_parse_from(["ring-latency", "-x", "send"]).is_err());
        assert!(Args::try_parse_from(["ring-latency"]).is_err());
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        assert!(parse(&["ring-latency", "-t", "0", "send"]).is_err());
        assert!(parse(&["ring-latency", "-n", "0", "send"]).is_err());
        assert!(parse(&["ring-latency", "--min-exponent", "1", "send"]).is_err());
        assert!(parse(&["ring-latency", "--max-exponent", "30", "send"]).is_err());
        assert!(parse(&[
            "ring-latency",
            "--min-exponent",
            "8",
            "--max-exponent",
            "6",
            "send"
        ])
        .is_err());
    }

    /// Random fill replaces every trial tag with the reserved marker
    #[test]
    fn test_tag_rule() {
        let plain = Settings::default();
        assert_eq!(plain.tag_for(0), 0);
        assert_eq!(plain.tag_for(9), 9);

        let random = Settings {
            random_fill: true,
            ..Settings::default()
        };
        assert_eq!(random.tag_for(0), RANDOM_FILL_TAG);
        assert_eq!(random.tag_for(9), RANDOM_FILL_TAG);
    }

    #[test]
    fn test_mode_names_parse() {
        for (name, mode) in [
            ("round_trip", RoundTripMode::RoundTrip),
            ("round_trip_msg_size", RoundTripMode::RoundTripMsgSize),
            ("round_trip_wait", RoundTripMode::RoundTripWait),
            ("round_trip_sync", RoundTripMode::RoundTripSync),
            ("send", RoundTripMode::Send),
        ] {
            assert_eq!(parse(&["ring-latency", name]).unwrap().mode, mode);
        }
    }
}
