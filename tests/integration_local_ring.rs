//! End-to-end sweeps over the in-process thread ring.

use ring_latency::benchmark::BenchmarkRunner;
use ring_latency::cli::Settings;
use ring_latency::results::{summary_columns, ResultsManager};
use ring_latency::substrate::{LocalUniverse, Substrate, COORDINATOR};
use ring_latency::timing::{Elapsed, FrozenClock, Timestamp};
use ring_latency::RoundTripMode;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Result lines only, without the header and column comments
    fn data_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| !line.starts_with('#'))
            .collect()
    }
}

fn settings(mode: RoundTripMode, ranks: usize) -> Settings {
    Settings {
        mode,
        ranks,
        trials: 4,
        min_exponent: 4,
        max_exponent: 6,
        ..Settings::default()
    }
}

/// Run a full sweep and return everything the coordinator printed
fn sweep(runner: &BenchmarkRunner, ranks: usize) -> SharedBuffer {
    let buffer = SharedBuffer::default();
    LocalUniverse::new(ranks)
        .unwrap()
        .launch(false, |mut comm| {
            let mut results = (comm.rank() == COORDINATOR).then(|| {
                ResultsManager::with_writer(runner.settings(), Box::new(buffer.clone()))
            });
            runner.run(&mut comm, Elapsed::ZERO, results.as_mut())
        })
        .unwrap();
    buffer
}

fn frozen(settings: Settings) -> BenchmarkRunner {
    BenchmarkRunner::with_clock(settings, Box::new(FrozenClock(Timestamp::new(5, 0))))
}

/// With a frozen clock every statistic of every mode is exactly zero
#[test]
fn test_frozen_clock_sweep_all_modes() {
    let modes = [
        RoundTripMode::RoundTrip,
        RoundTripMode::RoundTripSync,
        RoundTripMode::RoundTripWait,
        RoundTripMode::RoundTripMsgSize,
        RoundTripMode::Send,
    ];
    for mode in modes {
        let runner = frozen(settings(mode, 4));
        let lines = sweep(&runner, 4).data_lines();

        let sizes = runner.settings().sizes();
        assert_eq!(lines.len(), sizes.len(), "{}", mode);
        for (line, size) in lines.iter().zip(&sizes) {
            let fields: Vec<&str> = line.split(' ').collect();
            assert_eq!(fields.len(), 19, "{}", mode);
            assert_eq!(fields[0], size.to_string());
            assert!(
                fields[1..16].iter().all(|f| f.parse::<f64>().unwrap() == 0.0),
                "{} produced a non-zero statistic: {}",
                mode,
                line
            );
            assert_eq!(&fields[16..], &["0", "0", "0"]);
        }
    }
}

#[test]
fn test_header_precedes_results() {
    let runner = frozen(settings(RoundTripMode::RoundTrip, 3));
    let lines = sweep(&runner, 3).lines();

    assert!(lines[0].starts_with("# substrate version:"));
    assert_eq!(lines[1], "# processes: 3");
    assert!(lines.contains(&"# init times for ranks".to_string()));
    assert!(lines.contains(&"# init[2]: 0.000000000".to_string()));

    let columns = lines.iter().position(|l| *l == summary_columns()).unwrap();
    assert!(lines[columns + 1..].iter().all(|l| !l.starts_with('#')));
}

/// Time evolution prints one line per size and trial with every rank's samples
#[test]
fn test_time_evolution_layout() {
    let runner = frozen(Settings {
        time_evolution: true,
        ..settings(RoundTripMode::RoundTripMsgSize, 3)
    });
    let lines = sweep(&runner, 3).data_lines();

    let sizes = runner.settings().sizes();
    assert_eq!(lines.len(), sizes.len() * 4);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 2 + 3 * 3);
        assert_eq!(fields[0], sizes[i / 4].to_string());
        assert_eq!(fields[1], (i % 4).to_string());
    }
}

/// The real clock gives ordered statistics and valid slowest-rank indices
#[test]
fn test_monotonic_clock_sweep_structure() {
    let runner = BenchmarkRunner::new(Settings {
        random_fill: true,
        ..settings(RoundTripMode::RoundTripMsgSize, 3)
    });
    let lines = sweep(&runner, 3).data_lines();
    assert_eq!(lines.len(), runner.settings().sizes().len());

    for line in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        let stats: Vec<f64> = fields[1..16].iter().map(|f| f.parse().unwrap()).collect();
        for channel in stats.chunks(5) {
            let (max, min, mean) = (channel[0], channel[1], channel[2]);
            assert!(min >= 0.0);
            assert!(min <= mean && mean <= max, "{}", line);
            assert!(channel[4] >= 0.0);
        }
        for rank in &fields[16..] {
            assert!(rank.parse::<usize>().unwrap() < 3);
        }
    }
}

/// A single process closes the ring on itself
#[test]
fn test_single_rank_ring() {
    let runner = frozen(settings(RoundTripMode::RoundTrip, 1));
    let buffer = sweep(&runner, 1);
    assert!(buffer.lines().contains(&"# processes: 1".to_string()));
    assert_eq!(buffer.data_lines().len(), runner.settings().sizes().len());
}

#[test]
fn test_json_report_written_by_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let runner = frozen(Settings {
        output_file: Some(path.clone()),
        ..settings(RoundTripMode::RoundTrip, 2)
    });
    sweep(&runner, 2);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["summaries"].as_array().unwrap().len(), 5);
    assert_eq!(json["metadata"]["settings"]["mode"], "RoundTrip");
    assert_eq!(json["metadata"]["environment"]["init_seconds"][1], 0.0);
}
