use crate::aggregate::{EnvironmentReport, EvolutionTable, GlobalSummary};
use crate::cli::Settings;
use crate::metrics::Channel;
use crate::utils::{format_seconds, group_ranks_by_host};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub hostname: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            hostname: nix::unistd::gethostname()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            cpu_cores: num_cpus::get(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Run metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub settings: Settings,
    pub environment: Option<EnvironmentReport>,
    pub system_info: SystemInfo,
}

/// Complete JSON report of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summaries: Vec<GlobalSummary>,
    pub evolution: Vec<EvolutionTable>,
}

/// Header lines describing where the job runs
pub fn header_lines(env: &EnvironmentReport) -> Vec<String> {
    let mut lines = vec![
        format!("# substrate version: {}", env.library_version),
        format!("# processes: {}", env.processor_names.len()),
    ];
    for (host, ranks) in group_ranks_by_host(&env.processor_names) {
        let ranks: Vec<String> = ranks.iter().map(|r| r.to_string()).collect();
        lines.push(format!("# {}: {}", host, ranks.join(" ")));
    }
    lines.push("# init times for ranks".to_string());
    for (rank, secs) in env.init_seconds.iter().enumerate() {
        lines.push(format!("# init[{}]: {}", rank, format_seconds(*secs)));
    }
    lines
}

/// Comment line naming the columns of a summary line
pub fn summary_columns() -> String {
    let mut columns = vec!["# size".to_string()];
    for channel in Channel::ALL {
        for stat in ["max", "min", "mean", "median", "variance"] {
            columns.push(format!("{}_{}", channel.name(), stat));
        }
    }
    for channel in Channel::ALL {
        columns.push(format!("{}_slowest", channel.name()));
    }
    columns.join(" ")
}

/// Comment line naming the columns of a time-evolution line
pub fn evolution_columns(processes: usize) -> String {
    let mut columns = vec!["# size".to_string(), "trial".to_string()];
    for rank in 0..processes {
        for channel in Channel::ALL {
            columns.push(format!("{}[{}]", channel.name(), rank));
        }
    }
    columns.join(" ")
}

/// One summary line: size, five headline figures per channel, slowest ranks
pub fn summary_line(summary: &GlobalSummary) -> String {
    let mut fields = vec![summary.message_size.to_string()];
    for channel in Channel::ALL {
        fields.extend(
            summary
                .channel(channel)
                .headline()
                .iter()
                .map(|v| format_seconds(*v)),
        );
    }
    fields.extend(summary.slowest_ranks().iter().map(|r| r.to_string()));
    fields.join(" ")
}

/// One line per trial: size, trial, then send/recv/probe of every rank
pub fn evolution_lines(table: &EvolutionTable) -> Vec<String> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(trial, row)| {
            let mut fields = vec![table.message_size.to_string(), trial.to_string()];
            fields.extend(row.iter().flatten().map(|v| format_seconds(*v)));
            fields.join(" ")
        })
        .collect()
}

/// Writes result lines as they arrive and, optionally, a JSON report at the end.
///
/// Only the coordinator owns one.
pub struct ResultsManager {
    writer: Box<dyn Write + Send>,
    output_file: Option<PathBuf>,
    settings: Settings,
    environment: Option<EnvironmentReport>,
    summaries: Vec<GlobalSummary>,
    evolution: Vec<EvolutionTable>,
}

impl ResultsManager {
    /// Create a results manager writing lines to stdout
    pub fn new(settings: &Settings) -> Self {
        Self::with_writer(settings, Box::new(std::io::stdout()))
    }

    pub fn with_writer(settings: &Settings, writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            output_file: settings.output_file.clone(),
            settings: settings.clone(),
            environment: None,
            summaries: Vec::new(),
            evolution: Vec::new(),
        }
    }

    /// Print the run header and the column line
    pub fn write_header(&mut self, env: EnvironmentReport) -> Result<()> {
        for line in header_lines(&env) {
            writeln!(self.writer, "{}", line)?;
        }
        let columns = if self.settings.time_evolution {
            evolution_columns(env.processor_names.len())
        } else {
            summary_columns()
        };
        writeln!(self.writer, "{}", columns)?;
        self.writer.flush()?;

        self.environment = Some(env);
        Ok(())
    }

    pub fn record_summary(&mut self, summary: GlobalSummary) -> Result<()> {
        writeln!(self.writer, "{}", summary_line(&summary))?;
        self.writer.flush()?;
        self.summaries.push(summary);
        Ok(())
    }

    pub fn record_evolution(&mut self, table: EvolutionTable) -> Result<()> {
        for line in evolution_lines(&table) {
            writeln!(self.writer, "{}", line)?;
        }
        self.writer.flush()?;
        self.evolution.push(table);
        Ok(())
    }

    /// Flush the line output and write the JSON report if requested
    pub fn finalize(&mut self) -> Result<()> {
        self.writer.flush()?;

        let Some(path) = self.output_file.clone() else {
            debug!("No output file requested, skipping JSON report");
            return Ok(());
        };

        let report = RunReport {
            metadata: RunMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                settings: self.settings.clone(),
                environment: self.environment.clone(),
                system_info: SystemInfo::default(),
            },
            summaries: std::mem::take(&mut self.summaries),
            evolution: std::mem::take(&mut self.evolution),
        };

        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write results to {:?}", path))?;

        info!("Results written to: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{interleave, summarize};
    use crate::metrics::StatVector;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

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
    }

    fn environment() -> EnvironmentReport {
        EnvironmentReport {
            library_version: "test 1.0".to_string(),
            processor_names: vec!["a".into(), "b".into(), "a".into()],
            init_seconds: vec![0.5, 0.25, 0.0],
        }
    }

    #[test]
    fn test_header_lines() {
        let lines = header_lines(&environment());
        assert_eq!(lines[0], "# substrate version: test 1.0");
        assert_eq!(lines[1], "# processes: 3");
        assert_eq!(lines[2], "# a: 0 2");
        assert_eq!(lines[3], "# b: 1");
        assert_eq!(lines[5], "# init[0]: 0.500000000");
        assert_eq!(lines.len(), 8);
    }

    /// A summary line holds the size, 15 statistics and 3 rank indices
    #[test]
    fn test_summary_line_shape() {
        let summary = summarize(48, &[StatVector::default(); 2]);
        let line = summary_line(&summary);
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 19);
        assert_eq!(fields[0], "48");
        assert!(fields[1..16].iter().all(|f| *f == "0.000000000"));
        assert_eq!(&fields[16..], &["0", "0", "0"]);
        assert_eq!(summary_columns().split(' ').count(), 20);
    }

    #[test]
    fn test_evolution_lines() {
        let flat = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let table = interleave(16, &flat, 2);
        let lines = evolution_lines(&table);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "16 0 1.000000000 3.000000000 5.000000000");
        assert_eq!(lines[1], "16 1 2.000000000 4.000000000 6.000000000");
        assert_eq!(evolution_columns(1), "# size trial send[0] recv[0] probe[0]");
    }

    #[test]
    fn test_manager_writes_lines_in_order() {
        let buffer = SharedBuffer::default();
        let settings = Settings {
            ranks: 3,
            ..Settings::default()
        };
        let mut manager = ResultsManager::with_writer(&settings, Box::new(buffer.clone()));
        manager.write_header(environment()).unwrap();
        manager
            .record_summary(summarize(16, &[StatVector::default(); 3]))
            .unwrap();
        manager.finalize().unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[8], summary_columns());
        assert!(lines[9].starts_with("16 "));
    }

    #[test]
    fn test_json_report() {
        let temp_file = NamedTempFile::new().unwrap();
        let settings = Settings {
            output_file: Some(temp_file.path().to_path_buf()),
            ..Settings::default()
        };
        let mut manager = ResultsManager::with_writer(&settings, Box::new(std::io::sink()));
        manager.write_header(environment()).unwrap();
        manager
            .record_summary(summarize(16, &[StatVector::default(); 3]))
            .unwrap();
        manager.finalize().unwrap();

        let json = std::fs::read_to_string(temp_file.path()).unwrap();
        let report: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.metadata.version, crate::VERSION);
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].processes, 3);
        assert!(report.evolution.is_empty());
        assert_eq!(
            report.metadata.environment.unwrap().processor_names.len(),
            3
        );
    }

    #[test]
    fn test_system_info_default() {
        let info = SystemInfo::default();
        assert!(!info.os.is_empty());
        assert!(!info.architecture.is_empty());
        assert!(info.cpu_cores > 0);
    }
}
