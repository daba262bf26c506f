//! GPU memory readings from `nvidia-smi`

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use superhelfer_routing::{MemoryReading, MemoryReporter, MonitorError};
use tokio::process::Command;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `nvidia-smi` for total and used memory across all GPUs
#[derive(Debug, Clone)]
pub struct NvidiaSmiReporter {
    command: String,
}

impl NvidiaSmiReporter {
    pub const fn new(command: String) -> Self {
        Self { command }
    }
}

#[async_trait]
impl MemoryReporter for NvidiaSmiReporter {
    async fn query_memory(&self) -> Result<MemoryReading, MonitorError> {
        let child = Command::new(&self.command)
            .args(["--query-gpu=memory.total,memory.used", "--format=csv,noheader,nounits"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MonitorError::ResourceUnavailable(format!("failed to run {}: {e}", self.command)))?;

        let output = tokio::time::timeout(QUERY_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| MonitorError::ResourceUnavailable(format!("{} timed out", self.command)))?
            .map_err(|e| MonitorError::ResourceUnavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MonitorError::ResourceUnavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let reading = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;
        tracing::trace!(total_mb = reading.total_mb, used_mb = reading.used_mb, "gpu memory read");
        Ok(reading)
    }
}

/// Parse `total, used` lines in MiB, summing over GPUs
pub fn parse_nvidia_smi(output: &str) -> Result<MemoryReading, MonitorError> {
    let mut reading = MemoryReading { total_mb: 0, used_mb: 0 };
    let mut gpus = 0;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split(',').map(str::trim);
        let (Some(total), Some(used), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(MonitorError::ResourceUnavailable(format!("unexpected nvidia-smi line: {line}")));
        };

        let parse = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| MonitorError::ResourceUnavailable(format!("invalid memory value: {value}")))
        };

        reading.total_mb += parse(total)?;
        reading.used_mb += parse(used)?;
        gpus += 1;
    }

    if gpus == 0 {
        return Err(MonitorError::ResourceUnavailable("nvidia-smi reported no GPUs".to_owned()));
    }

    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_gpu() {
        let reading = parse_nvidia_smi("24576, 3120\n").unwrap();
        assert_eq!(reading, MemoryReading { total_mb: 24_576, used_mb: 3_120 });
    }

    #[test]
    fn sums_multiple_gpus() {
        let reading = parse_nvidia_smi("24576, 1000\n24576, 2000\n\n").unwrap();
        assert_eq!(reading, MemoryReading { total_mb: 49_152, used_mb: 3_000 });
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_nvidia_smi("").is_err());
        assert!(parse_nvidia_smi("[N/A], [N/A]").is_err());
        assert!(parse_nvidia_smi("1, 2, 3").is_err());
        assert!(parse_nvidia_smi("NVIDIA-SMI has failed").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let reporter = NvidiaSmiReporter::new("/nonexistent/nvidia-smi".to_owned());
        let err = reporter.query_memory().await.unwrap_err();
        assert!(matches!(err, MonitorError::ResourceUnavailable(_)));
    }
}
