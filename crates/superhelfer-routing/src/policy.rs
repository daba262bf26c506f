//! Confirmation policies for risky tier switches

use std::io::IsTerminal;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use superhelfer_config::PolicyKind;
use superhelfer_core::{SwitchDecision, Tier};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::monitor::ResourceSnapshot;

/// A switch the monitor considers risky
#[derive(Debug, Clone, Serialize)]
pub struct SwitchRequest {
    pub tier: Tier,
    pub model: String,
    pub footprint_mb: u64,
    pub snapshot: ResourceSnapshot,
    pub projected_used_mb: u64,
    pub projected_fraction: f64,
    /// The tier would not fit into total memory
    pub exceeds_capacity: bool,
}

/// Decides risky switches; the monitor bounds the wait
#[async_trait]
pub trait SwitchPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decide(&self, request: &SwitchRequest) -> SwitchDecision;
}

pub struct AlwaysProceed;

#[async_trait]
impl SwitchPolicy for AlwaysProceed {
    fn name(&self) -> &'static str {
        "proceed"
    }

    async fn decide(&self, _request: &SwitchRequest) -> SwitchDecision {
        SwitchDecision::Proceed
    }
}

pub struct AlwaysAbort;

#[async_trait]
impl SwitchPolicy for AlwaysAbort {
    fn name(&self) -> &'static str {
        "abort"
    }

    async fn decide(&self, _request: &SwitchRequest) -> SwitchDecision {
        SwitchDecision::Abort
    }
}

/// Aborts only when the tier cannot fit at all
pub struct CapacityPolicy;

#[async_trait]
impl SwitchPolicy for CapacityPolicy {
    fn name(&self) -> &'static str {
        "capacity"
    }

    async fn decide(&self, request: &SwitchRequest) -> SwitchDecision {
        if request.exceeds_capacity {
            SwitchDecision::Abort
        } else {
            SwitchDecision::Proceed
        }
    }
}

/// Asks on the terminal; anything but `y`/`yes` aborts
pub struct TerminalPrompt;

#[async_trait]
impl SwitchPolicy for TerminalPrompt {
    fn name(&self) -> &'static str {
        "prompt"
    }

    async fn decide(&self, request: &SwitchRequest) -> SwitchDecision {
        if !std::io::stdin().is_terminal() {
            tracing::debug!("stdin is not a terminal, aborting switch");
            return SwitchDecision::Abort;
        }

        let question = format!(
            "GPU memory at {:.0}% ({} / {} MiB). Load {} tier ({}, ~{} MiB, projected {:.0}%)? [y/N] ",
            request.snapshot.usage_fraction * 100.0,
            request.snapshot.used_mb,
            request.snapshot.total_mb,
            request.tier,
            request.model,
            request.footprint_mb,
            request.projected_fraction * 100.0,
        );

        let stdin = BufReader::new(tokio::io::stdin());
        match ask(stdin, tokio::io::stderr(), &question).await {
            Ok(line) => parse_answer(&line),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read confirmation");
                SwitchDecision::Abort
            }
        }
    }
}

/// Write `question` and read one answer line; dropping the future abandons the read
async fn ask<R, W>(mut reader: R, mut writer: W, question: &str) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(question.as_bytes()).await?;
    writer.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line)
}

fn parse_answer(line: &str) -> SwitchDecision {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" | "j" | "ja" => SwitchDecision::Proceed,
        _ => SwitchDecision::Abort,
    }
}

/// Build the configured policy
pub fn from_kind(kind: PolicyKind) -> Arc<dyn SwitchPolicy> {
    match kind {
        PolicyKind::Proceed => Arc::new(AlwaysProceed),
        PolicyKind::Abort => Arc::new(AlwaysAbort),
        PolicyKind::Capacity => Arc::new(CapacityPolicy),
        PolicyKind::Prompt => Arc::new(TerminalPrompt),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request(exceeds_capacity: bool) -> SwitchRequest {
        SwitchRequest {
            tier: Tier::Heavy,
            model: "llama3.1:70b".to_owned(),
            footprint_mb: 42_000,
            snapshot: ResourceSnapshot {
                total_mb: 100_000,
                used_mb: 85_000,
                usage_fraction: 0.85,
            },
            projected_used_mb: 127_000,
            projected_fraction: 1.27,
            exceeds_capacity,
        }
    }

    #[tokio::test]
    async fn capacity_policy_aborts_only_on_overflow() {
        assert_eq!(CapacityPolicy.decide(&request(true)).await, SwitchDecision::Abort);
        assert_eq!(CapacityPolicy.decide(&request(false)).await, SwitchDecision::Proceed);
    }

    #[test]
    fn prompt_answers() {
        assert_eq!(parse_answer("y\n"), SwitchDecision::Proceed);
        assert_eq!(parse_answer(" Ja "), SwitchDecision::Proceed);
        assert_eq!(parse_answer("\n"), SwitchDecision::Abort);
        assert_eq!(parse_answer("nope"), SwitchDecision::Abort);
    }

    #[tokio::test]
    async fn prompt_writes_question_and_reads_one_line() {
        let mut out = Vec::new();
        let line = ask(&b"ja\nrest\n"[..], &mut out, "Load? ").await.unwrap();

        assert_eq!(line, "ja\n");
        assert_eq!(out, b"Load? ");
        assert_eq!(parse_answer(&line), SwitchDecision::Proceed);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_prompt_is_cancelled_by_timeout() {
        let (terminal, input) = tokio::io::duplex(64);
        let pending = ask(BufReader::new(input), tokio::io::sink(), "Load? ");

        let result = tokio::time::timeout(Duration::from_secs(5), pending).await;
        assert!(result.is_err());

        // The abandoned read released its end of the pipe
        let mut terminal = terminal;
        assert!(terminal.write_all(b"y\n").await.is_err());
    }

    #[test]
    fn builds_configured_policy() {
        assert_eq!(from_kind(PolicyKind::Capacity).name(), "capacity");
        assert_eq!(from_kind(PolicyKind::Prompt).name(), "prompt");
    }
}
