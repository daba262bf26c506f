//! Conversation context per session id
//!
//! Entries are owned by the store and expire after `ttl` without activity.
//! Analysis only ever sees the raw query; the context is prepended to the
//! prompt sent to the backend.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use superhelfer_config::SessionConfig;
use superhelfer_core::Tier;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::now_millis;
use crate::{QueryAnalysis, ReasonCode};

/// Characters of a response kept in the history
const PREVIEW_CHARS: usize = 200;

/// Longest client-supplied session id accepted as-is
const MAX_ID_LEN: usize = 128;

/// One answered query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub query: String,
    pub tier: Tier,
    pub complexity: f64,
    pub response_preview: String,
}

impl Turn {
    pub fn new(query: &str, tier: Tier, complexity: f64, response: &str) -> Self {
        let mut response_preview: String = response.chars().take(PREVIEW_CHARS).collect();
        if response.chars().nth(PREVIEW_CHARS).is_some() {
            response_preview.push_str("...");
        }

        Self {
            query: query.to_owned(),
            tier,
            complexity,
            response_preview,
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    created_ms: u64,
    last_seen_ms: u64,
    turns: VecDeque<Turn>,
}

/// Summary of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub id: String,
    pub created_ms: u64,
    pub last_seen_ms: u64,
    pub turns: usize,
    pub tier_usage: BTreeMap<Tier, usize>,
    pub average_complexity: Option<f64>,
}

/// In-memory session store with TTL expiry
pub struct SessionStore {
    entries: DashMap<String, SessionEntry>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve or create a session and mark it active
    ///
    /// Unknown ids supplied by the client are adopted; a missing or
    /// unusable id gets a fresh UUID.
    pub fn open(&self, id: Option<&str>) -> String {
        let now = now_millis();

        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() && id.len() <= MAX_ID_LEN => id.to_owned(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        self.entries
            .entry(id.clone())
            .and_modify(|entry| entry.last_seen_ms = now)
            .or_insert_with(|| {
                tracing::debug!(session = %id, "session created");
                SessionEntry {
                    created_ms: now,
                    last_seen_ms: now,
                    turns: VecDeque::new(),
                }
            });

        id
    }

    /// Append a turn, dropping the oldest beyond `max_turns`
    pub fn record_turn(&self, id: &str, turn: Turn) {
        let Some(mut entry) = self.entries.get_mut(id) else {
            tracing::debug!(session = %id, "turn for unknown session dropped");
            return;
        };

        entry.last_seen_ms = now_millis();
        entry.turns.push_back(turn);
        while entry.turns.len() > self.config.max_turns {
            entry.turns.pop_front();
        }
    }

    /// Turn history, oldest first
    pub fn get(&self, id: &str) -> Option<Vec<Turn>> {
        self.entries.get(id).map(|e| e.turns.iter().cloned().collect())
    }

    pub fn stats(&self, id: &str) -> Option<SessionStats> {
        let entry = self.entries.get(id)?;

        let mut tier_usage = BTreeMap::new();
        for turn in &entry.turns {
            *tier_usage.entry(turn.tier).or_insert(0) += 1;
        }

        let average_complexity = (!entry.turns.is_empty())
            .then(|| entry.turns.iter().map(|t| t.complexity).sum::<f64>() / entry.turns.len() as f64);

        Some(SessionStats {
            id: id.to_owned(),
            created_ms: entry.created_ms,
            last_seen_ms: entry.last_seen_ms,
            turns: entry.turns.len(),
            tier_usage,
            average_complexity,
        })
    }

    /// Prompt with the most recent turns prepended
    pub fn context_prompt(&self, id: &str, query: &str) -> String {
        let Some(entry) = self.entries.get(id) else {
            return query.to_owned();
        };

        if entry.turns.is_empty() || self.config.context_turns == 0 {
            return query.to_owned();
        }

        let skip = entry.turns.len().saturating_sub(self.config.context_turns);
        let mut prompt = String::from("Previous conversation:\n");
        for turn in entry.turns.iter().skip(skip) {
            let _ = writeln!(prompt, "Q: {}", turn.query);
            let _ = writeln!(prompt, "A: {}", turn.response_preview);
        }
        let _ = write!(prompt, "\nCurrent question: {query}");

        prompt
    }

    /// Tier a short follow-up should inherit from the previous turn
    ///
    /// Applies only when nothing in the query itself pointed anywhere and
    /// the previous turn ran on a costlier tier.
    pub fn follow_up_tier(&self, id: &str, analysis: &QueryAnalysis) -> Option<Tier> {
        if analysis.reason_code != ReasonCode::FastDefault
            || analysis.token_count > self.config.follow_up_max_tokens
        {
            return None;
        }

        let entry = self.entries.get(id)?;
        let previous = entry.turns.back()?.tier;
        (previous > analysis.tier).then_some(previous)
    }

    /// Drop sessions idle past the TTL; returns how many were removed
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let ttl_ms = u64::try_from(self.config.ttl.as_millis()).unwrap_or(u64::MAX);
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.last_seen_ms) <= ttl_ms);

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "expired sessions removed");
        }
        removed
    }

    /// Sweep every `sweep_interval` until `cancel` fires
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.sweep_at(now_millis());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::QueryAnalyzer;

    fn store() -> SessionStore {
        SessionStore::new(SessionConfig::default())
    }

    #[test]
    fn open_generates_or_adopts_ids() {
        let store = store();

        let generated = store.open(None);
        assert!(uuid::Uuid::parse_str(&generated).is_ok());

        assert_eq!(store.open(Some("abc")), "abc");
        assert_eq!(store.open(Some("abc")), "abc");
        assert_eq!(store.len(), 2);

        let blank = store.open(Some("  "));
        assert_ne!(blank, "");
    }

    #[test]
    fn history_is_bounded() {
        let store = SessionStore::new(SessionConfig {
            max_turns: 3,
            ..SessionConfig::default()
        });
        let id = store.open(None);

        for i in 0..5 {
            store.record_turn(&id, Turn::new(&format!("q{i}"), Tier::Fast, 0.1, "a"));
        }

        let turns = store.get(&id).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].query, "q2");
    }

    #[test]
    fn preview_is_truncated() {
        let turn = Turn::new("q", Tier::Code, 0.2, &"ä".repeat(500));
        assert_eq!(turn.response_preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(turn.response_preview.ends_with("..."));

        assert_eq!(Turn::new("q", Tier::Code, 0.2, "short").response_preview, "short");
    }

    #[test]
    fn stats_summarize_turns() {
        let store = store();
        let id = store.open(None);
        store.record_turn(&id, Turn::new("a", Tier::Heavy, 0.6, "x"));
        store.record_turn(&id, Turn::new("b", Tier::Code, 0.2, "y"));
        store.record_turn(&id, Turn::new("c", Tier::Code, 0.1, "z"));

        let stats = store.stats(&id).unwrap();
        assert_eq!(stats.turns, 3);
        assert_eq!(stats.tier_usage.get(&Tier::Code), Some(&2));
        assert!((stats.average_complexity.unwrap() - 0.3).abs() < 1e-9);
        assert!(store.stats("missing").is_none());
    }

    #[test]
    fn context_prompt_uses_recent_turns() {
        let store = SessionStore::new(SessionConfig {
            context_turns: 2,
            ..SessionConfig::default()
        });
        let id = store.open(None);
        assert_eq!(store.context_prompt(&id, "hello"), "hello");

        for q in ["first", "second", "third"] {
            store.record_turn(&id, Turn::new(q, Tier::Fast, 0.0, &format!("answer to {q}")));
        }

        let prompt = store.context_prompt(&id, "fourth");
        assert!(!prompt.contains("Q: first"));
        assert!(prompt.contains("Q: second\nA: answer to second"));
        assert!(prompt.ends_with("Current question: fourth"));
    }

    #[test]
    fn short_follow_up_keeps_costlier_tier() {
        let store = store();
        let analyzer = QueryAnalyzer::default();
        let id = store.open(None);
        store.record_turn(&id, Turn::new("Löse das Gleichungssystem", Tier::Heavy, 0.7, "x=6"));

        let follow_up = analyzer.analyze("Und warum?");
        assert_eq!(follow_up.reason_code, ReasonCode::FastDefault);
        assert_eq!(store.follow_up_tier(&id, &follow_up), Some(Tier::Heavy));

        let long = analyzer.analyze("Und kannst du mir das bitte noch einmal ganz genau erklären?");
        assert_eq!(store.follow_up_tier(&id, &long), None);

        let basic = analyzer.analyze("Welcher Befehl zeigt Prozesse?");
        assert_eq!(store.follow_up_tier(&id, &basic), None);

        assert_eq!(store.follow_up_tier("missing", &follow_up), None);
    }

    #[test]
    fn sweep_removes_expired_sessions() {
        let store = SessionStore::new(SessionConfig {
            ttl: Duration::from_secs(10),
            ..SessionConfig::default()
        });
        let id = store.open(None);
        let last_seen = store.stats(&id).unwrap().last_seen_ms;

        assert_eq!(store.sweep_at(last_seen + 10_000), 0);
        assert_eq!(store.sweep_at(last_seen + 10_001), 1);
        assert!(store.is_empty());
    }
}
