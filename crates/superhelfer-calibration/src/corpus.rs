//! Labeled query templates and batch generation

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use superhelfer_routing::Tier;

use crate::bank::HardNegativeBank;

/// Label of a template query
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Basic,
    Mathematical,
    Code,
    /// Explanations and comparisons; no tier is clearly right, Code is accepted
    Intermediate,
}

impl Category {
    pub const fn expected_tier(self) -> Tier {
        match self {
            Self::Basic => Tier::Fast,
            Self::Mathematical => Tier::Heavy,
            Self::Code | Self::Intermediate => Tier::Code,
        }
    }

    pub const fn templates(self) -> &'static [&'static str] {
        match self {
            Self::Basic => BASIC,
            Self::Mathematical => MATHEMATICAL,
            Self::Code => CODE,
            Self::Intermediate => INTERMEDIATE,
        }
    }
}

const BASIC: &[&str] = &[
    "Welcher Befehl zeigt die Festplattenbelegung an?",
    "Wie kann ich alle laufenden Prozesse anzeigen?",
    "Welches Kommando listet alle Dateien auf?",
    "Was macht der df Befehl?",
    "Wie zeige ich die CPU-Auslastung an?",
    "Welcher Befehl zeigt die IP-Adresse an?",
    "Was macht der Befehl uptime?",
];

const MATHEMATICAL: &[&str] = &[
    "Bestimme die mathematisch optimale Puffergröße für I/O-Operationen",
    "Löse das Gleichungssystem: x+y=10, x-y=2",
    "Berechne Fibonacci-Zahlen zur Bestimmung von Retry-Intervallen",
    "Finde die optimale Anzahl von Worker-Threads für CPU-intensive Tasks",
    "Bestimme die mathematisch optimale Cache-Größe für Datenbank-Queries",
    "Berechne den Wert von x in der Gleichung 3x + 7 = 22",
    "Beweise, dass die Summe zweier gerader Zahlen gerade ist",
];

const CODE: &[&str] = &[
    "Schreibe ein Bash-Skript zum automatischen Backup",
    "Erstelle eine Python-Funktion für Datei-Synchronisation",
    "Entwickle ein Shell-Skript für Log-Rotation",
    "Programmiere einen Service-Monitor in Python",
    "Schreibe ein Bash-Skript für System-Updates",
    "Zeige mir alle laufenden Prozesse mit ps aux | grep python",
];

const INTERMEDIATE: &[&str] = &[
    "Erkläre mir die Unterschiede zwischen verschiedenen Dateisystemen",
    "Wie funktioniert die Speicherverwaltung in Linux?",
    "Was sind die Vor- und Nachteile von Docker vs. LXC?",
    "Analysiere die Performance-Probleme bei hoher CPU-Last",
    "Vergleiche verschiedene Load-Balancing-Strategien",
];

/// Where a batch query came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    Template,
    HardNegative,
}

/// One labeled query in a calibration batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationQuery {
    pub text: String,
    pub category: Category,
    pub expected: Tier,
    pub source: QuerySource,
}

/// Paraphrases, typos, unicode variants, politeness, casing and punctuation
static MUTATIONS: [fn(&str) -> String; 18] = [
    |q: &str| q.to_owned(),
    |q: &str| q.replace("Bestimme", "Ermittle"),
    |q: &str| q.replace("zeigt", "anzeigt"),
    |q: &str| q.replace("Befehl", "Kommando"),
    |q: &str| q.replace("optimale", "optimahle"),
    |q: &str| q.replace("Puffergröße", "Puffergroesse"),
    |q: &str| q.replace("I/O", "I\u{2215}O"),
    |q: &str| q.replace("I/O", "IO"),
    |q: &str| q.replace('ö', "oe"),
    |q: &str| format!("Kannst du mir bitte helfen: {}", q.to_lowercase()),
    |q: &str| format!("{q} Vielen Dank!"),
    |q: &str| format!("Bitte {}", q.to_lowercase()),
    |q: &str| q.to_uppercase(),
    |q: &str| q.to_lowercase(),
    title_case,
    |q: &str| format!("{}.", q.trim_end_matches('?')),
    |q: &str| format!("{q}??"),
    |q: &str| q.replace('?', ""),
];

fn title_case(query: &str) -> String {
    query
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply one randomly chosen mutation
pub fn mutate<R: Rng + ?Sized>(rng: &mut R, query: &str) -> String {
    let mutation = MUTATIONS[rng.random_range(0..MUTATIONS.len())];
    mutation(query)
}

/// Category shares by recent accuracy; weaker runs lean on basics
pub fn curriculum_mix(recent_accuracy: Option<f64>) -> [(Category, f64); 4] {
    let (basic, math, code, intermediate) = match recent_accuracy {
        Some(a) if a < 0.75 => (0.5, 0.2, 0.2, 0.1),
        Some(a) if a < 0.85 => (0.3, 0.25, 0.25, 0.2),
        Some(_) => (0.2, 0.3, 0.2, 0.3),
        None => (0.3, 0.25, 0.25, 0.2),
    };

    [
        (Category::Basic, basic),
        (Category::Mathematical, math),
        (Category::Code, code),
        (Category::Intermediate, intermediate),
    ]
}

/// Per-category counts summing exactly to `total`
fn allocate(total: usize, mix: &[(Category, f64); 4]) -> [(Category, usize); 4] {
    let mut counts = mix.map(|(category, share)| (category, (total as f64 * share).floor() as usize));
    let assigned: usize = counts.iter().map(|(_, n)| n).sum();

    for i in 0..total.saturating_sub(assigned) {
        counts[i % counts.len()].1 += 1;
    }

    counts
}

/// Draw a batch of `size` queries
///
/// `round(size * hard_fraction)` come from the bank, drawn with
/// replacement and mutated; the rest are mutated templates following the
/// curriculum mix. An empty bank contributes nothing.
pub fn build_batch<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    hard_fraction: f64,
    bank: &HardNegativeBank,
    recent_accuracy: Option<f64>,
) -> Vec<CalibrationQuery> {
    let hard = if bank.is_empty() {
        0
    } else {
        ((size as f64 * hard_fraction).round() as usize).min(size)
    };

    let mut batch = Vec::with_capacity(size);

    for _ in 0..hard {
        if let Some(query) = bank.entries().choose(rng) {
            batch.push(CalibrationQuery {
                text: mutate(rng, query),
                category: Category::Mathematical,
                expected: Tier::Heavy,
                source: QuerySource::HardNegative,
            });
        }
    }

    for (category, count) in allocate(size - hard, &curriculum_mix(recent_accuracy)) {
        for _ in 0..count {
            if let Some(template) = category.templates().choose(rng) {
                batch.push(CalibrationQuery {
                    text: mutate(rng, template),
                    category,
                    expected: category.expected_tier(),
                    source: QuerySource::Template,
                });
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use strum::IntoEnumIterator;

    use super::*;

    fn bank_with(queries: &[&str]) -> (tempfile::TempDir, HardNegativeBank) {
        let dir = tempfile::tempdir().unwrap();
        let mut bank = HardNegativeBank::load(dir.path()).unwrap();
        bank.extend(queries.iter().copied());
        (dir, bank)
    }

    #[test]
    fn batch_has_exact_size_without_bank() {
        let (_dir, bank) = bank_with(&[]);
        let mut rng = StdRng::seed_from_u64(1);

        for size in [1, 7, 100] {
            let batch = build_batch(&mut rng, size, 1.0 / 3.0, &bank, None);
            assert_eq!(batch.len(), size);
            assert!(batch.iter().all(|q| q.source == QuerySource::Template));
        }
    }

    #[test]
    fn hard_negatives_take_their_share() {
        let (_dir, bank) = bank_with(&["Berechne die optimale Blockgröße"]);
        let mut rng = StdRng::seed_from_u64(2);

        let batch = build_batch(&mut rng, 100, 1.0 / 3.0, &bank, Some(0.9));
        let hard: Vec<_> = batch.iter().filter(|q| q.source == QuerySource::HardNegative).collect();

        assert_eq!(batch.len(), 100);
        assert_eq!(hard.len(), 33);
        assert!(hard.iter().all(|q| q.expected == Tier::Heavy));
    }

    #[test]
    fn labels_follow_category() {
        let (_dir, bank) = bank_with(&[]);
        let mut rng = StdRng::seed_from_u64(3);

        for query in build_batch(&mut rng, 50, 0.0, &bank, None) {
            assert_eq!(query.expected, query.category.expected_tier());
        }
        assert_eq!(Category::Intermediate.expected_tier(), Tier::Code);
    }

    #[test]
    fn same_seed_same_batch() {
        let (_dir, bank) = bank_with(&["Löse 2x = 4"]);

        let a = build_batch(&mut StdRng::seed_from_u64(9), 40, 0.25, &bank, None);
        let b = build_batch(&mut StdRng::seed_from_u64(9), 40, 0.25, &bank, None);
        assert_eq!(a, b);
    }

    #[test]
    fn curriculum_shifts_with_accuracy() {
        assert!((curriculum_mix(Some(0.6))[0].1 - 0.5).abs() < f64::EPSILON);
        assert!((curriculum_mix(Some(0.8))[0].1 - 0.3).abs() < f64::EPSILON);
        assert!((curriculum_mix(Some(0.95))[3].1 - 0.3).abs() < f64::EPSILON);

        for accuracy in [None, Some(0.1), Some(0.8), Some(1.0)] {
            let total: f64 = curriculum_mix(accuracy).iter().map(|(_, s)| s).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn allocation_distributes_remainder() {
        let counts = allocate(7, &curriculum_mix(Some(0.5)));
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), 7);
    }

    #[test]
    fn mutations_keep_content() {
        let mut rng = StdRng::seed_from_u64(4);
        for category in Category::iter() {
            for template in category.templates() {
                assert!(!mutate(&mut rng, template).trim().is_empty());
            }
        }
    }

    #[test]
    fn title_case_capitalizes_words() {
        assert_eq!(title_case("wie zeige ich DIE last"), "Wie Zeige Ich Die Last");
    }
}
