use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Model class a query can be routed to
///
/// Variants are declared cheapest first, so the derived ordering is the
/// resource-cost ordering used by fallback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Tier {
    /// Small model kept warm for quick command questions
    Fast,
    /// Code and general technical model
    Code,
    /// Large reasoning model for mathematical and optimization work
    Heavy,
}

impl Tier {
    /// Every tier, cheapest first
    pub const ALL: [Self; 3] = [Self::Fast, Self::Code, Self::Heavy];

    /// The next cheaper tier, or `None` for `Fast`
    pub const fn cheaper(self) -> Option<Self> {
        match self {
            Self::Heavy => Some(Self::Code),
            Self::Code => Some(Self::Fast),
            Self::Fast => None,
        }
    }

    /// Position in [`Tier::ALL`], handy for per-tier arrays
    pub const fn index(self) -> usize {
        match self {
            Self::Fast => 0,
            Self::Code => 1,
            Self::Heavy => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Outcome of a confirmation request for a risky tier switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwitchDecision {
    /// Load the requested tier anyway
    Proceed,
    /// Skip the switch and fall back one tier
    Abort,
}
