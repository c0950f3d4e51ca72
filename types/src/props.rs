//! Persisted DAG-position metadata of a unit.

use serde::{Deserialize, Serialize};

use crate::UnitId;

/// Main-chain index.
pub type Mci = u64;

/// Distance from the root unit along the longest parent path.
pub type Level = u64;

/// Conflict-resolution label of a unit.
///
/// `Good` and `TempBad` are provisional while the unit is unstable;
/// once stable the label is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequence {
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "temp-bad")]
    TempBad,
    #[serde(rename = "final-bad")]
    FinalBad,
}

impl Sequence {
    pub fn is_good(&self) -> bool {
        matches!(self, Sequence::Good)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sequence::Good => "good",
            Sequence::TempBad => "temp-bad",
            Sequence::FinalBad => "final-bad",
        }
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DAG-position metadata, read by id on every ancestry step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitProps {
    pub unit: UnitId,
    /// 1 + max(parents' levels); 0 for the root unit.
    pub level: Level,
    /// Highest main-chain index reachable through parents.
    pub latest_included_mc_index: Option<Mci>,
    /// Assigned once the unit is covered by the main chain.
    pub main_chain_index: Option<Mci>,
    pub is_on_main_chain: bool,
    /// No children yet.
    pub is_free: bool,
    pub is_stable: bool,
    pub witnessed_level: Level,
    pub sequence: Sequence,
    pub best_parent_unit: Option<UnitId>,
}

impl UnitProps {
    /// Props of a freshly accepted unit: free, unstable, not yet on the main chain.
    pub fn new(unit: UnitId, level: Level) -> Self {
        Self {
            unit,
            level,
            latest_included_mc_index: None,
            main_chain_index: None,
            is_on_main_chain: false,
            is_free: true,
            is_stable: false,
            witnessed_level: 0,
            sequence: Sequence::Good,
            best_parent_unit: None,
        }
    }

    /// Gap between the unit's MCI and its LIMCI; the cheaper side of an
    /// ancestry walk is the one with the smaller gap. Unassigned indexes
    /// count as zero.
    pub fn mc_gap(&self) -> i128 {
        self.main_chain_index.unwrap_or(0) as i128
            - self.latest_included_mc_index.unwrap_or(0) as i128
    }
}
