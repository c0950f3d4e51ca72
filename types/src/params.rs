//! Protocol parameters shared by every node on a network.

use serde::{Deserialize, Serialize};

use crate::{Mci, TesseraError};

/// Constants that every participant must agree on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Size of a witness list.
    pub count_witnesses: usize,

    /// Number of distinct witness authors needed to trust a last ball.
    /// Must be a strict majority of `count_witnesses`.
    pub majority_of_witnesses: usize,

    /// Maximum difference between witness lists along one main-chain path.
    pub max_witness_list_mutations: usize,

    /// Main-chain units at MCIs divisible by this value carry skiplist links.
    pub skiplist_interval: Mci,

    /// Maximum number of parents a unit may reference.
    pub max_parents: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            count_witnesses: 12,
            majority_of_witnesses: 7,
            max_witness_list_mutations: 1,
            skiplist_interval: 10,
            max_parents: 16,
        }
    }
}

impl ProtocolParams {
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.count_witnesses == 0 {
            return Err(TesseraError::InvalidParams(
                "count_witnesses must be positive".into(),
            ));
        }
        if self.majority_of_witnesses * 2 <= self.count_witnesses
            || self.majority_of_witnesses > self.count_witnesses
        {
            return Err(TesseraError::InvalidParams(format!(
                "majority_of_witnesses {} is not a strict majority of {}",
                self.majority_of_witnesses, self.count_witnesses
            )));
        }
        if self.skiplist_interval < 2 {
            return Err(TesseraError::InvalidParams(
                "skiplist_interval must be at least 2".into(),
            ));
        }
        if self.max_parents == 0 {
            return Err(TesseraError::InvalidParams(
                "max_parents must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Earlier MCIs a main-chain unit at `mci` links to: `mci - interval^k`
    /// for every `k >= 1` with `interval^k` dividing `mci`, nearest first.
    pub fn skiplist_mcis(&self, mci: Mci) -> Vec<Mci> {
        let mut out = Vec::new();
        if mci == 0 {
            return out;
        }
        let mut divisor = self.skiplist_interval;
        while mci % divisor == 0 {
            out.push(mci - divisor);
            match divisor.checked_mul(self.skiplist_interval) {
                Some(next) if next <= mci => divisor = next,
                _ => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ProtocolParams::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_majority() {
        let params = ProtocolParams {
            majority_of_witnesses: 6,
            ..ProtocolParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn skiplist_targets() {
        let params = ProtocolParams::default();
        assert!(params.skiplist_mcis(0).is_empty());
        assert!(params.skiplist_mcis(7).is_empty());
        assert_eq!(params.skiplist_mcis(10), vec![0]);
        assert_eq!(params.skiplist_mcis(30), vec![20]);
        assert_eq!(params.skiplist_mcis(100), vec![90, 0]);
        assert_eq!(params.skiplist_mcis(1200), vec![1190, 1100]);
    }

    #[test]
    fn partial_toml_style_override_keeps_defaults() {
        let params: ProtocolParams = serde_json::from_str(r#"{"count_witnesses": 3, "majority_of_witnesses": 2}"#).unwrap();
        assert_eq!(params.count_witnesses, 3);
        assert_eq!(params.skiplist_interval, 10);
        params.validate().unwrap();
    }
}
