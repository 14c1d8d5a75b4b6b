//! # Tallies
//!
//! Reaction-rate tallies as produced by a transport code: a mean and a
//! standard deviation per (domain, score, nuclide, energy group).
//!
//! `TallyAccumulator` collects history-wise scores into such tallies using
//! the usual batch statistics:
//!
//! ```text
//! x̄ = (1/N) Σ xᵢ
//! σ(x̄) = sqrt( (Σxᵢ²/N - x̄²) / (N - 1) )
//! ```
//!
//! where xᵢ is the total score of history i in one bin.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::materials::Nuclide;
use crate::types::DomainId;
use crate::volume::Measurement;

// ============================================================================
// SCORES AND GROUPS
// ============================================================================

/// Reaction channel a tally scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Score {
    /// Total reaction rate
    Total,
    /// Scattering rate
    Scatter,
    /// Elastic scattering rate
    Elastic,
    /// Absorption rate
    Absorption,
    /// Radiative capture rate
    Capture,
    /// Fission rate
    Fission,
    /// ν × fission rate (fission neutron production)
    NuFission,
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Score::Total => "total",
            Score::Scatter => "scatter",
            Score::Elastic => "elastic",
            Score::Absorption => "absorption",
            Score::Capture => "capture",
            Score::Fission => "fission",
            Score::NuFission => "nu-fission",
        };
        f.write_str(s)
    }
}

/// Energy group structure (eV), ascending boundaries; group 0 is the lowest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EnergyGroups {
    boundaries: Vec<f64>,
}

impl EnergyGroups {
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(Error::InvalidInput("energy groups need at least two boundaries".into()));
        }
        if boundaries.iter().any(|e| !e.is_finite() || *e < 0.0) {
            return Err(Error::InvalidInput("energy boundaries must be finite and >= 0".into()));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidInput("energy boundaries must be strictly ascending".into()));
        }
        Ok(Self { boundaries })
    }

    /// Two-group thermal / fast split at 0.625 eV
    pub fn two_group() -> Self {
        Self { boundaries: vec![0.0, 0.625, 20.0e6] }
    }

    pub fn num_groups(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// (lower, upper) energy of a group
    pub fn bounds(&self, group: usize) -> Option<(f64, f64)> {
        Some((*self.boundaries.get(group)?, *self.boundaries.get(group + 1)?))
    }

    /// Group containing `energy`; `None` outside the structure
    pub fn find_group(&self, energy: f64) -> Option<usize> {
        let last = *self.boundaries.last()?;
        if energy < self.boundaries[0] || energy > last || energy.is_nan() {
            return None;
        }
        // Upper edge belongs to the top group
        let i = self.boundaries.partition_point(|&b| b <= energy);
        Some(i.saturating_sub(1).min(self.num_groups() - 1))
    }
}

impl TryFrom<Vec<f64>> for EnergyGroups {
    type Error = Error;

    fn try_from(v: Vec<f64>) -> Result<Self> {
        Self::new(v)
    }
}

impl From<EnergyGroups> for Vec<f64> {
    fn from(g: EnergyGroups) -> Self {
        g.boundaries
    }
}

// ============================================================================
// TALLY VALUES
// ============================================================================

/// One tallied reaction rate with its standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub domain: DomainId,
    pub score: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuclide: Option<Nuclide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    pub mean: f64,
    pub std_dev: f64,
}

impl ReactionTally {
    pub fn new(domain: DomainId, score: Score, mean: f64, std_dev: f64) -> Self {
        Self {
            domain,
            score,
            nuclide: None,
            group: None,
            mean,
            std_dev,
        }
    }

    pub fn for_nuclide(mut self, nuclide: Nuclide) -> Self {
        self.nuclide = Some(nuclide);
        self
    }

    pub fn in_group(mut self, group: usize) -> Self {
        self.group = Some(group);
        self
    }

    pub fn measurement(&self) -> Measurement {
        Measurement::new(self.mean, self.std_dev)
    }

    pub fn relative_std_dev(&self) -> f64 {
        self.measurement().relative_std_dev()
    }
}

// ============================================================================
// ACCUMULATION
// ============================================================================

/// History-wise accumulator for one (domain, score)
///
/// Bins are nuclide × group. Without nuclides the tally is a single total
/// over the material; without groups a single energy-integrated bin.
#[derive(Debug, Clone)]
pub struct TallyAccumulator {
    pub domain: DomainId,
    pub score: Score,
    nuclides: Vec<Nuclide>,
    groups: Option<EnergyGroups>,
    /// Scores of the history in progress
    current: Vec<f64>,
    /// Accumulated per-history sums
    sum: Vec<f64>,
    /// Squared per-history sums for variance
    sum_sq: Vec<f64>,
    n_histories: u64,
}

impl TallyAccumulator {
    pub fn new(
        domain: DomainId,
        score: Score,
        nuclides: Vec<Nuclide>,
        groups: Option<EnergyGroups>,
    ) -> Self {
        let n_nuc = nuclides.len().max(1);
        let n_grp = groups.as_ref().map_or(1, EnergyGroups::num_groups);
        let n_bins = n_nuc * n_grp;

        Self {
            domain,
            score,
            nuclides,
            groups,
            current: vec![0.0; n_bins],
            sum: vec![0.0; n_bins],
            sum_sq: vec![0.0; n_bins],
            n_histories: 0,
        }
    }

    fn n_groups(&self) -> usize {
        self.groups.as_ref().map_or(1, EnergyGroups::num_groups)
    }

    /// Score a contribution; ignored when the nuclide or energy is not binned
    pub fn score(&mut self, nuclide: Option<&Nuclide>, energy: f64, value: f64) {
        let nuc_idx = if self.nuclides.is_empty() {
            0
        } else {
            match nuclide.and_then(|n| self.nuclides.iter().position(|x| x == n)) {
                Some(i) => i,
                None => return,
            }
        };
        let group = match &self.groups {
            Some(g) => match g.find_group(energy) {
                Some(i) => i,
                None => return,
            },
            None => 0,
        };
        let bin = nuc_idx * self.n_groups() + group;
        self.current[bin] += value;
    }

    /// Close the current history
    pub fn end_history(&mut self) {
        for ((s, sq), c) in self.sum.iter_mut().zip(&mut self.sum_sq).zip(&mut self.current) {
            *s += *c;
            *sq += *c * *c;
            *c = 0.0;
        }
        self.n_histories += 1;
    }

    pub fn histories(&self) -> u64 {
        self.n_histories
    }

    /// Mean and standard deviation of the mean for every bin
    pub fn results(&self) -> Result<Vec<ReactionTally>> {
        if self.n_histories == 0 {
            return Err(Error::InvalidInput(format!(
                "{} tally on {} has no completed histories",
                self.score, self.domain
            )));
        }

        let n = self.n_histories as f64;
        let n_grp = self.n_groups();
        let mut out = Vec::with_capacity(self.sum.len());

        for (bin, (&s, &sq)) in self.sum.iter().zip(&self.sum_sq).enumerate() {
            let mean = s / n;
            let std_dev = if self.n_histories > 1 {
                ((sq / n - mean * mean).max(0.0) / (n - 1.0)).sqrt()
            } else {
                0.0
            };
            out.push(ReactionTally {
                domain: self.domain,
                score: self.score,
                nuclide: self.nuclides.get(bin / n_grp).copied(),
                group: self.groups.as_ref().map(|_| bin % n_grp),
                mean,
                std_dev,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_groups() {
        let g = EnergyGroups::new(vec![0.0, 1.0, 10.0, 100.0]).unwrap();
        assert_eq!(g.num_groups(), 3);
        assert_eq!(g.find_group(0.0), Some(0));
        assert_eq!(g.find_group(0.5), Some(0));
        assert_eq!(g.find_group(1.0), Some(1));
        assert_eq!(g.find_group(99.0), Some(2));
        assert_eq!(g.find_group(100.0), Some(2));
        assert_eq!(g.find_group(100.1), None);
        assert_eq!(g.find_group(-1.0), None);
        assert_eq!(g.bounds(1), Some((1.0, 10.0)));
        assert_eq!(g.bounds(3), None);

        assert!(EnergyGroups::new(vec![1.0]).is_err());
        assert!(EnergyGroups::new(vec![1.0, 1.0]).is_err());
        assert!(EnergyGroups::new(vec![2.0, 1.0]).is_err());
        assert_eq!(EnergyGroups::two_group().num_groups(), 2);
    }

    #[test]
    fn test_tally() {
        let mut tally = TallyAccumulator::new(DomainId::cell(1), Score::Total, vec![], None);

        tally.score(None, 1.0, 10.0);
        tally.end_history();
        tally.score(None, 1.0, 12.0);
        tally.end_history();

        let r = tally.results().unwrap();
        assert_eq!(r.len(), 1);
        assert!((r[0].mean - 11.0).abs() < 1e-12);
        // Sample std of {10, 12} is √2; of the mean, 1
        assert!((r[0].std_dev - 1.0).abs() < 1e-12);
        assert_eq!(r[0].nuclide, None);
        assert_eq!(r[0].group, None);
    }

    #[test]
    fn test_tally_bins() {
        let nuclides = vec![Nuclide::u235(), Nuclide::u238()];
        let mut tally = TallyAccumulator::new(
            DomainId::material(1),
            Score::Fission,
            nuclides,
            Some(EnergyGroups::two_group()),
        );

        for _ in 0..4 {
            tally.score(Some(&Nuclide::u235()), 0.0253, 2.0); // thermal
            tally.score(Some(&Nuclide::u235()), 0.0253, 1.0); // same history
            tally.score(Some(&Nuclide::u238()), 2.0e6, 0.5); // fast
            tally.score(Some(&Nuclide::o16()), 2.0e6, 9.0); // not binned
            tally.score(Some(&Nuclide::u238()), 1.0e9, 9.0); // above range
            tally.end_history();
        }

        let r = tally.results().unwrap();
        assert_eq!(r.len(), 4);
        let find = |n: Nuclide, g: usize| {
            r.iter().find(|t| t.nuclide == Some(n) && t.group == Some(g)).unwrap()
        };
        assert_eq!(find(Nuclide::u235(), 0).mean, 3.0);
        assert_eq!(find(Nuclide::u235(), 1).mean, 0.0);
        assert_eq!(find(Nuclide::u238(), 1).mean, 0.5);
        assert_eq!(find(Nuclide::u238(), 1).std_dev, 0.0);
        assert_eq!(tally.histories(), 4);
    }

    #[test]
    fn test_empty_tally() {
        let tally = TallyAccumulator::new(DomainId::cell(1), Score::Total, vec![], None);
        assert!(tally.results().is_err());
    }

    #[test]
    fn test_reaction_tally_json() {
        let t = ReactionTally::new(DomainId::cell(2), Score::NuFission, 1.5, 0.03)
            .for_nuclide(Nuclide::u235())
            .in_group(1);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"nu-fission\""));
        assert!(json.contains("\"U235\""));
        let back: ReactionTally = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!((t.relative_std_dev() - 0.02).abs() < 1e-12);

        let src = r#"{"domain":"cell:1","score":"total","mean":1.0,"std_dev":0.1}"#;
        let bare: ReactionTally = serde_json::from_str(src).unwrap();
        assert_eq!(bare.nuclide, None);
        assert_eq!(bare.group, None);
    }
}
