//! # Tally Normalization
//!
//! Converts reaction-rate tallies into per-atom (microscopic) quantities
//! using the atom counts of a volume calculation:
//!
//! ```text
//! q = R / A
//! σ(q)/q = sqrt( (σ(R)/R)² + (σ(A)/A)² )
//! ```
//!
//! R comes from the transport random walk and A from geometric sampling;
//! the two are statistically independent. The absolute form
//! `σ(q)² = (σ(R)/A)² + (R·σ(A)/A²)²` is used so a zero rate still gets
//! a finite uncertainty.
//!
//! Tallies that name a nuclide are divided by that nuclide's atom count;
//! tallies without one by the total atom count of the domain.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::materials::Nuclide;
use crate::tally::{EnergyGroups, ReactionTally, Score};
use crate::types::DomainId;
use crate::volume::{Measurement, VolumeResults};

/// Reaction rate per atom, with propagated uncertainty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroscopicQuantity {
    pub domain: DomainId,
    pub score: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuclide: Option<Nuclide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    pub mean: f64,
    pub std_dev: f64,
}

impl MicroscopicQuantity {
    pub fn measurement(&self) -> Measurement {
        Measurement::new(self.mean, self.std_dev)
    }

    pub fn relative_std_dev(&self) -> f64 {
        self.measurement().relative_std_dev()
    }
}

/// Divides tallies by atom counts looked up from persisted volume runs
#[derive(Debug, Clone)]
pub struct TallyNormalizer<'a> {
    runs: Vec<&'a VolumeResults>,
}

impl<'a> TallyNormalizer<'a> {
    pub fn new(results: &'a VolumeResults) -> Self {
        Self { runs: vec![results] }
    }

    /// Several runs; a domain is taken from the first run that has it
    pub fn from_runs(runs: &'a [VolumeResults]) -> Self {
        Self { runs: runs.iter().collect() }
    }

    /// Atom count matching a tally's domain and nuclide
    pub fn atom_count(&self, tally: &ReactionTally) -> Result<Measurement> {
        let missing = || Error::MissingVolumeData {
            domain: tally.domain,
            nuclide: tally.nuclide,
        };
        let estimate = self
            .runs
            .iter()
            .find_map(|r| r.get(&tally.domain))
            .ok_or_else(missing)?;

        let atoms = match &tally.nuclide {
            Some(n) => estimate.atoms_of(n),
            None => estimate.total_atoms(),
        };
        atoms.ok_or_else(missing)
    }

    /// Normalize one tally
    pub fn normalize(&self, tally: &ReactionTally) -> Result<MicroscopicQuantity> {
        let atoms = self.atom_count(tally)?;
        if atoms.mean == 0.0 {
            return Err(Error::DivideByZero {
                domain: tally.domain,
                nuclide: tally.nuclide,
            });
        }

        let q = tally.mean / atoms.mean;
        let a = tally.std_dev / atoms.mean;
        let b = tally.mean * atoms.std_dev / (atoms.mean * atoms.mean);

        Ok(MicroscopicQuantity {
            domain: tally.domain,
            score: tally.score,
            nuclide: tally.nuclide,
            group: tally.group,
            mean: q,
            std_dev: (a * a + b * b).sqrt(),
        })
    }

    /// Normalize a batch; each failure is reported without stopping the rest
    pub fn normalize_all(&self, tallies: &[ReactionTally]) -> Vec<Result<MicroscopicQuantity>> {
        let out: Vec<_> = tallies
            .iter()
            .map(|t| {
                let r = self.normalize(t);
                if let Err(e) = &r {
                    warn!(domain = %t.domain, score = %t.score, error = %e, "tally not normalized");
                }
                r
            })
            .collect();
        debug!(
            total = tallies.len(),
            ok = out.iter().filter(|r| r.is_ok()).count(),
            "batch normalized"
        );
        out
    }
}

/// Group-wise microscopic values for one (domain, nuclide, score)
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTable {
    pub domain: DomainId,
    pub nuclide: Option<Nuclide>,
    pub score: Score,
    /// (group, value), ascending group index
    pub values: Vec<(usize, Measurement)>,
}

impl GroupTable {
    /// Collect the group-wise entries matching the key
    pub fn collect(
        quantities: &[MicroscopicQuantity],
        domain: DomainId,
        nuclide: Option<Nuclide>,
        score: Score,
    ) -> Self {
        let mut values: Vec<(usize, Measurement)> = quantities
            .iter()
            .filter(|q| q.domain == domain && q.nuclide == nuclide && q.score == score)
            .filter_map(|q| Some((q.group?, q.measurement())))
            .collect();
        values.sort_by_key(|(g, _)| *g);

        Self {
            domain,
            nuclide,
            score,
            values,
        }
    }

    pub fn get(&self, group: usize) -> Option<Measurement> {
        self.values.iter().find(|(g, _)| *g == group).map(|(_, m)| *m)
    }

    /// Plain-text table with group energy bounds
    pub fn render(&self, groups: Option<&EnergyGroups>) -> String {
        let mut s = format!(
            "{} / {} / {}\n",
            self.domain,
            self.nuclide.map_or_else(|| "total".to_string(), |n| n.to_string()),
            self.score
        );
        for (g, m) in &self.values {
            let range = groups
                .and_then(|eg| eg.bounds(*g))
                .map(|(lo, hi)| format!("[{:.4e}, {:.4e}] eV", lo, hi))
                .unwrap_or_default();
            s.push_str(&format!(
                "  group {:>3} {:>24} {:.6e} ± {:.2}%\n",
                g,
                range,
                m.mean,
                m.relative_std_dev() * 100.0
            ));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use crate::volume::{AtomCount, VolumeEstimate};

    fn results_with(atoms: Vec<AtomCount>) -> VolumeResults {
        VolumeResults {
            run_id: "norm".into(),
            bounds: BoundingBox::cube(1.0).unwrap(),
            samples: 100,
            iterations: 1,
            seed: 1,
            streams: 1,
            trigger: None,
            domains: vec![VolumeEstimate {
                domain: DomainId::cell(1),
                hits: 50,
                volume: Measurement::new(4.0, 0.2),
                undersampled: false,
                atoms,
            }],
        }
    }

    fn u235_atoms(mean: f64, std: f64) -> AtomCount {
        AtomCount {
            nuclide: Nuclide::u235(),
            atoms: Measurement::new(mean, std),
        }
    }

    #[test]
    fn test_normalize_scenario() {
        // 1% tally, 5% atom count → 5.1%
        let res = results_with(vec![u235_atoms(2.0, 0.1)]);
        let norm = TallyNormalizer::new(&res);
        let t = ReactionTally::new(DomainId::cell(1), Score::Total, 1.0, 0.01)
            .for_nuclide(Nuclide::u235());

        let q = norm.normalize(&t).unwrap();
        assert!((q.mean - 0.5).abs() < 1e-12);
        let expected = (0.01f64.powi(2) + 0.05f64.powi(2)).sqrt();
        assert!((q.relative_std_dev() - expected).abs() < 1e-12);
        assert!((q.relative_std_dev() - 0.051).abs() < 1e-3);
        assert_eq!(q.nuclide, Some(Nuclide::u235()));
    }

    #[test]
    fn test_zero_rate_has_finite_uncertainty() {
        let res = results_with(vec![u235_atoms(2.0, 0.1)]);
        let norm = TallyNormalizer::new(&res);
        let t = ReactionTally::new(DomainId::cell(1), Score::Fission, 0.0, 0.04)
            .for_nuclide(Nuclide::u235());
        let q = norm.normalize(&t).unwrap();
        assert_eq!(q.mean, 0.0);
        assert!((q.std_dev - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_total_atoms_without_nuclide() {
        let res = results_with(vec![
            u235_atoms(2.0, 0.1),
            AtomCount {
                nuclide: Nuclide::u238(),
                atoms: Measurement::new(6.0, 0.3),
            },
        ]);
        let norm = TallyNormalizer::new(&res);
        let t = ReactionTally::new(DomainId::cell(1), Score::Absorption, 4.0, 0.0);

        let atoms = norm.atom_count(&t).unwrap();
        assert!((atoms.mean - 8.0).abs() < 1e-12);
        assert!((atoms.std_dev - 0.4).abs() < 1e-12);
        let q = norm.normalize(&t).unwrap();
        assert!((q.mean - 0.5).abs() < 1e-12);
        assert!((q.relative_std_dev() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_missing_volume_data() {
        let res = results_with(vec![u235_atoms(2.0, 0.1)]);
        let norm = TallyNormalizer::new(&res);

        let other_domain = ReactionTally::new(DomainId::cell(2), Score::Total, 1.0, 0.1);
        assert!(matches!(
            norm.normalize(&other_domain),
            Err(Error::MissingVolumeData { nuclide: None, .. })
        ));

        let other_nuclide =
            ReactionTally::new(DomainId::cell(1), Score::Total, 1.0, 0.1)
                .for_nuclide(Nuclide::o16());
        assert!(matches!(
            norm.normalize(&other_nuclide),
            Err(Error::MissingVolumeData { nuclide: Some(_), .. })
        ));

        // Volume known but no composition
        let bare = results_with(vec![]);
        let norm = TallyNormalizer::new(&bare);
        let t = ReactionTally::new(DomainId::cell(1), Score::Total, 1.0, 0.1);
        assert!(matches!(norm.normalize(&t), Err(Error::MissingVolumeData { .. })));
    }

    #[test]
    fn test_divide_by_zero() {
        let res = results_with(vec![u235_atoms(0.0, 0.0)]);
        let norm = TallyNormalizer::new(&res);
        let t = ReactionTally::new(DomainId::cell(1), Score::Total, 1.0, 0.1)
            .for_nuclide(Nuclide::u235());
        assert!(matches!(norm.normalize(&t), Err(Error::DivideByZero { .. })));
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let res = results_with(vec![u235_atoms(2.0, 0.1)]);
        let norm = TallyNormalizer::new(&res);
        let tallies = vec![
            ReactionTally::new(DomainId::cell(9), Score::Total, 1.0, 0.1),
            ReactionTally::new(DomainId::cell(1), Score::Total, 1.0, 0.1)
                .for_nuclide(Nuclide::u235()),
        ];
        let out = norm.normalize_all(&tallies);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_err());
        assert!(out[1].is_ok());
    }

    #[test]
    fn test_multiple_runs() {
        let first = results_with(vec![u235_atoms(2.0, 0.1)]);
        let mut second = results_with(vec![u235_atoms(10.0, 0.1)]);
        second.domains[0].domain = DomainId::cell(2);
        let runs = vec![first, second];

        let norm = TallyNormalizer::from_runs(&runs);
        let t = ReactionTally::new(DomainId::cell(2), Score::Total, 5.0, 0.0)
            .for_nuclide(Nuclide::u235());
        assert!((norm.normalize(&t).unwrap().mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_group_table() {
        let res = results_with(vec![u235_atoms(2.0, 0.1)]);
        let norm = TallyNormalizer::new(&res);
        let tallies: Vec<ReactionTally> = [(1, 4.0), (0, 2.0)]
            .into_iter()
            .map(|(g, m)| {
                ReactionTally::new(DomainId::cell(1), Score::Fission, m, 0.0)
                    .for_nuclide(Nuclide::u235())
                    .in_group(g)
            })
            .chain(std::iter::once(
                ReactionTally::new(DomainId::cell(1), Score::Scatter, 1.0, 0.0)
                    .for_nuclide(Nuclide::u235())
                    .in_group(0),
            ))
            .collect();
        let quantities: Vec<_> = norm.normalize_all(&tallies).into_iter().flatten().collect();

        let table = GroupTable::collect(
            &quantities,
            DomainId::cell(1),
            Some(Nuclide::u235()),
            Score::Fission,
        );
        assert_eq!(table.values.len(), 2);
        assert_eq!(table.values[0].0, 0);
        assert!((table.get(0).unwrap().mean - 1.0).abs() < 1e-12);
        assert!((table.get(1).unwrap().mean - 2.0).abs() < 1e-12);

        let text = table.render(Some(&EnergyGroups::two_group()));
        assert!(text.contains("U235"));
        assert!(text.contains("group   1"));
    }
}
