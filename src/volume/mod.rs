//! # Stochastic Volume Estimation
//!
//! Monte Carlo rejection sampling of domain volumes.
//!
//! ## Method
//!
//! N points are drawn uniformly in a bounding box of volume V_box. A domain
//! hit by k of them has
//!
//! ```text
//! p̂ = k / N
//! V̂ = p̂ · V_box
//! σ(V̂) = V_box · sqrt(p̂ (1 - p̂) / N)        (binomial standard error, 1σ)
//! ```
//!
//! All requested domains are scored from the same point stream, so nested
//! domains (a cell and the universe around it) are correlated but each
//! estimate is valid on its own.
//!
//! ## Parallelism
//!
//! The N draws are split into contiguous chunks, one per random stream
//! (see `stochastic`). Chunks run on the rayon pool with private hit
//! counters that are summed after the join. The chunking depends only on
//! N and the stream count, never on the thread count, so a run is exactly
//! reproducible from (seed, streams, N).
//!
//! ## Atom Counts
//!
//! When a domain's composition is known, each nuclide's atom count
//! `n_i · 10²⁴ · V̂` is reported with `σ = n_i · 10²⁴ · σ(V̂)`. Counts, not
//! densities, are stored so consumers never divide by the stochastic
//! volume twice.

pub mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    BARNS_PER_CM2, CANCEL_CHECK_INTERVAL, DEFAULT_MAX_ITERATIONS, DEFAULT_SEED, DEFAULT_STREAMS,
};
use crate::error::{Error, Result};
use crate::geometry::GeometryService;
use crate::materials::{MaterialRegistry, Nuclide};
use crate::stochastic::RandomGenerator;
use crate::types::{BoundingBox, DomainId};

pub use store::VolumeStore;

// ============================================================================
// MEASUREMENTS
// ============================================================================

/// Mean with its standard uncertainty (1σ)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub mean: f64,
    pub std_dev: f64,
}

impl Measurement {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// σ / |mean|; infinite for a zero mean
    pub fn relative_std_dev(&self) -> f64 {
        if self.mean == 0.0 {
            f64::INFINITY
        } else {
            self.std_dev / self.mean.abs()
        }
    }

    pub fn variance(&self) -> f64 {
        self.std_dev * self.std_dev
    }

    /// Multiply by an exact constant
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.mean * factor, self.std_dev * factor.abs())
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6e} ± {:.3e}", self.mean, self.std_dev)
    }
}

// ============================================================================
// TRIGGERS
// ============================================================================

/// Which statistic a trigger bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    StdDev,
    RelErr,
    Variance,
}

/// Keep sampling in blocks of N until every domain meets the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub threshold: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl Trigger {
    pub fn new(kind: TriggerKind, threshold: f64) -> Self {
        Self {
            kind,
            threshold,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn satisfied(&self, volume: &Measurement) -> bool {
        match self.kind {
            TriggerKind::StdDev => volume.std_dev <= self.threshold,
            TriggerKind::RelErr => volume.relative_std_dev() <= self.threshold,
            TriggerKind::Variance => volume.variance() <= self.threshold,
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Atom count of one nuclide in a domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomCount {
    pub nuclide: Nuclide,
    pub atoms: Measurement,
}

/// Volume of one domain from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEstimate {
    pub domain: DomainId,
    /// Sampled points inside the domain
    pub hits: u64,
    /// Volume (cm³)
    pub volume: Measurement,
    /// Zero hits or all hits: the uncertainty is degenerate, not exact
    pub undersampled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub atoms: Vec<AtomCount>,
}

impl VolumeEstimate {
    fn from_hits(domain: DomainId, hits: u64, samples: u64, box_volume: f64) -> Self {
        let n = samples as f64;
        let p = hits as f64 / n;
        let variance = box_volume * box_volume * p * (1.0 - p) / n;

        Self {
            domain,
            hits,
            volume: Measurement::new(p * box_volume, variance.sqrt()),
            undersampled: hits == 0 || hits == samples,
            atoms: Vec::new(),
        }
    }

    fn attach_atoms(&mut self, materials: &dyn MaterialRegistry) {
        if let Some(material) = materials.composition(&self.domain) {
            self.atoms = material
                .nuclides
                .iter()
                .map(|n| AtomCount {
                    nuclide: n.nuclide,
                    atoms: self.volume.scale(n.density * BARNS_PER_CM2),
                })
                .collect();
        }
    }

    pub fn atoms_of(&self, nuclide: &Nuclide) -> Option<Measurement> {
        self.atoms.iter().find(|a| a.nuclide == *nuclide).map(|a| a.atoms)
    }

    /// Atoms of all nuclides together
    ///
    /// Every count is the same stochastic volume times an exact density, so
    /// the uncertainties are fully correlated and add linearly.
    pub fn total_atoms(&self) -> Option<Measurement> {
        if self.atoms.is_empty() {
            return None;
        }
        Some(self.atoms.iter().fold(Measurement::new(0.0, 0.0), |acc, a| {
            Measurement::new(acc.mean + a.atoms.mean, acc.std_dev + a.atoms.std_dev)
        }))
    }
}

/// Persistable outcome of one volume calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeResults {
    pub run_id: String,
    pub bounds: BoundingBox,
    /// Total samples over all iterations
    pub samples: u64,
    pub iterations: u32,
    pub seed: u64,
    pub streams: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    pub domains: Vec<VolumeEstimate>,
}

impl VolumeResults {
    pub fn get(&self, domain: &DomainId) -> Option<&VolumeEstimate> {
        self.domains.iter().find(|d| d.domain == *domain)
    }

    pub fn atoms(&self, domain: &DomainId, nuclide: &Nuclide) -> Option<Measurement> {
        self.get(domain)?.atoms_of(nuclide)
    }

    pub fn total_atoms(&self, domain: &DomainId) -> Option<Measurement> {
        self.get(domain)?.total_atoms()
    }

    /// Plain-text table, one line per domain
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("=== Volume Calculation '{}' ===\n", self.run_id));
        s.push_str(&format!("Bounding box: {}\n", self.bounds));
        s.push_str(&format!(
            "Samples: {} ({} iteration(s), {} streams, seed {})\n",
            self.samples, self.iterations, self.streams, self.seed
        ));
        for est in &self.domains {
            s.push_str(&format!(
                "{:<14} {:>14.6e} ± {:<11.4e} cm³ ({} hits){}\n",
                est.domain.to_string(),
                est.volume.mean,
                est.volume.std_dev,
                est.hits,
                if est.undersampled { "  [undersampled]" } else { "" }
            ));
            for a in &est.atoms {
                s.push_str(&format!(
                    "    {:<10} {:>14.6e} ± {:.4e} atoms\n",
                    a.nuclide.to_string(),
                    a.atoms.mean,
                    a.atoms.std_dev
                ));
            }
        }
        s
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared flag that aborts a running calculation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// CALCULATION
// ============================================================================

/// Parameters of one volume calculation
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeCalculation {
    pub run_id: String,
    /// Domains estimated together from one point stream
    pub domains: Vec<DomainId>,
    /// Samples per iteration
    pub samples: u64,
    /// `None`: take the box from the geometry
    pub bounds: Option<BoundingBox>,
    pub seed: u64,
    pub streams: usize,
    pub trigger: Option<Trigger>,
}

impl VolumeCalculation {
    pub fn new(run_id: &str, domains: Vec<DomainId>, samples: u64) -> Self {
        Self {
            run_id: run_id.into(),
            domains,
            samples,
            bounds: None,
            seed: DEFAULT_SEED,
            streams: DEFAULT_STREAMS,
            trigger: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_streams(mut self, streams: usize) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Check parameters against the geometry and resolve the bounding box
    pub fn validate<G: GeometryService + ?Sized>(&self, geometry: &G) -> Result<BoundingBox> {
        if self.domains.is_empty() {
            return Err(Error::InvalidInput("no domains requested".into()));
        }
        if self.samples == 0 {
            return Err(Error::InvalidInput("sample count must be positive".into()));
        }
        if self.streams == 0 {
            return Err(Error::InvalidInput("stream count must be positive".into()));
        }
        for (i, d) in self.domains.iter().enumerate() {
            if self.domains[..i].contains(d) {
                return Err(Error::InvalidInput(format!("{} requested twice", d)));
            }
            if !geometry.has_domain(d) {
                return Err(Error::InvalidInput(format!("{} is not part of the geometry", d)));
            }
        }
        if let Some(t) = &self.trigger {
            if !t.threshold.is_finite() || t.threshold <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "trigger threshold must be positive (got {})",
                    t.threshold
                )));
            }
            if t.max_iterations == 0 {
                return Err(Error::InvalidInput("trigger max_iterations must be positive".into()));
            }
        }

        let bounds = match self.bounds {
            Some(b) => b,
            None => geometry.bounding_box().ok_or_else(|| {
                Error::InvalidInput(
                    "no bounding box given and none derivable from the geometry".into(),
                )
            })?,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Run without atom counts or cancellation
    pub fn execute<G: GeometryService + ?Sized>(&self, geometry: &G) -> Result<VolumeResults> {
        self.execute_with(geometry, None, &CancelToken::new())
    }

    /// Run the calculation
    ///
    /// A geometry failure for any sampled point, or cancellation, aborts the
    /// whole run: no partial result is returned.
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub fn execute_with<G: GeometryService + ?Sized>(
        &self,
        geometry: &G,
        materials: Option<&dyn MaterialRegistry>,
        cancel: &CancelToken,
    ) -> Result<VolumeResults> {
        let bounds = self.validate(geometry)?;
        let box_volume = bounds.volume();
        let chunks = partition(self.samples, self.streams);
        let started = Instant::now();

        info!(
            domains = self.domains.len(),
            samples = self.samples,
            streams = chunks.len(),
            seed = self.seed,
            %bounds,
            "volume calculation starting"
        );

        let mut hits = vec![0u64; self.domains.len()];
        let mut iterations: u32 = 0;
        // Iteration j starts j long jumps past the seed
        let mut block = RandomGenerator::new(self.seed);
        let estimates = loop {
            let rngs = block.split(chunks.len());
            block.long_jump();

            let partials = chunks
                .par_iter()
                .zip(rngs)
                .enumerate()
                .map(|(i, (&n, rng))| {
                    sample_chunk(geometry, &self.domains, &bounds, rng, n, cancel).map(|counts| {
                        debug!(iteration = iterations, stream = i, samples = n, "stream finished");
                        counts
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for partial in partials {
                for (total, h) in hits.iter_mut().zip(partial) {
                    *total += h;
                }
            }
            iterations += 1;

            let total_samples = self.samples * iterations as u64;
            let estimates: Vec<VolumeEstimate> = self
                .domains
                .iter()
                .zip(&hits)
                .map(|(&d, &k)| VolumeEstimate::from_hits(d, k, total_samples, box_volume))
                .collect();

            let Some(trigger) = &self.trigger else {
                break estimates;
            };
            if estimates.iter().all(|e| trigger.satisfied(&e.volume)) {
                info!(iterations, "volume trigger satisfied");
                break estimates;
            }
            if iterations >= trigger.max_iterations {
                warn!(
                    iterations,
                    threshold = trigger.threshold,
                    "volume trigger not satisfied before max_iterations"
                );
                break estimates;
            }
            debug!(iterations, "volume trigger not yet satisfied");
        };

        let mut domains = estimates;
        for est in &mut domains {
            if est.undersampled {
                warn!(domain = %est.domain, hits = est.hits, "domain is undersampled");
            }
            if let Some(registry) = materials {
                est.attach_atoms(registry);
            }
        }

        info!(
            iterations,
            elapsed_s = started.elapsed().as_secs_f64(),
            "volume calculation complete"
        );

        Ok(VolumeResults {
            run_id: self.run_id.clone(),
            bounds,
            samples: self.samples * iterations as u64,
            iterations,
            seed: self.seed,
            streams: chunks.len(),
            trigger: self.trigger,
            domains,
        })
    }
}

/// Split `samples` into at most `streams` chunks differing by at most one
fn partition(samples: u64, streams: usize) -> Vec<u64> {
    let streams = (streams as u64).min(samples).max(1);
    let base = samples / streams;
    let extra = samples % streams;
    (0..streams).map(|i| base + u64::from(i < extra)).collect()
}

/// Draw `n` points from one private stream and count hits per domain
fn sample_chunk<G: GeometryService + ?Sized>(
    geometry: &G,
    domains: &[DomainId],
    bounds: &BoundingBox,
    mut rng: RandomGenerator,
    n: u64,
    cancel: &CancelToken,
) -> Result<Vec<u64>> {
    let mut hits = vec![0u64; domains.len()];
    for i in 0..n {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let p = bounds.sample(&mut rng);
        let found = geometry.locate(&p)?;
        for (h, d) in hits.iter_mut().zip(domains) {
            if found.contains(d) {
                *h += 1;
            }
        }
    }
    Ok(hits)
}
