//! # Run Configuration
//!
//! TOML description of one volume calculation: the CSG model, its
//! materials and the sampling parameters. Everything a run needs is in
//! this value; nothing is read from process-wide settings.
//!
//! ```toml
//! [calculation]
//! run_id = "pincell"
//! samples = 1_000_000
//! domains = ["cell:1", "universe:0"]
//!
//! [[materials]]
//! id = 1
//! nuclides = [{ nuclide = "U235", density = 1.0e-3 }]
//!
//! [geometry]
//! [[geometry.cells]]
//! id = 1
//! fill = { material = 1 }
//! region = { inside = { sphere = { center = [0, 0, 0], radius = 5.0 } } }
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::{DEFAULT_SEED, DEFAULT_STREAMS};
use crate::error::{Error, Result};
use crate::geometry::{Cell, Geometry};
use crate::materials::Material;
use crate::types::{BoundingBox, DomainId, Vec3};
use crate::volume::{Trigger, VolumeCalculation};

/// Whole run file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub calculation: CalculationConfig,
    #[serde(default)]
    pub materials: Vec<Material>,
    pub geometry: GeometryConfig,
}

/// `[calculation]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalculationConfig {
    pub run_id: String,
    pub samples: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_streams")]
    pub streams: usize,
    pub domains: Vec<DomainId>,
    #[serde(default)]
    pub lower_left: Option<Vec3>,
    #[serde(default)]
    pub upper_right: Option<Vec3>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
}

/// `[geometry]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    #[serde(default)]
    pub root: u32,
    #[serde(default)]
    pub check_overlaps: bool,
    pub cells: Vec<Cell>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_streams() -> usize {
    DEFAULT_STREAMS
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    /// Explicit box, if the file gives one
    pub fn bounds(&self) -> Result<Option<BoundingBox>> {
        match (self.calculation.lower_left, self.calculation.upper_right) {
            (Some(lower), Some(upper)) => Ok(Some(BoundingBox::new(lower, upper)?)),
            (None, None) => Ok(None),
            _ => Err(Error::Config(
                "lower_left and upper_right must be given together".into(),
            )),
        }
    }

    /// Materialize the model and the calculation
    pub fn build(&self) -> Result<(Geometry, VolumeCalculation)> {
        let geometry = Geometry::new(
            self.geometry.root,
            self.geometry.cells.clone(),
            self.materials.clone(),
        )?
        .with_overlap_check(self.geometry.check_overlaps);

        let c = &self.calculation;
        let mut calc = VolumeCalculation::new(&c.run_id, c.domains.clone(), c.samples)
            .with_seed(c.seed)
            .with_streams(c.streams);
        if let Some(bounds) = self.bounds()? {
            calc = calc.with_bounds(bounds);
        }
        if let Some(trigger) = c.trigger {
            calc = calc.with_trigger(trigger);
        }

        Ok((geometry, calc))
    }
}

impl FromStr for RunConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }
}
