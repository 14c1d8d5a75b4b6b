//! # Core Types
//!
//! Fundamental types shared by the geometry, volume and tally modules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stochastic::RandomGenerator;

// ============================================================================
// VECTOR TYPES (3D)
// ============================================================================

/// 3D point / direction (cm)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Broadcast a scalar to all components
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Magnitude squared
    pub fn mag_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// True when every component is finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z)
    pub fn axis(&self, i: usize) -> f64 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Component-wise minimum
    pub fn min(&self, other: &Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum
    pub fn max(&self, other: &Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6}, {:.6})", self.x, self.y, self.z)
    }
}

// ============================================================================
// BOUNDING BOX
// ============================================================================

/// Axis-aligned box that contains every sampled point of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl BoundingBox {
    /// Create a box, rejecting non-finite, inverted or zero-width corners
    pub fn new(lower: Vec3, upper: Vec3) -> Result<Self> {
        let bbox = Self { lower, upper };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Cube of half-width `h` centred on the origin
    pub fn cube(h: f64) -> Result<Self> {
        Self::new(Vec3::splat(-h), Vec3::splat(h))
    }

    /// Check the corner invariant (boxes built by hand or deserialized)
    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(Error::InvalidInput(format!(
                "bounding box corners must be finite: {} .. {}",
                self.lower, self.upper
            )));
        }
        for i in 0..3 {
            if self.lower.axis(i) >= self.upper.axis(i) {
                return Err(Error::InvalidInput(format!(
                    "bounding box is degenerate or inverted on axis {}: {} .. {}",
                    i, self.lower, self.upper
                )));
            }
        }
        if !self.width().is_finite() || !self.volume().is_finite() {
            return Err(Error::InvalidInput(format!(
                "bounding box extent overflows: {} .. {}",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Edge lengths
    pub fn width(&self) -> Vec3 {
        self.upper - self.lower
    }

    /// Box volume (cm³)
    pub fn volume(&self) -> f64 {
        let w = self.width();
        w.x * w.y * w.z
    }

    /// Closed containment test
    pub fn contains(&self, p: &Vec3) -> bool {
        (0..3).all(|i| p.axis(i) >= self.lower.axis(i) && p.axis(i) <= self.upper.axis(i))
    }

    /// Smallest box enclosing both
    pub fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(&other.lower),
            upper: self.upper.max(&other.upper),
        }
    }

    /// Overlap of both boxes (`None` when they do not overlap with positive volume)
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let bbox = Self {
            lower: self.lower.max(&other.lower),
            upper: self.upper.min(&other.upper),
        };
        (0..3)
            .all(|i| bbox.lower.axis(i) < bbox.upper.axis(i))
            .then_some(bbox)
    }

    /// Draw one uniform point (x, y, z drawn in that order)
    #[inline]
    pub fn sample(&self, rng: &mut RandomGenerator) -> Vec3 {
        let x = rng.uniform_range(self.lower.x, self.upper.x);
        let y = rng.uniform_range(self.lower.y, self.upper.y);
        let z = rng.uniform_range(self.lower.z, self.upper.z);
        Vec3::new(x, y, z)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.lower, self.upper)
    }
}

// ============================================================================
// DOMAINS
// ============================================================================

/// What kind of region a domain identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Cell,
    Material,
    Universe,
}

impl DomainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKind::Cell => "cell",
            DomainKind::Material => "material",
            DomainKind::Universe => "universe",
        }
    }
}

/// Named region of space: a cell, a material region or a universe
///
/// Serialized as `"<kind>:<id>"`, e.g. `"cell:3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainId {
    pub kind: DomainKind,
    pub id: u32,
}

impl DomainId {
    pub const fn cell(id: u32) -> Self {
        Self { kind: DomainKind::Cell, id }
    }

    pub const fn material(id: u32) -> Self {
        Self { kind: DomainKind::Material, id }
    }

    pub const fn universe(id: u32) -> Self {
        Self { kind: DomainKind::Universe, id }
    }

    /// Storage key, `"cell:3"`
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.id)
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

impl FromStr for DomainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| {
                Error::InvalidInput(format!("domain '{}' is not of the form kind:id", s))
            })?;
        let kind = match kind.trim() {
            "cell" => DomainKind::Cell,
            "material" => DomainKind::Material,
            "universe" => DomainKind::Universe,
            other => {
                return Err(Error::InvalidInput(format!("unknown domain kind '{}'", other)));
            }
        };
        let id = id
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::InvalidInput(format!("domain '{}': {}", s, e)))?;
        Ok(Self { kind, id })
    }
}

impl TryFrom<String> for DomainId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DomainId> for String {
    fn from(d: DomainId) -> Self {
        d.key()
    }
}

/// Set of domains containing a point, as returned by a geometry lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    members: Vec<DomainId>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (no-op if already present)
    pub fn insert(&mut self, d: DomainId) {
        if !self.members.contains(&d) {
            self.members.push(d);
        }
    }

    pub fn contains(&self, d: &DomainId) -> bool {
        self.members.contains(d)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainId> {
        self.members.iter()
    }
}

impl FromIterator<DomainId> for DomainSet {
    fn from_iter<I: IntoIterator<Item = DomainId>>(iter: I) -> Self {
        let mut set = Self::new();
        for d in iter {
            set.insert(d);
        }
        set
    }
}
