//! # Geometry Module
//!
//! Constructive solid geometry (CSG) and point location.
//!
//! A model is a tree of universes. Each universe is the set of cells that
//! declare it as their parent; each cell is a CSG region with a fill
//! (a material, another universe, or void). Locating a point walks the
//! tree from the root universe and reports every domain on the path:
//!
//! ```text
//! universe 0 ─┬─ cell 1 (fill: universe 10) ─┬─ cell 11 (fill: material 1)
//!             │                               └─ cell 12 (fill: material 2)
//!             └─ cell 2 (fill: material 3)
//!
//! locate(p in cell 11) = { universe 0, cell 1, universe 10, cell 11, material 1 }
//! ```
//!
//! Nested domains therefore share sampled points: a hit in cell 11 is
//! also a hit in universe 0 and cell 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_UNIVERSE_DEPTH;
use crate::error::{Error as CrateError, Result};
use crate::materials::{Material, MaterialRegistry};
use crate::types::{BoundingBox, DomainId, DomainKind, DomainSet, Vec3};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure of a membership test for one point
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("point {0} has non-finite coordinates")]
    NonFinitePoint(Vec3),

    #[error("universe {0} is not defined")]
    UnknownUniverse(u32),

    #[error("cells {first} and {second} overlap at {point}")]
    Overlap { point: Vec3, first: u32, second: u32 },

    #[error("universe nesting deeper than {max} at {point} (cyclic fill?)")]
    MaxDepthExceeded { point: Vec3, max: usize },
}

// ============================================================================
// SURFACES AND REGIONS
// ============================================================================

/// Surface primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Plane: ax + by + cz = d
    Plane { normal: Vec3, d: f64 },
    /// x = x0
    XPlane { x0: f64 },
    /// y = y0
    YPlane { y0: f64 },
    /// z = z0
    ZPlane { z0: f64 },
    /// Sphere: (x-x0)² + (y-y0)² + (z-z0)² = R²
    Sphere { center: Vec3, radius: f64 },
    /// Cylinder along Z: (x-x0)² + (y-y0)² = R²
    CylinderZ { center: (f64, f64), radius: f64 },
    /// Torus along Z: (sqrt(x² + y²) - R)² + z² = r²
    TorusZ { major_radius: f64, minor_radius: f64 },
    /// General quadric: Ax² + By² + Cz² + Dxy + Eyz + Fxz + Gx + Hy + Iz + J = 0
    Quadric { coeffs: [f64; 10] },
}

impl Surface {
    /// Evaluate surface equation (negative = inside, positive = outside)
    pub fn sense(&self, p: &Vec3) -> f64 {
        match self {
            Surface::Plane { normal, d } => normal.dot(p) - d,
            Surface::XPlane { x0 } => p.x - x0,
            Surface::YPlane { y0 } => p.y - y0,
            Surface::ZPlane { z0 } => p.z - z0,
            Surface::Sphere { center, radius } => {
                (*p - *center).mag_squared() - radius * radius
            }
            Surface::CylinderZ { center, radius } => {
                let dx = p.x - center.0;
                let dy = p.y - center.1;
                dx * dx + dy * dy - radius * radius
            }
            Surface::TorusZ { major_radius, minor_radius } => {
                let rho = (p.x * p.x + p.y * p.y).sqrt();
                let d = rho - major_radius;
                d * d + p.z * p.z - minor_radius * minor_radius
            }
            Surface::Quadric { coeffs } => {
                let [a, b, c, d, e, f, g, h, i, j] = coeffs;
                a * p.x * p.x + b * p.y * p.y + c * p.z * p.z +
                d * p.x * p.y + e * p.y * p.z + f * p.x * p.z +
                g * p.x + h * p.y + i * p.z + j
            }
        }
    }

    /// Axis-aligned extent of the negative half-space (infinite where unbounded)
    fn inside_extent(&self) -> Extent {
        match self {
            Surface::XPlane { x0 } => Extent::unbounded().with_upper(0, *x0),
            Surface::YPlane { y0 } => Extent::unbounded().with_upper(1, *y0),
            Surface::ZPlane { z0 } => Extent::unbounded().with_upper(2, *z0),
            Surface::Sphere { center, radius } => Extent {
                lower: *center - Vec3::splat(*radius),
                upper: *center + Vec3::splat(*radius),
            },
            Surface::CylinderZ { center, radius } => Extent {
                lower: Vec3::new(center.0 - radius, center.1 - radius, f64::NEG_INFINITY),
                upper: Vec3::new(center.0 + radius, center.1 + radius, f64::INFINITY),
            },
            Surface::TorusZ { major_radius, minor_radius } => {
                let r = major_radius + minor_radius;
                Extent {
                    lower: Vec3::new(-r, -r, -minor_radius),
                    upper: Vec3::new(r, r, *minor_radius),
                }
            }
            Surface::Plane { .. } | Surface::Quadric { .. } => Extent::unbounded(),
        }
    }

    /// Axis-aligned extent of the positive half-space
    fn outside_extent(&self) -> Extent {
        match self {
            Surface::XPlane { x0 } => Extent::unbounded().with_lower(0, *x0),
            Surface::YPlane { y0 } => Extent::unbounded().with_lower(1, *y0),
            Surface::ZPlane { z0 } => Extent::unbounded().with_lower(2, *z0),
            _ => Extent::unbounded(),
        }
    }
}

/// Region definition (CSG)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Inside a surface (negative sense)
    Inside(Surface),
    /// Outside a surface (positive sense)
    Outside(Surface),
    /// Intersection (AND)
    Intersection(Vec<Region>),
    /// Union (OR)
    Union(Vec<Region>),
    /// Complement (NOT)
    Complement(Box<Region>),
}

impl Region {
    /// Check if point is inside region
    pub fn contains(&self, p: &Vec3) -> bool {
        match self {
            Region::Inside(s) => s.sense(p) < 0.0,
            Region::Outside(s) => s.sense(p) > 0.0,
            Region::Intersection(regions) => regions.iter().all(|r| r.contains(p)),
            Region::Union(regions) => regions.iter().any(|r| r.contains(p)),
            Region::Complement(r) => !r.contains(p),
        }
    }

    /// Conservative axis-aligned bounds, `None` if unbounded
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.extent().to_bbox()
    }

    fn extent(&self) -> Extent {
        match self {
            Region::Inside(s) => s.inside_extent(),
            Region::Outside(s) => s.outside_extent(),
            Region::Intersection(regions) => regions
                .iter()
                .fold(Extent::unbounded(), |acc, r| acc.intersect(&r.extent())),
            Region::Union(regions) => regions
                .iter()
                .map(Region::extent)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(Extent::unbounded),
            Region::Complement(_) => Extent::unbounded(),
        }
    }
}

/// Box with possibly infinite faces
#[derive(Debug, Clone, Copy)]
struct Extent {
    lower: Vec3,
    upper: Vec3,
}

impl Extent {
    fn unbounded() -> Self {
        Self {
            lower: Vec3::splat(f64::NEG_INFINITY),
            upper: Vec3::splat(f64::INFINITY),
        }
    }

    fn with_lower(mut self, axis: usize, v: f64) -> Self {
        match axis {
            0 => self.lower.x = v,
            1 => self.lower.y = v,
            _ => self.lower.z = v,
        }
        self
    }

    fn with_upper(mut self, axis: usize, v: f64) -> Self {
        match axis {
            0 => self.upper.x = v,
            1 => self.upper.y = v,
            _ => self.upper.z = v,
        }
        self
    }

    fn intersect(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.max(&other.lower),
            upper: self.upper.min(&other.upper),
        }
    }

    fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(&other.lower),
            upper: self.upper.max(&other.upper),
        }
    }

    fn to_bbox(self) -> Option<BoundingBox> {
        BoundingBox::new(self.lower, self.upper).ok()
    }
}

// ============================================================================
// CELLS AND UNIVERSES
// ============================================================================

/// What fills a cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Material(u32),
    Universe(u32),
    #[default]
    Void,
}

/// Geometry cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cell {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Universe this cell belongs to
    #[serde(default)]
    pub universe: u32,
    #[serde(default)]
    pub fill: Fill,
    pub region: Region,
}

impl Cell {
    pub fn new(id: u32, universe: u32, fill: Fill, region: Region) -> Self {
        Self {
            id,
            name: String::new(),
            universe,
            fill,
            region,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }
}

/// CSG model: cells grouped into universes, plus the materials they reference
#[derive(Debug, Clone)]
pub struct Geometry {
    root: u32,
    cells: Vec<Cell>,
    materials: BTreeMap<u32, Material>,
    /// universe id → indices into `cells`, in declaration order
    universes: BTreeMap<u32, Vec<usize>>,
    /// Report overlapping cells instead of taking the first match
    pub check_overlaps: bool,
}

impl Geometry {
    /// Build and validate a model
    ///
    /// Rejects repeated cell or material ids, fills that reference unknown
    /// materials or universes, and a root universe with no cells.
    pub fn new(root: u32, cells: Vec<Cell>, materials: Vec<Material>) -> Result<Self> {
        let mut universes: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, cell) in cells.iter().enumerate() {
            if cells[..i].iter().any(|c| c.id == cell.id) {
                return Err(CrateError::InvalidInput(format!("cell {} defined twice", cell.id)));
            }
            universes.entry(cell.universe).or_default().push(i);
        }

        let mut by_id = BTreeMap::new();
        for material in materials {
            material.validate()?;
            let id = material.id;
            if by_id.insert(id, material).is_some() {
                return Err(CrateError::InvalidInput(format!("material {} defined twice", id)));
            }
        }

        if !universes.contains_key(&root) {
            return Err(GeometryError::UnknownUniverse(root).into());
        }
        for cell in &cells {
            match cell.fill {
                Fill::Material(m) if !by_id.contains_key(&m) => {
                    return Err(CrateError::InvalidInput(format!(
                        "cell {} is filled with undefined material {}",
                        cell.id, m
                    )));
                }
                Fill::Universe(u) if !universes.contains_key(&u) => {
                    return Err(GeometryError::UnknownUniverse(u).into());
                }
                _ => {}
            }
        }

        Ok(Self {
            root,
            cells,
            materials: by_id,
            universes,
            check_overlaps: false,
        })
    }

    pub fn with_overlap_check(mut self, enabled: bool) -> Self {
        self.check_overlaps = enabled;
        self
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: u32) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id == id)
    }

    pub fn material(&self, id: u32) -> Option<&Material> {
        self.materials.get(&id)
    }

    /// Membership test view of one domain of this model
    pub fn domain(&self, id: DomainId) -> Result<GeometryDomain<'_>> {
        if !self.has_domain(&id) {
            return Err(CrateError::InvalidInput(format!("{} is not part of the geometry", id)));
        }
        Ok(GeometryDomain { geometry: self, id })
    }

    /// Find the cell of `universe` that contains `p`
    fn find_cell(
        &self,
        universe: u32,
        p: &Vec3,
    ) -> std::result::Result<Option<&Cell>, GeometryError> {
        let members = self
            .universes
            .get(&universe)
            .ok_or(GeometryError::UnknownUniverse(universe))?;

        let mut found: Option<&Cell> = None;
        for &i in members {
            let cell = &self.cells[i];
            if !cell.region.contains(p) {
                continue;
            }
            match found {
                None if !self.check_overlaps => return Ok(Some(cell)),
                None => found = Some(cell),
                Some(first) => {
                    return Err(GeometryError::Overlap {
                        point: *p,
                        first: first.id,
                        second: cell.id,
                    });
                }
            }
        }
        Ok(found)
    }
}

// ============================================================================
// DOMAIN CAPABILITIES
// ============================================================================

/// Anything with an identifier and a point-membership test
pub trait SpatialDomain: Send + Sync {
    fn id(&self) -> DomainId;

    /// Pure, deterministic membership test
    fn contains(&self, p: &Vec3) -> std::result::Result<bool, GeometryError>;
}

/// Point-location collaborator consumed by the volume estimator
pub trait GeometryService: Sync {
    /// All domains containing `p` (nested domains included)
    fn locate(&self, p: &Vec3) -> std::result::Result<DomainSet, GeometryError>;

    /// Membership of one domain
    fn contains(&self, domain: &DomainId, p: &Vec3) -> std::result::Result<bool, GeometryError> {
        Ok(self.locate(p)?.contains(domain))
    }

    /// Whether `domain` can ever be reported by `locate`
    fn has_domain(&self, domain: &DomainId) -> bool;

    /// Box enclosing the whole model, if it can be derived
    fn bounding_box(&self) -> Option<BoundingBox> {
        None
    }
}

impl GeometryService for Geometry {
    fn locate(&self, p: &Vec3) -> std::result::Result<DomainSet, GeometryError> {
        if !p.is_finite() {
            return Err(GeometryError::NonFinitePoint(*p));
        }

        let mut set = DomainSet::new();
        let mut universe = self.root;
        for _ in 0..MAX_UNIVERSE_DEPTH {
            let Some(cell) = self.find_cell(universe, p)? else {
                return Ok(set);
            };
            set.insert(DomainId::universe(universe));
            set.insert(DomainId::cell(cell.id));
            match cell.fill {
                Fill::Material(m) => {
                    set.insert(DomainId::material(m));
                    return Ok(set);
                }
                Fill::Void => return Ok(set),
                Fill::Universe(u) => universe = u,
            }
        }

        Err(GeometryError::MaxDepthExceeded {
            point: *p,
            max: MAX_UNIVERSE_DEPTH,
        })
    }

    fn has_domain(&self, domain: &DomainId) -> bool {
        match domain.kind {
            DomainKind::Cell => self.cell(domain.id).is_some(),
            DomainKind::Material => self.materials.contains_key(&domain.id),
            DomainKind::Universe => self.universes.contains_key(&domain.id),
        }
    }

    /// Union of the root cells' bounds
    fn bounding_box(&self) -> Option<BoundingBox> {
        self.universes
            .get(&self.root)?
            .iter()
            .map(|&i| self.cells[i].region.bounding_box())
            .try_fold(None::<BoundingBox>, |acc, b| {
                let b = b?;
                Some(Some(match acc {
                    Some(a) => a.union(&b),
                    None => b,
                }))
            })
            .flatten()
    }
}

impl MaterialRegistry for Geometry {
    fn composition(&self, domain: &DomainId) -> Option<&Material> {
        match domain.kind {
            DomainKind::Material => self.materials.get(&domain.id),
            DomainKind::Cell => match self.cell(domain.id)?.fill {
                Fill::Material(m) => self.materials.get(&m),
                _ => None,
            },
            DomainKind::Universe => None,
        }
    }
}

/// One domain of a `Geometry`, usable as a standalone membership test
#[derive(Debug, Clone, Copy)]
pub struct GeometryDomain<'g> {
    geometry: &'g Geometry,
    id: DomainId,
}

impl SpatialDomain for GeometryDomain<'_> {
    fn id(&self) -> DomainId {
        self.id
    }

    fn contains(&self, p: &Vec3) -> std::result::Result<bool, GeometryError> {
        GeometryService::contains(self.geometry, &self.id, p)
    }
}

/// A domain given directly by a CSG region, outside any universe tree
#[derive(Debug, Clone)]
pub struct RegionDomain {
    pub id: DomainId,
    pub region: Region,
}

impl RegionDomain {
    pub fn new(id: DomainId, region: Region) -> Self {
        Self { id, region }
    }
}

impl SpatialDomain for RegionDomain {
    fn id(&self) -> DomainId {
        self.id
    }

    fn contains(&self, p: &Vec3) -> std::result::Result<bool, GeometryError> {
        if !p.is_finite() {
            return Err(GeometryError::NonFinitePoint(*p));
        }
        Ok(self.region.contains(p))
    }
}

/// Flat list of independent domains; `locate` tests each one
#[derive(Default)]
pub struct DomainList {
    domains: Vec<Box<dyn SpatialDomain>>,
}

impl DomainList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: impl SpatialDomain + 'static) -> Self {
        self.domains.push(Box::new(domain));
        self
    }

    pub fn push(&mut self, domain: Box<dyn SpatialDomain>) {
        self.domains.push(domain);
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl GeometryService for DomainList {
    fn locate(&self, p: &Vec3) -> std::result::Result<DomainSet, GeometryError> {
        let mut set = DomainSet::new();
        for d in &self.domains {
            if d.contains(p)? {
                set.insert(d.id());
            }
        }
        Ok(set)
    }

    fn contains(&self, domain: &DomainId, p: &Vec3) -> std::result::Result<bool, GeometryError> {
        match self.domains.iter().find(|d| d.id() == *domain) {
            Some(d) => d.contains(p),
            None => Ok(false),
        }
    }

    fn has_domain(&self, domain: &DomainId) -> bool {
        self.domains.iter().any(|d| d.id() == *domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(r: f64) -> Surface {
        Surface::Sphere { center: Vec3::zero(), radius: r }
    }

    /// Pin-in-box: universe 10 = fuel sphere + water shell, placed in cell 1
    fn nested_model() -> Geometry {
        let box_region = Region::Intersection(vec![
            Region::Outside(Surface::XPlane { x0: -10.0 }),
            Region::Inside(Surface::XPlane { x0: 10.0 }),
            Region::Outside(Surface::YPlane { y0: -10.0 }),
            Region::Inside(Surface::YPlane { y0: 10.0 }),
            Region::Outside(Surface::ZPlane { z0: -10.0 }),
            Region::Inside(Surface::ZPlane { z0: 10.0 }),
        ]);
        let cells = vec![
            Cell::new(1, 0, Fill::Universe(10), Region::Inside(sphere(8.0))).named("pin"),
            Cell::new(
                2,
                0,
                Fill::Material(3),
                Region::Intersection(vec![box_region, Region::Outside(sphere(8.0))]),
            ),
            Cell::new(11, 10, Fill::Material(1), Region::Inside(sphere(4.0))),
            Cell::new(12, 10, Fill::Material(2), Region::Outside(sphere(4.0))),
        ];
        let materials = vec![
            Material::li4sio4_enriched(1),
            Material::water(2),
            Material::eurofer97(3),
        ];
        Geometry::new(0, cells, materials).unwrap()
    }

    #[test]
    fn test_surface_sphere() {
        let s = sphere(10.0);

        // Point inside
        assert!(s.sense(&Vec3::new(5.0, 0.0, 0.0)) < 0.0);
        // Point outside
        assert!(s.sense(&Vec3::new(15.0, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_region_csg() {
        let shell = Region::Intersection(vec![
            Region::Inside(sphere(10.0)),
            Region::Outside(sphere(5.0)),
        ]);
        assert!(shell.contains(&Vec3::new(7.0, 0.0, 0.0)));
        assert!(!shell.contains(&Vec3::new(1.0, 0.0, 0.0)));
        assert!(!shell.contains(&Vec3::new(11.0, 0.0, 0.0)));

        let not_shell = Region::Complement(Box::new(shell));
        assert!(not_shell.contains(&Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_region_bounding_box() {
        let b = Region::Inside(sphere(5.0)).bounding_box().unwrap();
        assert_eq!(b.volume(), 1000.0);

        // Cylinder is unbounded until capped by planes
        let cyl = Surface::CylinderZ { center: (0.0, 0.0), radius: 1.0 };
        assert!(Region::Inside(cyl.clone()).bounding_box().is_none());
        let capped = Region::Intersection(vec![
            Region::Inside(cyl),
            Region::Outside(Surface::ZPlane { z0: -2.0 }),
            Region::Inside(Surface::ZPlane { z0: 3.0 }),
        ]);
        let b = capped.bounding_box().unwrap();
        assert_eq!(b.volume(), 2.0 * 2.0 * 5.0);

        assert!(Region::Outside(sphere(5.0)).bounding_box().is_none());
    }

    #[test]
    fn test_locate_nested() {
        let geom = nested_model();

        let fuel = geom.locate(&Vec3::new(1.0, 0.0, 0.0)).unwrap();
        for d in [
            DomainId::universe(0),
            DomainId::cell(1),
            DomainId::universe(10),
            DomainId::cell(11),
            DomainId::material(1),
        ] {
            assert!(fuel.contains(&d), "{} missing", d);
        }
        assert!(!fuel.contains(&DomainId::cell(12)));

        let steel = geom.locate(&Vec3::new(9.0, 9.0, 9.0)).unwrap();
        assert!(steel.contains(&DomainId::cell(2)));
        assert!(steel.contains(&DomainId::material(3)));
        assert!(!steel.contains(&DomainId::universe(10)));

        let outside = geom.locate(&Vec3::new(20.0, 0.0, 0.0)).unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn test_locate_errors() {
        let geom = nested_model();
        let nan = geom.locate(&Vec3::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(nan, Err(GeometryError::NonFinitePoint(_))));

        // Two root cells claiming the origin
        let cells = vec![
            Cell::new(1, 0, Fill::Void, Region::Inside(sphere(2.0))),
            Cell::new(2, 0, Fill::Void, Region::Inside(sphere(3.0))),
        ];
        let geom = Geometry::new(0, cells, vec![]).unwrap();
        assert!(geom.locate(&Vec3::zero()).is_ok());
        let geom = geom.with_overlap_check(true);
        assert!(matches!(
            geom.locate(&Vec3::zero()),
            Err(GeometryError::Overlap { first: 1, second: 2, .. })
        ));

        // Universe filled with itself
        let cells = vec![Cell::new(1, 0, Fill::Universe(0), Region::Inside(sphere(1.0)))];
        let geom = Geometry::new(0, cells, vec![]).unwrap();
        assert!(matches!(
            geom.locate(&Vec3::zero()),
            Err(GeometryError::MaxDepthExceeded { .. })
        ));
    }

    #[test]
    fn test_geometry_validation() {
        let cells = vec![
            Cell::new(1, 0, Fill::Void, Region::Inside(sphere(1.0))),
            Cell::new(1, 0, Fill::Void, Region::Inside(sphere(2.0))),
        ];
        assert!(matches!(Geometry::new(0, cells, vec![]), Err(CrateError::InvalidInput(_))));

        let cells = vec![Cell::new(1, 0, Fill::Material(9), Region::Inside(sphere(1.0)))];
        assert!(matches!(Geometry::new(0, cells, vec![]), Err(CrateError::InvalidInput(_))));

        let cells = vec![Cell::new(1, 0, Fill::Universe(5), Region::Inside(sphere(1.0)))];
        assert!(matches!(
            Geometry::new(0, cells, vec![]),
            Err(CrateError::Geometry(GeometryError::UnknownUniverse(5)))
        ));

        let cells = vec![Cell::new(1, 3, Fill::Void, Region::Inside(sphere(1.0)))];
        assert!(Geometry::new(0, cells, vec![]).is_err());
    }

    #[test]
    fn test_geometry_bounding_box_and_registry() {
        let geom = nested_model();
        let b = geom.bounding_box().unwrap();
        assert_eq!(b.volume(), 8000.0);

        assert!(geom.has_domain(&DomainId::universe(10)));
        assert!(!geom.has_domain(&DomainId::cell(99)));

        assert_eq!(geom.composition(&DomainId::cell(11)).unwrap().id, 1);
        assert_eq!(geom.composition(&DomainId::material(2)).unwrap().id, 2);
        assert!(geom.composition(&DomainId::cell(1)).is_none());
        assert!(geom.composition(&DomainId::universe(0)).is_none());
    }

    #[test]
    fn test_geometry_domain_view() {
        let geom = nested_model();
        let d = geom.domain(DomainId::material(1)).unwrap();
        assert!(d.contains(&Vec3::new(0.5, 0.5, 0.5)).unwrap());
        assert!(!d.contains(&Vec3::new(6.0, 0.0, 0.0)).unwrap());
        assert!(geom.domain(DomainId::material(42)).is_err());
    }

    #[test]
    fn test_domain_list() {
        let list = DomainList::new()
            .with(RegionDomain::new(DomainId::cell(1), Region::Inside(sphere(5.0))))
            .with(RegionDomain::new(DomainId::universe(0), Region::Inside(sphere(10.0))));
        assert_eq!(list.len(), 2);

        let set = list.locate(&Vec3::new(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(set.len(), 2);
        let set = list.locate(&Vec3::new(7.0, 0.0, 0.0)).unwrap();
        assert!(set.contains(&DomainId::universe(0)));
        assert!(!set.contains(&DomainId::cell(1)));

        assert!(list.has_domain(&DomainId::cell(1)));
        assert!(list.bounding_box().is_none());
    }

    #[test]
    fn test_region_from_toml() {
        let src = r#"
            id = 1
            universe = 0
            fill = { material = 1 }
            region = { intersection = [
                { inside = { sphere = { center = [0.0, 0.0, 0.0], radius = 10.0 } } },
                { outside = { z_plane = { z0 = 0.0 } } },
            ] }
        "#;
        let cell: Cell = toml::from_str(src).unwrap();
        assert_eq!(cell.fill, Fill::Material(1));
        assert!(cell.region.contains(&Vec3::new(0.0, 0.0, 5.0)));
        assert!(!cell.region.contains(&Vec3::new(0.0, 0.0, -5.0)));
    }
}
