//! # Materials Module
//!
//! Nuclide identifiers and material compositions for neutronics.
//!
//! Compositions are given as absolute atom densities per nuclide
//! (atoms/barn-cm), so the atom count of a nuclide in a region is just
//! `density × 10²⁴ × V`. The volume is the only stochastic input to that
//! product.
//!
//! ## References
//!
//! - GNDS nuclide naming: `U235`, `Am242_m1`
//! - PNNL-15870 Rev. 1, "Compendium of Material Composition Data for
//!   Radiation Transport Modeling"

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DomainId;

// ============================================================================
// NUCLIDES
// ============================================================================

const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Nuclide identifier (Z, A, metastable state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nuclide {
    /// Atomic number
    pub z: u32,
    /// Mass number
    pub a: u32,
    /// Metastable level (0 = ground state)
    pub m: u32,
}

impl Nuclide {
    pub fn new(z: u32, a: u32) -> Self {
        Self { z, a, m: 0 }
    }

    pub fn metastable(z: u32, a: u32, m: u32) -> Self {
        Self { z, a, m }
    }

    /// ZAID (Z*1000 + A)
    pub fn zaid(&self) -> u32 {
        self.z * 1000 + self.a
    }

    pub fn symbol(&self) -> &'static str {
        ELEMENTS
            .get((self.z as usize).wrapping_sub(1))
            .copied()
            .unwrap_or("X")
    }

    pub fn h1() -> Self { Self::new(1, 1) }
    pub fn h2() -> Self { Self::new(1, 2) }
    pub fn li6() -> Self { Self::new(3, 6) }
    pub fn li7() -> Self { Self::new(3, 7) }
    pub fn o16() -> Self { Self::new(8, 16) }
    pub fn si28() -> Self { Self::new(14, 28) }
    pub fn cr52() -> Self { Self::new(24, 52) }
    pub fn fe56() -> Self { Self::new(26, 56) }
    pub fn w184() -> Self { Self::new(74, 184) }
    pub fn pb208() -> Self { Self::new(82, 208) }
    pub fn u235() -> Self { Self::new(92, 235) }
    pub fn u238() -> Self { Self::new(92, 238) }
}

impl fmt::Display for Nuclide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.symbol(), self.a)?;
        if self.m > 0 {
            write!(f, "_m{}", self.m)?;
        }
        Ok(())
    }
}

impl FromStr for Nuclide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidInput(format!("invalid nuclide name '{}'", s));

        let (base, m) = match s.split_once("_m") {
            Some((base, level)) => (base, level.parse::<u32>().map_err(|_| bad())?),
            None => (s, 0),
        };

        let split = base.find(|c: char| c.is_ascii_digit()).ok_or_else(bad)?;
        let (symbol, mass) = base.split_at(split);
        let z = ELEMENTS
            .iter()
            .position(|&e| e == symbol)
            .ok_or_else(bad)? as u32
            + 1;
        let a = mass.parse::<u32>().map_err(|_| bad())?;
        if a < z {
            return Err(bad());
        }

        Ok(Self { z, a, m })
    }
}

impl TryFrom<String> for Nuclide {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Nuclide> for String {
    fn from(n: Nuclide) -> Self {
        n.to_string()
    }
}

// ============================================================================
// MATERIAL COMPOSITION
// ============================================================================

/// One nuclide entry of a material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NuclideDensity {
    pub nuclide: Nuclide,
    /// Atom density (atoms/barn-cm)
    pub density: f64,
}

/// Material composition for neutronics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Material {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub nuclides: Vec<NuclideDensity>,
}

impl Material {
    /// Build from a total atom density and atom fractions
    pub fn from_fractions(
        id: u32,
        name: &str,
        atom_density: f64,
        fractions: &[(Nuclide, f64)],
    ) -> Self {
        Self {
            id,
            name: name.into(),
            nuclides: fractions
                .iter()
                .map(|&(nuclide, frac)| NuclideDensity { nuclide, density: atom_density * frac })
                .collect(),
        }
    }

    /// Total atom density (atoms/barn-cm)
    pub fn total_density(&self) -> f64 {
        self.nuclides.iter().map(|n| n.density).sum()
    }

    /// Density of one nuclide, if present
    pub fn density_of(&self, nuclide: &Nuclide) -> Option<f64> {
        self.nuclides.iter().find(|n| n.nuclide == *nuclide).map(|n| n.density)
    }

    /// Reject negative / non-finite densities and repeated nuclides
    pub fn validate(&self) -> Result<()> {
        for (i, n) in self.nuclides.iter().enumerate() {
            if !n.density.is_finite() || n.density < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "material {}: density of {} must be finite and >= 0 (got {})",
                    self.id, n.nuclide, n.density
                )));
            }
            if self.nuclides[..i].iter().any(|p| p.nuclide == n.nuclide) {
                return Err(Error::InvalidInput(format!(
                    "material {}: {} listed twice",
                    self.id, n.nuclide
                )));
            }
        }
        Ok(())
    }

    // Common fusion materials

    /// Li4SiO4 breeding ceramic (Li-6 enriched to 90%)
    pub fn li4sio4_enriched(id: u32) -> Self {
        Self::from_fractions(id, "Li4SiO4 (90% Li-6)", 0.048, &[
            (Nuclide::li6(), 0.36),
            (Nuclide::li7(), 0.04),
            (Nuclide::si28(), 0.11),
            (Nuclide::o16(), 0.49),
        ])
    }

    /// EUROFER-97 reduced activation steel
    pub fn eurofer97(id: u32) -> Self {
        Self::from_fractions(id, "EUROFER-97", 0.0847, &[
            (Nuclide::fe56(), 0.89),
            (Nuclide::cr52(), 0.09),
            (Nuclide::new(23, 51), 0.01), // V-51
            (Nuclide::w184(), 0.01),
        ])
    }

    /// Lead-lithium eutectic (Pb-17Li)
    pub fn pbli(id: u32) -> Self {
        Self::from_fractions(id, "Pb-17Li", 0.033, &[
            (Nuclide::pb208(), 0.83),
            (Nuclide::li6(), 0.153),
            (Nuclide::li7(), 0.017),
        ])
    }

    /// Water coolant
    pub fn water(id: u32) -> Self {
        Self::from_fractions(id, "H2O", 0.1003, &[
            (Nuclide::h1(), 2.0 / 3.0),
            (Nuclide::o16(), 1.0 / 3.0),
        ])
    }
}

// ============================================================================
// COMPOSITION REGISTRY
// ============================================================================

/// Source of per-domain material compositions
pub trait MaterialRegistry {
    /// Composition of a domain, `None` when it has no single material
    fn composition(&self, domain: &DomainId) -> Option<&Material>;
}

impl MaterialRegistry for BTreeMap<DomainId, Material> {
    fn composition(&self, domain: &DomainId) -> Option<&Material> {
        self.get(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nuclide_names() {
        assert_eq!(Nuclide::u235().to_string(), "U235");
        assert_eq!(Nuclide::metastable(95, 242, 1).to_string(), "Am242_m1");
        assert_eq!(Nuclide::li6().zaid(), 3006);

        assert_eq!("H1".parse::<Nuclide>().unwrap(), Nuclide::h1());
        assert_eq!("Am242_m1".parse::<Nuclide>().unwrap(), Nuclide::metastable(95, 242, 1));
        assert_eq!("Og294".parse::<Nuclide>().unwrap().z, 118);

        assert!("Xx12".parse::<Nuclide>().is_err());
        assert!("U".parse::<Nuclide>().is_err());
        assert!("U2".parse::<Nuclide>().is_err());
        assert!("U235_mx".parse::<Nuclide>().is_err());
    }

    #[test]
    fn test_nuclide_serde() {
        let json = serde_json::to_string(&Nuclide::fe56()).unwrap();
        assert_eq!(json, "\"Fe56\"");
        let n: Nuclide = serde_json::from_str("\"O16\"").unwrap();
        assert_eq!(n, Nuclide::o16());
    }

    #[test]
    fn test_material_densities() {
        let water = Material::water(1);
        assert!((water.total_density() - 0.1003).abs() < 1e-12);
        let h = water.density_of(&Nuclide::h1()).unwrap();
        assert!((h - 0.1003 * 2.0 / 3.0).abs() < 1e-12);
        assert!(water.density_of(&Nuclide::u235()).is_none());
        assert!(water.validate().is_ok());
    }

    #[test]
    fn test_material_validation() {
        let mut m = Material::eurofer97(2);
        m.nuclides[0].density = -1.0;
        assert!(matches!(m.validate(), Err(Error::InvalidInput(_))));

        let mut m = Material::pbli(3);
        m.nuclides.push(m.nuclides[0]);
        assert!(matches!(m.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_registry_map() {
        let mut reg = BTreeMap::new();
        reg.insert(DomainId::cell(5), Material::li4sio4_enriched(1));
        assert!(reg.composition(&DomainId::cell(5)).is_some());
        assert!(reg.composition(&DomainId::cell(6)).is_none());
    }
}
