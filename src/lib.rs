//! # VOLSIM-RS
//!
//! Stochastic volume estimation and microscopic tally normalization for
//! Monte Carlo neutronics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          VOLSIM-RS                                          │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  geometry   CSG cells / universes, point location (GeometryService)        │
//! │  materials  nuclides, atom densities (MaterialRegistry)                     │
//! │  volume     parallel rejection sampling → VolumeResults (+ atom counts)     │
//! │  store      JSON persistence keyed by run id                                │
//! │  tally      reaction-rate tallies, energy groups, accumulation             │
//! │  normalize  tally / atom count → microscopic quantities                    │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The volume pass runs first and is persisted; normalization later reads
//! the stored atom counts. The two stages share nothing else.
//!
//! ## Example
//!
//! ```no_run
//! use volsim_rs::geometry::{DomainList, Region, RegionDomain, Surface};
//! use volsim_rs::types::{BoundingBox, DomainId, Vec3};
//! use volsim_rs::volume::VolumeCalculation;
//!
//! let sphere = Surface::Sphere { center: Vec3::zero(), radius: 5.0 };
//! let geometry = DomainList::new()
//!     .with(RegionDomain::new(DomainId::cell(1), Region::Inside(sphere)));
//!
//! let results = VolumeCalculation::new("demo", vec![DomainId::cell(1)], 1_000_000)
//!     .with_bounds(BoundingBox::cube(10.0)?)
//!     .execute(&geometry)?;
//! println!("{}", results.summary());
//! # Ok::<(), volsim_rs::Error>(())
//! ```

pub mod constants;
pub mod types;
pub mod error;
pub mod stochastic;
pub mod geometry;
pub mod materials;
pub mod volume;
pub mod tally;
pub mod normalize;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{BoundingBox, DomainId, DomainKind, Vec3};
pub use geometry::{Geometry, GeometryService, SpatialDomain};
pub use materials::{Material, MaterialRegistry, Nuclide};
pub use volume::{VolumeCalculation, VolumeEstimate, VolumeResults, VolumeStore};
pub use tally::ReactionTally;
pub use normalize::{MicroscopicQuantity, TallyNormalizer};

/// VOLSIM version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about the library
pub fn info() -> String {
    format!(
        "VOLSIM-RS v{}\n\
         Stochastic volume estimation for Monte Carlo neutronics\n\
         Deterministic, stream-split parallel sampling in Rust",
        VERSION
    )
}
