//! Crate errors

use thiserror::Error;

use crate::geometry::GeometryError;
use crate::materials::Nuclide;
use crate::types::DomainId;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by volume estimation, persistence and tally normalization
#[derive(Debug, Error)]
pub enum Error {
    /// Bad caller-supplied parameters; rejected before any sampling
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Geometry lookup failed for a sampled point; the run produced nothing
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("no volume data for {domain}{}", nuclide_suffix(.nuclide))]
    MissingVolumeData {
        domain: DomainId,
        nuclide: Option<Nuclide>,
    },

    #[error("zero atom count for {domain}{}", nuclide_suffix(.nuclide))]
    DivideByZero {
        domain: DomainId,
        nuclide: Option<Nuclide>,
    },

    #[error("volume calculation cancelled")]
    Cancelled,

    #[error("volume run not found: {0}")]
    RunNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn nuclide_suffix(nuclide: &Option<Nuclide>) -> String {
    match nuclide {
        Some(n) => format!(" / {}", n),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = Error::MissingVolumeData {
            domain: DomainId::cell(3),
            nuclide: Some(Nuclide::new(92, 235)),
        };
        assert_eq!(e.to_string(), "no volume data for cell 3 / U235");

        let e = Error::DivideByZero {
            domain: DomainId::material(1),
            nuclide: None,
        };
        assert_eq!(e.to_string(), "zero atom count for material 1");
    }
}
