//! # Constants
//!
//! Unit conversions and run defaults. Lengths are in cm, atom densities in
//! atoms/barn-cm, volumes in cm³ (the usual neutronics conventions).

// ============================================================================
// UNIT CONVERSIONS
// ============================================================================

/// Barns per cm² (1 barn = 10⁻²⁴ cm²)
pub const BARNS_PER_CM2: f64 = 1.0e24;

// ============================================================================
// RUN DEFAULTS
// ============================================================================

/// Default seed (reproducible runs unless asked otherwise)
pub const DEFAULT_SEED: u64 = 1;

/// Default number of independent random streams per iteration
pub const DEFAULT_STREAMS: usize = 16;

/// Draws between cancellation checks inside a stream
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Default cap on trigger iterations
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Maximum universe nesting depth before a fill chain is treated as cyclic
pub const MAX_UNIVERSE_DEPTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barn_conversion() {
        // 0.05 atoms/b-cm ≈ 5e22 atoms/cm³ (typical solid)
        let n = 0.05 * BARNS_PER_CM2;
        assert!((n - 5.0e22).abs() / 5.0e22 < 1e-12);
    }
}
