//! # Aspect Ratio Math
//!
//! Calcoli puri sui rapporti d'aspetto, senza I/O.
//!
//! ## Responsabilità:
//! - `rationalize()`: approssima un rapporto float con la frazione `n:d` più vicina
//!   entro un denominatore massimo (es. 1.7777 → 16:9)
//! - `ratio_label()`: etichetta leggibile "W:H" a partire dalle dimensioni misurate
//! - `reduced_label()`: riduzione esatta tramite MCD (1920x1080 → 16:9)
//! - Dimensioni a zero producono sempre la sentinella `"0:0"`, mai una divisione per zero

/// Sentinel label for unknown dimensions
pub const UNKNOWN_RATIO: &str = "0:0";

/// Default denominator bound used for human-readable ratios
pub const DEFAULT_MAX_DENOMINATOR: u32 = 100;

/// Greatest common divisor (Euclid)
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Nearest `numerator:denominator` pair for `ratio` with `denominator <= max_denominator`.
///
/// Every denominator from 1 to the bound is tried with the rounded numerator; the pair
/// with the smallest error wins (the smallest denominator on ties) and is reduced by
/// the GCD. Non-finite or non-positive ratios return `(0, 0)`.
///
/// ```rust
/// use media_normalizer::aspect::rationalize;
/// assert_eq!(rationalize(16.0 / 9.0, 100), (16, 9));
/// ```
pub fn rationalize(ratio: f64, max_denominator: u32) -> (u32, u32) {
    if !ratio.is_finite() || ratio <= 0.0 {
        return (0, 0);
    }

    let mut best = (0u64, 1u64);
    let mut min_error = f64::MAX;

    for d in 1..=max_denominator.max(1) as u64 {
        let n = (ratio * d as f64).round() as u64;
        let error = (ratio - n as f64 / d as f64).abs();
        if error < min_error {
            min_error = error;
            best = (n, d);
        }
    }

    let (n, d) = best;
    if n == 0 {
        // ratio too small to represent under this bound
        return (0, 1);
    }
    let divisor = gcd(n, d);
    ((n / divisor) as u32, (d / divisor) as u32)
}

/// Human-readable "W:H" ratio approximated under `max_denominator`
pub fn ratio_label(width: u32, height: u32, max_denominator: u32) -> String {
    if width == 0 || height == 0 {
        return UNKNOWN_RATIO.to_string();
    }
    let (n, d) = rationalize(width as f64 / height as f64, max_denominator);
    format!("{}:{}", n, d)
}

/// Exact "W:H" ratio reduced by the GCD of the dimensions
pub fn reduced_label(width: u32, height: u32) -> String {
    if width == 0 || height == 0 {
        return UNKNOWN_RATIO.to_string();
    }
    let divisor = gcd(width as u64, height as u64);
    format!("{}:{}", width as u64 / divisor, height as u64 / divisor)
}
