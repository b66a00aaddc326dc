//! Givens rotation utilities for the GMRES least-squares update.

/// Compute Givens rotation coefficients.
///
/// Returns (c, s) such that:
/// ```text
/// [ c  s ] [ a ]   [ r ]
/// [-s  c ] [ b ] = [ 0 ]
/// ```
pub fn givens_rotation(a: f64, b: f64) -> (f64, f64) {
    if b.abs() < 1e-300 {
        return (1.0, 0.0);
    }
    let r = a.hypot(b);
    (a / r, b / r)
}

/// Apply the rotation (c, s) to the pair (x, y) in place.
#[inline]
pub fn apply_rotation(c: f64, s: f64, x: &mut f64, y: &mut f64) {
    let temp = c * *x + s * *y;
    *y = -s * *x + c * *y;
    *x = temp;
}
