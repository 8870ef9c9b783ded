pub fn roundup_div(lhs: u64, rhs: u64) -> u64 {
    lhs / rhs + u64::from(lhs % rhs != 0)
}

/// Rounds half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10_f64.powi(digits);
    (value * scale).round() / scale
}
