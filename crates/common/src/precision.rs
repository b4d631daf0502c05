/// Truncate `number` to a multiple of `fraction`, keeping as many decimal
/// places as `fraction` itself has.
///
/// `round_to(1.2345, 0.1) == 1.2`, `round_to(-7.9, 1.0) == -7.0`.
/// A non-positive or non-finite `fraction` returns `number` untouched.
/// Values already on the grid stay put: `round_to(0.3, 0.1) == 0.3`.
pub fn round_to(number: f64, fraction: f64) -> f64 {
    if !fraction.is_finite() || fraction <= 0.0 {
        return number;
    }
    let truncated = steps(number / fraction) * fraction;
    let scale = 10f64.powi(decimal_places(fraction) as i32);
    (truncated * scale).round() / scale
}

/// Whole steps in `quotient`, treating division noise next to an integer as
/// that integer.
fn steps(quotient: f64) -> f64 {
    let nearest = quotient.round();
    let noise = 16.0 * f64::EPSILON * quotient.abs().max(1.0);
    if (quotient - nearest).abs() <= noise {
        nearest
    } else {
        quotient.trunc()
    }
}

/// Digits after the decimal point in the shortest representation of `x`.
fn decimal_places(x: f64) -> usize {
    let repr = x.to_string();
    repr.split_once('.').map_or(0, |(_, frac)| frac.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_whole_numbers_on_fine_grid() {
        assert_eq!(round_to(105.0, 0.01), 105.0);
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(round_to(1.2345, 0.1), 1.2);
        assert_eq!(round_to(1.29, 0.1), 1.2);
        assert_eq!(round_to(-1.29, 0.1), -1.2);
    }

    #[test]
    fn grid_values_survive_division_noise() {
        assert_eq!(round_to(0.3, 0.1), 0.3);
        assert_eq!(round_to(0.7, 0.1), 0.7);
        assert_eq!(round_to(0.07, 0.01), 0.07);
        assert_eq!(round_to(-0.3, 0.1), -0.3);
    }

    #[test]
    fn integer_fraction_has_no_decimals() {
        assert_eq!(round_to(17.0, 5.0), 15.0);
        assert_eq!(round_to(7.9, 1.0), 7.0);
    }

    #[test]
    fn decimal_places_counts_shortest_form() {
        assert_eq!(decimal_places(0.01), 2);
        assert_eq!(decimal_places(0.5), 1);
        assert_eq!(decimal_places(1.0), 0);
        assert_eq!(decimal_places(0.0001), 4);
    }

    #[test]
    fn degenerate_fraction_is_identity() {
        assert_eq!(round_to(3.14159, 0.0), 3.14159);
        assert_eq!(round_to(3.14159, -0.1), 3.14159);
    }
}
