use common::round_to;
use proptest::prelude::*;

const FRACTIONS: [f64; 6] = [0.0001, 0.001, 0.01, 0.1, 0.5, 5.0];

proptest! {
    /// The result never moves away from zero past `number` and stays within
    /// one step of it.
    #[test]
    fn round_to_truncates_within_one_step(
        number in -1_000_000.0f64..1_000_000.0f64,
        idx in 0usize..FRACTIONS.len(),
    ) {
        let fraction = FRACTIONS[idx];
        let rounded = round_to(number, fraction);
        let slack = 1e-6;

        prop_assert!(rounded.abs() <= number.abs() + slack,
            "round_to({number}, {fraction}) = {rounded} grew in magnitude");
        prop_assert!((number - rounded).abs() <= fraction + slack,
            "round_to({number}, {fraction}) = {rounded} is more than one step away");
        prop_assert!(number == 0.0 || rounded == 0.0 || rounded.signum() == number.signum());
    }

    /// Rounding an already rounded value changes nothing beyond float noise.
    #[test]
    fn round_to_is_stable(
        number in -10_000.0f64..10_000.0f64,
        idx in 0usize..FRACTIONS.len(),
    ) {
        let fraction = FRACTIONS[idx];
        let once = round_to(number, fraction);
        let twice = round_to(once, fraction);
        prop_assert!((once - twice).abs() <= 1e-9 * once.abs().max(1.0),
            "round_to drifted from {once} to {twice} on fraction {fraction}");
    }
}
