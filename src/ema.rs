use serde::{Deserialize, Serialize};

/// Exponential moving average.
///
/// Recursive single-pole smoother with smoothing factor `alpha` in
/// (0, 1). The state seeds lazily: the first `update()` after
/// construction or `clear()` passes its input through unblended.
/// NaN marks the unseeded state.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Ema {
    alpha: f32,
    value: f32,
}

impl Ema {
    pub const fn new(alpha: f32) -> Self {
        Self {
            alpha,
            value: f32::NAN,
        }
    }

    /// Forget the current value. The next `update()` reseeds.
    pub fn clear(&mut self) {
        self.value = f32::NAN;
    }

    /// Blend in a new sample and return the smoothed value.
    pub fn update(&mut self, x: f32) -> f32 {
        self.value = if self.value.is_nan() {
            x
        } else {
            self.alpha * x + (1. - self.alpha) * self.value
        };
        self.value
    }

    /// Current smoothed value, NaN when unseeded.
    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::isclose;

    #[test]
    fn seeds_on_first_update() {
        let mut e = Ema::new(0.95);
        assert!(e.value().is_nan());
        assert_eq!(e.update(-3.5), -3.5);
        assert_eq!(e.value(), -3.5);
    }

    #[test]
    fn blends_after_seed() {
        let mut e = Ema::new(0.25);
        e.update(8.);
        let y = e.update(0.);
        assert!(isclose(y, 0.75 * 8., 1e-6, 0.));
    }

    #[test]
    fn clear_reseeds() {
        let mut e = Ema::new(0.5);
        e.update(100.);
        e.update(42.);
        e.clear();
        assert!(e.value().is_nan());
        assert_eq!(e.update(7.), 7.);
    }
}
