use serde::{Deserialize, Serialize};

use crate::Ema;

// Smoothing factor of the output EMA stage, independent of the filter
// coefficient.
const SMOOTHING: f32 = 0.95;

/// Single-pole high-pass filter with inverted output polarity.
///
/// Removes the slow baseline component of a raw PPG sample (ambient
/// light, tissue DC offset) and negates the result so that the
/// absorption dips caused by systolic inflow come out as
/// positive-going peaks for the downstream peak search. The raw
/// high-pass output is smoothed by an EMA to suppress quantization
/// noise.
///
/// The coefficient is the bilinear-transform RC filter
/// `alpha = RC / (RC + dt)` with `RC = 1 / (2 pi cutoff)` and
/// `dt = 1 / sampling_rate`.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct HighPass {
    cutoff: f32,
    sampling_rate: f32,
    alpha: f32,
    // previous raw input and previous (smoothed) output
    x1: f32,
    y1: f32,
    ema: Ema,
}

impl HighPass {
    pub fn new(cutoff: f32, sampling_rate: f32) -> Self {
        let mut filter = Self {
            cutoff: 0.,
            sampling_rate: 0.,
            alpha: 0.,
            x1: 0.,
            y1: 0.,
            ema: Ema::new(SMOOTHING),
        };
        filter.set_sampling_rate(cutoff, sampling_rate);
        filter
    }

    /// Reconfigure cutoff and sampling rate.
    ///
    /// Recomputes the coefficient and fully resets filter memory.
    /// Output after a rate change must not depend on samples fed
    /// under the old rate.
    pub fn set_sampling_rate(&mut self, cutoff: f32, sampling_rate: f32) {
        self.cutoff = cutoff;
        self.sampling_rate = sampling_rate;
        self.x1 = 0.;
        self.y1 = 0.;
        let dt = 1. / sampling_rate;
        let rc = 1. / (2. * core::f32::consts::PI * cutoff);
        self.alpha = rc / (rc + dt);
        self.ema.clear();
    }

    /// Filter one raw sample.
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.ema.update(self.alpha * (self.y1 + x - self.x1));
        self.x1 = x;
        self.y1 = y;
        -y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dc() {
        let mut f = HighPass::new(5., 100.);
        let mut y = 0.;
        for _ in 0..1000 {
            y = f.process(1000.);
        }
        assert!(y.abs() < 1e-3);
    }

    #[test]
    fn absorption_dip_becomes_positive_peak() {
        let mut f = HighPass::new(5., 100.);
        for _ in 0..200 {
            f.process(1000.);
        }
        // A drop in received light is a systole; it must come out
        // positive and well above the noise floor.
        let y = f.process(700.);
        assert!(y > 50.);
    }

    #[test]
    fn rate_change_forgets_history() {
        let mut a = HighPass::new(5., 100.);
        let mut b = HighPass::new(5., 100.);
        for i in 0..50 {
            a.process(i as f32 * 37.);
        }
        for _ in 0..7 {
            b.process(123456.);
        }
        a.set_sampling_rate(5., 50.);
        b.set_sampling_rate(5., 50.);
        assert_eq!(a.process(999.), b.process(999.));
    }
}
