use heapless::{Deque, Vec};
use serde::{Deserialize, Serialize};

use crate::HighPass;

/// High-pass cutoff isolating the cardiac pulsatile band, Hz.
const PULSE_CUTOFF: f32 = 5.;
/// Minimum filtered amplitude accepted as a systolic peak.
const PEAK_THRESHOLD: f32 = 50.;
/// Smoothing factor of the red/IR running averages.
const SPO2_SMOOTHING: f32 = 0.95;
// Empirical linear fit from the ratio-of-ratios R to SpO2 percent,
// and its calibrated validity band. Calibration data, not tunables.
const SPO2_SLOPE: f32 = -23.3;
const SPO2_KNEE: f32 = 0.4;
const SPO2_MIN: f32 = 80.;
const SPO2_MAX: f32 = 100.;

/// Batched monitor configuration.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sensor sampling rate in samples per second, at least 1.
    pub sampling_rate: f32,
    /// Seconds of filtered history retained for the peak search.
    pub window: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_rate: 100.,
            window: 5,
        }
    }
}

/// Streaming pulse monitor.
///
/// Consumes raw `(ir, red)` photodetector samples and produces a
/// one-shot beat flag, heart rate (BPM) and oxygen saturation (SpO2).
/// `N` is the compile-time history capacity; it must hold
/// `round(sampling_rate) * window` samples.
///
/// Every operation is a bounded-time computation over in-memory
/// state, meant to be driven from a single polling loop that drains
/// the sensor FIFO. `update()` is decoupled from ingestion so a
/// caller can batch many pushes and pay the peak search once per
/// tick. One logical thread of control per instance; a multi-threaded
/// host must serialize access externally.
pub struct PulseMonitor<const N: usize> {
    config: Config,
    max_samples: usize,
    filter: HighPass,
    history: Deque<f32, N>,

    beat: bool,
    bpm: f32,
    spo2: f32,

    // SpO2 accumulators, reset every `round(sampling_rate)` pairs
    count: u32,
    avg_red: f32,
    avg_ir: f32,
    sum_red_sq: f32,
    sum_ir_sq: f32,
}

impl<const N: usize> PulseMonitor<N> {
    pub fn new(config: Config) -> Self {
        debug_assert!(config.sampling_rate >= 1.);
        debug_assert!(config.window >= 1);
        let window = config.window.max(1);
        let mut monitor = Self {
            config: Config {
                sampling_rate: 1.,
                window,
            },
            max_samples: N.min(window as usize),
            filter: HighPass::new(PULSE_CUTOFF, 1.),
            history: Deque::new(),
            beat: false,
            bpm: 0.,
            spo2: 0.,
            count: 0,
            avg_red: 0.,
            avg_ir: 0.,
            sum_red_sq: 0.,
            sum_ir_sq: 0.,
        };
        monitor.set_sampling_rate(config.sampling_rate.max(1.));
        monitor
    }

    /// Live reconfiguration of the sampling rate.
    ///
    /// Both the filter coefficient and the window length depend on
    /// the rate, so this fully resets history, filter memory and the
    /// SpO2 accumulators. Rates below 1 Hz, or windows that do not
    /// fit the capacity `N`, are rejected and leave prior state
    /// unchanged.
    pub fn set_sampling_rate(&mut self, sampling_rate: f32) {
        if sampling_rate < 1. {
            log::error!(
                "sampling rate must be at least 1 Hz, got {}",
                sampling_rate
            );
            return;
        }
        let max_samples =
            libm::roundf(sampling_rate * self.config.window as f32) as usize;
        if max_samples == 0 || max_samples > N {
            log::error!(
                "window of {} samples does not fit capacity {}",
                max_samples,
                N
            );
            return;
        }
        self.config.sampling_rate = sampling_rate;
        self.max_samples = max_samples;
        self.filter.set_sampling_rate(PULSE_CUTOFF, sampling_rate);
        self.clear();
    }

    /// Drop accumulated history and statistics, keep configuration.
    ///
    /// Filter memory is left alone: it depends only on configuration
    /// and is reset by `set_sampling_rate()`.
    pub fn clear(&mut self) {
        self.history.clear();
        self.beat = false;
        self.bpm = 0.;
        self.spo2 = 0.;
        self.count = 0;
        self.avg_red = 0.;
        self.avg_ir = 0.;
        self.sum_red_sq = 0.;
        self.sum_ir_sq = 0.;
    }

    /// Ingest one IR sample.
    ///
    /// The sample is high-pass filtered and appended to the history;
    /// the oldest sample is evicted once the window is full.
    pub fn push(&mut self, ir: f32) {
        let filtered = self.filter.process(ir);
        if self.history.len() >= self.max_samples {
            self.history.pop_front();
        }
        self.history.push_back(filtered).ok();
    }

    /// Ingest one `(ir, red)` sample pair.
    ///
    /// Feeds the IR channel as `push()` does, then advances the
    /// streaming SpO2 estimator. SpO2 is recomputed once per
    /// `round(sampling_rate)` pairs (once per second at nominal rate)
    /// from the ratio of RMS-normalized red to IR fluctuation. The
    /// cadence tracks the configured rate; callers reconfiguring the
    /// sensor are expected to call `set_sampling_rate()`.
    pub fn push_pair(&mut self, ir: f32, red: f32) {
        self.push(ir);

        self.avg_red += (red - self.avg_red) * (1. - SPO2_SMOOTHING);
        self.avg_ir += (ir - self.avg_ir) * (1. - SPO2_SMOOTHING);
        self.sum_red_sq += (red - self.avg_red) * (red - self.avg_red);
        self.sum_ir_sq += (ir - self.avg_ir) * (ir - self.avg_ir);
        self.count += 1;
        if self.count >= libm::roundf(self.config.sampling_rate) as u32 {
            self.update_spo2();
            self.sum_red_sq = 0.;
            self.sum_ir_sq = 0.;
            self.count = 0;
        }
    }

    fn update_spo2(&mut self) {
        // A degenerate window (all-zero channel, no IR fluctuation)
        // would divide by zero; keep the previous value and let the
        // accumulators reset for the next window.
        if self.avg_red <= 0. || self.avg_ir <= 0. || self.sum_ir_sq <= 0. {
            log::debug!("degenerate SpO2 window, keeping previous value");
            return;
        }
        let r = (libm::sqrtf(self.sum_red_sq) / self.avg_red)
            / (libm::sqrtf(self.sum_ir_sq) / self.avg_ir);
        self.spo2 =
            (SPO2_SLOPE * (r - SPO2_KNEE) + 100.).clamp(SPO2_MIN, SPO2_MAX);
    }

    /// Advance the beat/BPM computation one tick.
    pub fn update(&mut self) {
        self.bpm = self.calculate_bpm();
    }

    fn calculate_bpm(&mut self) -> f32 {
        let (head, tail) = self.history.as_slices();
        let len = head.len() + tail.len();
        let at = |i: usize| {
            if i < head.len() {
                head[i]
            } else {
                tail[i - head.len()]
            }
        };

        let mut peaks: Vec<usize, N> = Vec::new();
        // A candidate only counts as a peak once the waveform has
        // dipped below baseline since the previous one. Refractory
        // guard against double-counting ringing around one systole.
        let mut dipped = false;
        for i in 1..len.saturating_sub(1) {
            let x = at(i);
            if dipped && x > PEAK_THRESHOLD && x > at(i - 1) && x > at(i + 1) {
                peaks.push(i).ok();
                dipped = false;
                // One-shot: the newest interior sample is itself a peak.
                self.beat = i == len - 2;
            } else if !dipped && x < 0. {
                dipped = true;
            }
        }
        if peaks.len() < 2 {
            return 0.;
        }

        let mut sum = 0.;
        for pair in peaks.windows(2) {
            sum += (pair[1] - pair[0]) as f32 / self.config.sampling_rate;
        }
        let mean_interval = sum / (peaks.len() - 1) as f32;
        60. / mean_interval
    }

    /// One-shot beat indicator for the most recent `update()`.
    pub fn is_beat(&self) -> bool {
        self.beat
    }

    /// Heart rate in beats per minute, 0 when undeterminable.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Oxygen saturation in percent, clamped to the calibrated band;
    /// 0 until the first full accumulation window.
    pub fn spo2(&self) -> f32 {
        self.spo2
    }

    /// Most recent filtered IR sample, NaN when the history is empty.
    pub fn latest_ir(&self) -> f32 {
        self.history.back().copied().unwrap_or(f32::NAN)
    }

    pub fn sampling_rate(&self) -> f32 {
        self.config.sampling_rate
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
