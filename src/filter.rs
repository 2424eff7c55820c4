use crate::*;
use std::f64::consts::PI;

pub trait FilterStep {
    /// Performs a filter step.
    /// # Arguments
    /// * `x` - input signal value
    /// # Returns
    /// * output signal value
    fn step(&mut self, x: f64) -> f64;
}

/// A second-order IIR band-pass filter with 0 dB gain at the centre frequency.
//
// Formulas:
//  Variables:
//    x = input samples
//    y = output samples
//    f0 = centre frequency in Hz
//    w0 = 2 * PI * f0 / sampleRate
//    q = quality factor
//    alpha = sin(w0) / (2 * q)
//  Filter function (normalized by a0 = 1 + alpha):
//    y[n] = b0 * x[n] + b2 * x[n-2] - a1 * y[n-1] - a2 * y[n-2]
//    b0 = alpha / a0,  b1 = 0,  b2 = -alpha / a0
//    a1 = -2 * cos(w0) / a0,  a2 = (1 - alpha) / a0
//  Transfer function:
//    H(z) = (b0 + b2 * z^-2) / (1 + a1 * z^-1 + a2 * z^-2)
//  Gain at the centre frequency:
//    |H(f0)| = 1
#[derive(Clone, Debug)]
pub struct BandPass {
    sample_rate: f64,
    b0: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    /// x[n-1], x[n-2]
    x1: f64,
    x2: f64,
    /// y[n-1], y[n-2]
    y1: f64,
    y2: f64,
    passthrough: bool,
}
impl BandPass {
    /// # Arguments
    /// * `sample_rate` - sample rate in Hz
    pub fn new(sample_rate: usize) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            b0: 0.,
            b2: 0.,
            a1: 0.,
            a2: 0.,
            x1: 0.,
            x2: 0.,
            y1: 0.,
            y2: 0.,
            passthrough: true,
        }
    }
    /// Adjusts the filter parameters without resetting the inner state.
    ///
    /// # Arguments
    /// * `f` - Centre frequency in Hz.
    /// * `q` - Quality factor. Lower values give a wider pass band.
    pub fn set(&mut self, f: f64, q: f64) -> VsResult<()> {
        if f <= 0. || f >= self.sample_rate / 2. || q <= 0. || !f.is_finite() || !q.is_finite() {
            return VsError::err("invalid band-pass parameters");
        }

        let w0 = 2. * PI * f / self.sample_rate;
        let alpha = w0.sin() / (2. * q);
        let a0 = 1. + alpha;
        self.b0 = alpha / a0;
        self.b2 = -alpha / a0;
        self.a1 = -2. * w0.cos() / a0;
        self.a2 = (1. - alpha) / a0;
        self.passthrough = false;

        Ok(())
    }
}
impl FilterStep for BandPass {
    fn step(&mut self, x: f64) -> f64 {
        if self.passthrough {
            return x;
        }
        let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}
