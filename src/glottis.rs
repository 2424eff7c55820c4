use crate::*;
use std::f64::consts::PI;

/// Lowest cycle frequency in Hz, whatever the vibrato.
pub const MIN_FREQUENCY: f64 = 10.;

/// Liljencrants-Fant shape parameters for one glottal cycle.
/// Times are normalized to a cycle length of 1 and the return phase starts at -1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LfShape {
    pub rd: f64,
    pub te: f64,
    pub tp: f64,
    pub alpha: f64,
    pub e0: f64,
    pub omega: f64,
    pub epsilon: f64,
    pub shift: f64,
    pub delta: f64,
}
impl LfShape {
    /// Derives the cycle shape from the vocal effort.
    //
    // Formulas (Fant 1995 regressions, Rd clamped to 0.5 .. 2.7):
    //  Rd = 3 * (1 - tenseness)
    //  Ra = -0.01 + 0.048 * Rd
    //  Rk = 0.224 + 0.118 * Rd
    //  Rg = (Rk / 4) * (0.5 + 1.2 * Rk) / (0.11 * Rd - Ra * (0.5 + 1.2 * Rk))
    //  Ta = Ra,  Tp = 1 / (2 * Rg),  Te = Tp * (1 + Rk)
    //  Return phase (t > Te):
    //    (-exp(-epsilon * (t - Te)) + shift) / delta,  epsilon = 1 / Ta,
    //    shift = exp(-epsilon * (1 - Te)),  delta = 1 - shift
    //  Open phase (t <= Te):
    //    E0 * exp(alpha * t) * sin(omega * t),  omega = PI / Tp
    //  alpha and E0 follow from two conditions:
    //    E0 * exp(alpha * Te) * sin(omega * Te) = -1           (meet the return phase)
    //    E0 * exp(alpha * Tp / 2) * Tp * 2 / PI = upper area    (net flow over the cycle is zero)
    //  Dividing the second by the first with y = exp(alpha * (Tp / 2 - Te)):
    //    y = -PI * sin(omega * Te) * upper / (2 * Tp)
    pub fn from_tenseness(tenseness: f64) -> Self {
        let rd = (3. * (1. - tenseness)).clamp(0.5, 2.7);
        let ra = -0.01 + 0.048 * rd;
        let rk = 0.224 + 0.118 * rd;
        let rg = (rk / 4.) * (0.5 + 1.2 * rk) / (0.11 * rd - ra * (0.5 + 1.2 * rk));

        let ta = ra;
        let tp = 1. / (2. * rg);
        let te = tp + tp * rk;

        let epsilon = 1. / ta;
        let shift = (-epsilon * (1. - te)).exp();
        let delta = 1. - shift;

        let rhs_integral = ((1. / epsilon) * (shift - 1.) + (1. - te) * shift) / delta;
        let total_lower_integral = rhs_integral - (te - tp) / 2.;
        let total_upper_integral = -total_lower_integral;

        let omega = PI / tp;
        let s = (omega * te).sin();
        let y = -PI * s * total_upper_integral / (tp * 2.);
        let alpha = y.ln() / (tp / 2. - te);
        let e0 = -1. / (s * (alpha * te).exp());

        Self {
            rd,
            te,
            tp,
            alpha,
            e0,
            omega,
            epsilon,
            shift,
            delta,
        }
    }

    /// Samples the waveform at normalized phase `t` in 0 .. 1.
    pub fn normalized_lf_waveform(&self, t: f64) -> f64 {
        if t > self.te {
            (-(-self.epsilon * (t - self.te)).exp() + self.shift) / self.delta
        } else {
            self.e0 * (self.alpha * t).exp() * (self.omega * t).sin()
        }
    }
}

/// The voice source: vocal folds modelled with the LF glottal flow derivative plus aspiration.
///
/// Frequency and tenseness are double buffered. `finish_block` moves the `new_*` values into
/// `old_*` and computes fresh `new_*` values; within a block, each cycle start interpolates
/// between the two at the block position `lambda`.
#[derive(Clone)]
pub struct Glottis {
    /// Intensity ramps up while touched, decays otherwise.
    pub is_touched: bool,
    /// Voice even when not touched.
    pub always_voice: bool,
    /// Add slow, large pitch drift.
    pub auto_wobble: bool,
    /// Requested vocal effort, 0 .. 1.
    pub target_tenseness: f64,
    /// Requested pitch in Hz.
    pub target_frequency: f64,
    pub loudness: f64,
    pub vibrato_amount: f64,
    /// Vibrato rate in Hz.
    pub vibrato_frequency: f64,

    noise: NoiseField,
    sample_rate: f64,
    time_in_waveform: f64,
    total_time: f64,
    waveform_length: f64,
    frequency: f64,
    smooth_frequency: f64,
    old_frequency: f64,
    new_frequency: f64,
    old_tenseness: f64,
    new_tenseness: f64,
    intensity: f64,
    shape: LfShape,
}
impl Glottis {
    pub fn new(sample_rate: usize, noise: NoiseField) -> Self {
        let mut glottis = Self {
            is_touched: false,
            always_voice: false,
            auto_wobble: false,
            target_tenseness: 0.6,
            target_frequency: 140.,
            loudness: 1.,
            vibrato_amount: 0.005,
            vibrato_frequency: 6.,
            noise,
            sample_rate: sample_rate as f64,
            time_in_waveform: 0.,
            total_time: 0.,
            waveform_length: 0.,
            frequency: 140.,
            smooth_frequency: 140.,
            old_frequency: 140.,
            new_frequency: 140.,
            old_tenseness: 0.6,
            new_tenseness: 0.6,
            intensity: 0.,
            shape: LfShape::default(),
        };
        glottis.setup_waveform(0.);
        glottis
    }

    /// Produces one sample of glottal excitation.
    /// # Arguments
    /// * `lambda` - position within the current block, 0 .. 1
    /// * `noise_source` - band-passed aspiration noise sample
    pub fn run_step(&mut self, lambda: f64, noise_source: f64) -> f64 {
        let time_step = 1. / self.sample_rate;
        self.time_in_waveform += time_step;
        self.total_time += time_step;
        if self.time_in_waveform > self.waveform_length {
            self.time_in_waveform -= self.waveform_length;
            self.setup_waveform(lambda);
        }
        let voice = self
            .shape
            .normalized_lf_waveform(self.time_in_waveform / self.waveform_length)
            * self.intensity
            * self.loudness;
        let mut aspiration = self.intensity
            * (1. - self.target_tenseness.clamp(0., 1.).sqrt())
            * self.noise_modulator()
            * noise_source;
        aspiration *= 0.2 + 0.02 * self.noise.simplex1(self.total_time * 1.99);
        voice + aspiration
    }

    /// Gates turbulence by the open phase of the glottis.
    /// The more tense and intense the voice, the more the noise follows the glottal cycle.
    pub fn noise_modulator(&self) -> f64 {
        let voiced = 0.1
            + 0.2
                * 0_f64.max((2. * PI * self.time_in_waveform / self.waveform_length).sin());
        let weight = self.target_tenseness * self.intensity;
        weight * voiced + (1. - weight) * 0.3
    }

    /// Advances the smoothing state. Call once per audio block, after its samples.
    pub fn finish_block(&mut self) {
        let t = self.total_time;
        let mut vibrato = self.vibrato_amount * (2. * PI * t * self.vibrato_frequency).sin();
        vibrato += 0.02 * self.noise.simplex1(t * 4.07);
        vibrato += 0.04 * self.noise.simplex1(t * 2.15);
        if self.auto_wobble {
            vibrato += 0.2 * self.noise.simplex1(t * 0.98);
            vibrato += 0.4 * self.noise.simplex1(t * 0.5);
        }

        if self.target_frequency > self.smooth_frequency {
            self.smooth_frequency = (self.smooth_frequency * 1.1).min(self.target_frequency);
        }
        if self.target_frequency < self.smooth_frequency {
            self.smooth_frequency = (self.smooth_frequency / 1.1).max(self.target_frequency);
        }
        self.old_frequency = self.new_frequency;
        self.new_frequency = (self.smooth_frequency * (1. + vibrato)).max(MIN_FREQUENCY);

        self.old_tenseness = self.new_tenseness;
        self.new_tenseness = self.target_tenseness
            + 0.1 * self.noise.simplex1(t * 0.46)
            + 0.05 * self.noise.simplex1(t * 0.36);
        if !self.is_touched && self.always_voice {
            // attack
            self.new_tenseness += (3. - self.target_tenseness) * (1. - self.intensity);
        }

        if self.is_touched || self.always_voice {
            self.intensity += 0.13;
        } else {
            self.intensity -= 0.05;
        }
        self.intensity = self.intensity.clamp(0., 1.);
    }

    /// Recomputes the cycle shape from frequency and tenseness interpolated at `lambda`.
    fn setup_waveform(&mut self, lambda: f64) {
        self.frequency = interpolate(self.old_frequency, self.new_frequency, lambda);
        let tenseness = interpolate(self.old_tenseness, self.new_tenseness, lambda);
        self.waveform_length = 1. / self.frequency;
        self.shape = LfShape::from_tenseness(tenseness);
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }
    /// Frequency of the current glottal cycle in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
    pub fn shape(&self) -> &LfShape {
        &self.shape
    }
    pub fn total_time(&self) -> f64 {
        self.total_time
    }
}
