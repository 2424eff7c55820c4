use crate::*;

/// Number of segments from glottis to lips.
pub const TRACT_LENGTH: usize = 44;
pub const BLADE_START: usize = 10;
pub const TIP_START: usize = 32;
pub const LIP_START: usize = 39;
/// Number of segments in the nasal cavity.
pub const NOSE_LENGTH: usize = 28;
/// Tract segment where the nasal cavity branches off.
pub const NOSE_START: usize = TRACT_LENGTH - NOSE_LENGTH + 1;
/// Velum aperture when the nasal passage is shut.
pub const VELUM_CLOSED: f64 = 0.01;

const N: usize = TRACT_LENGTH;
const GLOTTAL_REFLECTION: f64 = 0.75;
const LIP_REFLECTION: f64 = -0.85;
/// Energy loss per segment per step.
const DAMPING: f64 = 0.999;
/// Energy loss in the nose, none by default.
const FADE: f64 = 1.;
/// Articulator speed in diameter units per second.
const MOVEMENT_SPEED: f64 = 15.;
/// Reflection at a fully closed segment.
const CLOSED_REFLECTION: f64 = 0.999;
/// Amplitude tracking runs on every n-th step.
const AMPLITUDE_DECIMATION: u32 = 10;

/// A decaying pressure pulse, the burst of a released stop consonant.
#[derive(Clone, Debug, PartialEq)]
pub struct Transient {
    pub position: usize,
    pub time_alive: f64,
    pub life_time: f64,
    pub strength: f64,
    pub exponent: f64,
}

/// A narrowing where airflow becomes turbulent, the noise source of fricatives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constriction {
    /// Fractional segment index.
    pub position: f64,
    /// Noise level, 0 .. 1.
    pub intensity: f64,
}

/// Reflection coefficient of the junction between two areas.
/// A closed right-hand segment reflects almost everything.
pub fn junction_reflection(left_area: f64, right_area: f64) -> f64 {
    if right_area == 0. {
        CLOSED_REFLECTION
    } else {
        (left_area - right_area) / (left_area + right_area)
    }
}

/// Digital waveguide model of the vocal tract with a nasal side branch.
///
/// The tract is stepped twice per output sample. Reflection coefficients change once per block
/// and are blended from the previous block's values (`reflection`) to the current ones
/// (`new_reflection`) by the block position `lambda`.
#[derive(Clone)]
pub struct Tract {
    /// Current segment diameters.
    pub diameter: [f64; N],
    /// Neutral shape.
    pub rest_diameter: [f64; N],
    /// Articulation goal; `diameter` moves towards it once per block.
    pub target_diameter: [f64; N],
    pub nose_diameter: [f64; NOSE_LENGTH],
    /// Velum aperture goal for `nose_diameter[0]`.
    pub velum_target: f64,
    pub transients: Vec<Transient>,
    pub constrictions: Vec<Constriction>,

    right: [f64; N],
    left: [f64; N],
    reflection: [f64; N + 1],
    new_reflection: [f64; N + 1],
    junction_output_right: [f64; N + 1],
    junction_output_left: [f64; N + 1],
    area: [f64; N],
    max_amplitude: [f64; N],

    nose_right: [f64; NOSE_LENGTH],
    nose_left: [f64; NOSE_LENGTH],
    nose_junction_output_right: [f64; NOSE_LENGTH + 1],
    nose_junction_output_left: [f64; NOSE_LENGTH + 1],
    nose_reflection: [f64; NOSE_LENGTH + 1],
    nose_area: [f64; NOSE_LENGTH],
    nose_max_amplitude: [f64; NOSE_LENGTH],

    reflection_left: f64,
    reflection_right: f64,
    reflection_nose: f64,
    new_reflection_left: f64,
    new_reflection_right: f64,
    new_reflection_nose: f64,

    last_obstruction: Option<usize>,
    sample_rate: f64,
    step_count: u32,
    lip_output: f64,
    nose_output: f64,
}
impl Tract {
    pub fn new(sample_rate: usize) -> Self {
        let mut rest_diameter = [0.; N];
        for (i, d) in rest_diameter.iter_mut().enumerate() {
            let i = i as f64;
            *d = if i < 7. * N as f64 / 44. - 0.5 {
                0.6
            } else if i < 12. * N as f64 / 44. {
                1.1
            } else {
                1.5
            };
        }
        let mut nose_diameter = [0.; NOSE_LENGTH];
        for (i, d) in nose_diameter.iter_mut().enumerate() {
            let x = 2. * (i as f64 / NOSE_LENGTH as f64);
            let diameter = if x < 1. {
                0.4 + 1.6 * x
            } else {
                0.5 + 1.5 * (2. - x)
            };
            *d = diameter.min(1.9);
        }

        let mut tract = Self {
            diameter: rest_diameter,
            rest_diameter,
            target_diameter: rest_diameter,
            nose_diameter,
            velum_target: VELUM_CLOSED,
            transients: Vec::new(),
            constrictions: Vec::new(),
            right: [0.; N],
            left: [0.; N],
            reflection: [0.; N + 1],
            new_reflection: [0.; N + 1],
            junction_output_right: [0.; N + 1],
            junction_output_left: [0.; N + 1],
            area: [0.; N],
            max_amplitude: [0.; N],
            nose_right: [0.; NOSE_LENGTH],
            nose_left: [0.; NOSE_LENGTH],
            nose_junction_output_right: [0.; NOSE_LENGTH + 1],
            nose_junction_output_left: [0.; NOSE_LENGTH + 1],
            nose_reflection: [0.; NOSE_LENGTH + 1],
            nose_area: [0.; NOSE_LENGTH],
            nose_max_amplitude: [0.; NOSE_LENGTH],
            reflection_left: 0.,
            reflection_right: 0.,
            reflection_nose: 0.,
            new_reflection_left: 0.,
            new_reflection_right: 0.,
            new_reflection_nose: 0.,
            last_obstruction: None,
            sample_rate: sample_rate as f64,
            step_count: 0,
            lip_output: 0.,
            nose_output: 0.,
        };
        tract.calculate_reflections();
        tract.calculate_nose_reflections();
        tract.nose_diameter[0] = tract.velum_target;
        tract
    }

    /// Propagates one step through the waveguide.
    /// # Arguments
    /// * `glottal_output` - excitation entering at the glottis
    /// * `turbulence_noise` - frication noise, already gated by the glottal noise modulator
    /// * `lambda` - position within the current block, 0 .. 1
    pub fn run_step(&mut self, glottal_output: f64, turbulence_noise: f64, lambda: f64) {
        self.step_count = self.step_count.wrapping_add(1);
        let update_amplitudes = self.step_count % AMPLITUDE_DECIMATION == 0;

        // mouth
        self.process_transients();
        self.add_turbulence_noise(turbulence_noise);

        self.junction_output_right[0] = self.left[0] * GLOTTAL_REFLECTION + glottal_output;
        self.junction_output_left[N] = self.right[N - 1] * LIP_REFLECTION;

        for i in 1..N {
            let r = interpolate(self.reflection[i], self.new_reflection[i], lambda);
            let w = r * (self.right[i - 1] + self.left[i]);
            self.junction_output_right[i] = self.right[i - 1] - w;
            self.junction_output_left[i] = self.left[i] + w;
        }

        // three-way junction with the nose
        let i = NOSE_START;
        let r = interpolate(self.reflection_left, self.new_reflection_left, lambda);
        self.junction_output_left[i] =
            r * self.right[i - 1] + (1. + r) * (self.nose_left[0] + self.left[i]);
        let r = interpolate(self.reflection_right, self.new_reflection_right, lambda);
        self.junction_output_right[i] =
            r * self.left[i] + (1. + r) * (self.right[i - 1] + self.nose_left[0]);
        let r = interpolate(self.reflection_nose, self.new_reflection_nose, lambda);
        self.nose_junction_output_right[0] =
            r * self.nose_left[0] + (1. + r) * (self.left[i] + self.right[i - 1]);

        for i in 0..N {
            self.right[i] = self.junction_output_right[i] * DAMPING;
            self.left[i] = self.junction_output_left[i + 1] * DAMPING;
            if update_amplitudes {
                track_amplitude(&mut self.max_amplitude[i], self.right[i] + self.left[i]);
            }
        }
        self.lip_output = self.right[N - 1];

        // nose
        self.nose_junction_output_left[NOSE_LENGTH] =
            self.nose_right[NOSE_LENGTH - 1] * LIP_REFLECTION;

        for i in 1..NOSE_LENGTH {
            let w = self.nose_reflection[i] * (self.nose_right[i - 1] + self.nose_left[i]);
            self.nose_junction_output_right[i] = self.nose_right[i - 1] - w;
            self.nose_junction_output_left[i] = self.nose_left[i] + w;
        }

        for i in 0..NOSE_LENGTH {
            self.nose_right[i] = self.nose_junction_output_right[i] * FADE;
            self.nose_left[i] = self.nose_junction_output_left[i + 1] * FADE;
            if update_amplitudes {
                track_amplitude(
                    &mut self.nose_max_amplitude[i],
                    self.nose_right[i] + self.nose_left[i],
                );
            }
        }
        self.nose_output = self.nose_right[NOSE_LENGTH - 1];
    }

    /// Moves the articulators and refreshes the reflection coefficients.
    /// Call once per audio block, after its samples.
    /// # Arguments
    /// * `block_time` - block duration in seconds
    pub fn finish_block(&mut self, block_time: f64) {
        self.reshape_tract(block_time);
        self.calculate_reflections();
    }

    /// Starts a release burst at `position`. Positions past the lips are ignored.
    pub fn add_transient(&mut self, position: usize) {
        if position >= N {
            log::warn!("transient at segment {position} is outside the tract");
            return;
        }
        log::trace!("transient at segment {position}");
        self.transients.push(Transient {
            position,
            time_alive: 0.,
            life_time: 0.2,
            strength: 0.3,
            exponent: 200.,
        });
    }

    /// Injects the live transients and retires the expired ones.
    fn process_transients(&mut self) {
        // two tract steps per output sample
        let time_step = 1. / (self.sample_rate * 2.);
        for trans in self.transients.iter_mut() {
            let amplitude = trans.strength * 2_f64.powf(-trans.exponent * trans.time_alive);
            self.right[trans.position] += amplitude / 2.;
            self.left[trans.position] += amplitude / 2.;
            trans.time_alive += time_step;
        }
        self.transients.retain(|t| t.time_alive <= t.life_time);
    }

    fn add_turbulence_noise(&mut self, turbulence_noise: f64) {
        for k in 0..self.constrictions.len() {
            let Constriction {
                position,
                intensity,
            } = self.constrictions[k];
            if position < 2. || position > N as f64 || intensity == 0. {
                continue;
            }
            let diameter = self.diameter[(position as usize).min(N - 1)];
            if diameter <= 0. {
                continue;
            }
            self.add_turbulence_noise_at_position(
                0.66 * turbulence_noise * intensity,
                position,
                diameter,
            );
        }
    }

    fn add_turbulence_noise_at_position(
        &mut self,
        turbulence_noise: f64,
        position: f64,
        diameter: f64,
    ) {
        let i = position.floor() as usize;
        let delta = position - i as f64;
        let thinness = (8. * (0.7 - diameter)).clamp(0., 1.);
        let openness = (30. * (diameter - 0.3)).clamp(0., 1.);
        let noise0 = turbulence_noise * (1. - delta) * thinness * openness;
        let noise1 = turbulence_noise * delta * thinness * openness;
        if i + 1 < N {
            self.right[i + 1] += noise0 / 2.;
            self.left[i + 1] += noise0 / 2.;
        }
        if i + 2 < N {
            self.right[i + 2] += noise1 / 2.;
            self.left[i + 2] += noise1 / 2.;
        }
    }

    /// Moves `diameter` towards `target_diameter` and the velum towards `velum_target`.
    /// A stop release (no closed segment left) fires a transient at the last closure,
    /// unless air escapes through the nose anyway.
    fn reshape_tract(&mut self, delta_time: f64) {
        let amount = delta_time * MOVEMENT_SPEED;
        let mut new_last_obstruction = None;
        for i in 0..N {
            let diameter = self.diameter[i];
            if diameter <= 0. {
                new_last_obstruction = Some(i);
            }
            let slow_return = if i < NOSE_START {
                0.6
            } else if i >= TIP_START {
                1.
            } else {
                0.6 + 0.4 * (i - NOSE_START) as f64 / (TIP_START - NOSE_START) as f64
            };
            let rate = slow_return * amount;
            self.diameter[i] = move_towards(diameter, self.target_diameter[i], rate, 2. * rate);
        }
        if let Some(position) = self.last_obstruction {
            if new_last_obstruction.is_none() && self.nose_area[0] < 0.05 {
                self.add_transient(position);
            }
        }
        self.last_obstruction = new_last_obstruction;

        self.nose_diameter[0] = move_towards(
            self.nose_diameter[0],
            self.velum_target,
            amount * 0.25,
            amount * 0.1,
        );
        self.nose_area[0] = self.nose_diameter[0] * self.nose_diameter[0];
    }

    /// Recomputes areas and junction reflections from the diameters.
    /// The previous coefficients are kept for blending within the next block.
    fn calculate_reflections(&mut self) {
        for i in 0..N {
            // ignoring PI and other constant factors
            self.area[i] = self.diameter[i] * self.diameter[i];
        }
        for i in 1..N {
            self.reflection[i] = self.new_reflection[i];
            self.new_reflection[i] = junction_reflection(self.area[i - 1], self.area[i]);
        }

        self.reflection_left = self.new_reflection_left;
        self.reflection_right = self.new_reflection_right;
        self.reflection_nose = self.new_reflection_nose;
        let left = self.area[NOSE_START];
        let right = self.area[NOSE_START + 1];
        let nose = self.nose_area[0];
        let sum = left + right + nose;
        if sum > 0. {
            self.new_reflection_left = (2. * left - sum) / sum;
            self.new_reflection_right = (2. * right - sum) / sum;
            self.new_reflection_nose = (2. * nose - sum) / sum;
        } else {
            self.new_reflection_left = CLOSED_REFLECTION;
            self.new_reflection_right = CLOSED_REFLECTION;
            self.new_reflection_nose = CLOSED_REFLECTION;
        }
    }

    fn calculate_nose_reflections(&mut self) {
        for i in 0..NOSE_LENGTH {
            self.nose_area[i] = self.nose_diameter[i] * self.nose_diameter[i];
        }
        for i in 1..NOSE_LENGTH {
            self.nose_reflection[i] =
                junction_reflection(self.nose_area[i - 1], self.nose_area[i]);
        }
    }

    /// Returns the tract to its neutral shape goal and drops any fricative noise.
    pub fn reset_target(&mut self) {
        self.target_diameter = self.rest_diameter;
        self.constrictions.clear();
    }

    pub fn lip_output(&self) -> f64 {
        self.lip_output
    }
    pub fn nose_output(&self) -> f64 {
        self.nose_output
    }
    /// Segment areas as of the last block.
    pub fn area(&self) -> &[f64; N] {
        &self.area
    }
    /// Per-segment peak amplitude, decaying slowly. For visualization.
    pub fn max_amplitude(&self) -> &[f64; N] {
        &self.max_amplitude
    }
    pub fn nose_max_amplitude(&self) -> &[f64; NOSE_LENGTH] {
        &self.nose_max_amplitude
    }
}

fn track_amplitude(max: &mut f64, value: f64) {
    let amplitude = value.abs();
    if amplitude > *max {
        *max = amplitude;
    } else {
        *max *= 0.999;
    }
}
