use crate::*;

/// Canonical sound classes that letters are folded into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "strum",
    derive(strum::Display, strum::EnumString, strum::EnumIter),
    strum(serialize_all = "lowercase")
)]
pub enum Phoneme {
    A,
    Ee,
    O,
    U,
    B,
    D,
    F,
    G,
    H,
    J,
    K,
    L,
    M,
    N,
    P,
    S,
    T,
    V,
    W,
    Yr,
    Z,
}

/// A localized change of the tract shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tongue {
    /// Centre along the tube, 0 = glottis, 1 = lips.
    pub position: f64,
    /// Half width of the affected region, as a fraction of the tube.
    pub size: f64,
    /// Diameter factor at the centre. 0 closes the tract.
    pub amount: f64,
}
impl Tongue {
    /// Scales `diameters` around `position`, fully at the centre and fading out linearly
    /// over `size`. Diameters never go negative.
    pub fn apply(&self, diameters: &mut [f64]) {
        if self.size <= 0. || diameters.len() < 2 {
            return;
        }
        let last = (diameters.len() - 1) as f64;
        for (i, d) in diameters.iter_mut().enumerate() {
            let t = i as f64 / last;
            let weight = 1. - ((self.position - t).abs() / self.size).clamp(0., 1.);
            *d = interpolate(*d, *d * self.amount, weight).max(0.);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Articulation {
    /// Vocal effort multiplier, near 0 for voiceless sounds.
    pub voiced: f64,
    /// Velum aperture.
    pub nasal: f64,
    /// Turbulence at the tongue position, 0 for none.
    pub frication: f64,
    pub tongue: Tongue,
}

const fn art(voiced: f64, nasal: f64, frication: f64, tongue: (f64, f64, f64)) -> Articulation {
    Articulation {
        voiced,
        nasal,
        frication,
        tongue: Tongue {
            position: tongue.0,
            size: tongue.1,
            amount: tongue.2,
        },
    }
}

// Closures sit exactly on a segment so the tract shuts completely.
const LIPS: f64 = 1.;
const ALVEOLAR: f64 = 34. / 43.;
const VELAR: f64 = 26. / 43.;
const NASAL_OPEN: f64 = 0.4;

impl Phoneme {
    /// Folds a printed glyph into its sound class. Anything that is not an ASCII letter maps to
    /// `None`.
    pub fn from_letter(c: char) -> Option<Phoneme> {
        use Phoneme::*;
        let phoneme = match c.to_ascii_lowercase() {
            'a' => A,
            'e' | 'i' => Ee,
            'o' => O,
            'u' => U,
            'b' => B,
            'c' | 'k' | 'q' | 'x' => K,
            'd' => D,
            'f' => F,
            'g' => G,
            'h' => H,
            'j' => J,
            'l' => L,
            'm' => M,
            'n' => N,
            'p' => P,
            'r' | 'y' => Yr,
            's' => S,
            't' => T,
            'v' => V,
            'w' => W,
            'z' => Z,
            _ => return None,
        };
        Some(phoneme)
    }

    pub fn articulation(self) -> Articulation {
        use Phoneme::*;
        match self {
            A => art(1., VELUM_CLOSED, 0., (0.4, 0.25, 0.55)),
            Ee => art(1., VELUM_CLOSED, 0., (0.7, 0.2, 0.4)),
            O => art(1., VELUM_CLOSED, 0., (0.9, 0.15, 0.5)),
            U => art(1., VELUM_CLOSED, 0., (0.95, 0.1, 0.3)),
            B => art(0.8, VELUM_CLOSED, 0., (LIPS, 0.06, 0.)),
            P => art(0.2, VELUM_CLOSED, 0., (LIPS, 0.06, 0.)),
            D => art(0.8, VELUM_CLOSED, 0., (ALVEOLAR, 0.06, 0.)),
            T => art(0.2, VELUM_CLOSED, 0., (ALVEOLAR, 0.06, 0.)),
            G => art(0.8, VELUM_CLOSED, 0., (VELAR, 0.08, 0.)),
            K => art(0.2, VELUM_CLOSED, 0., (VELAR, 0.08, 0.)),
            F => art(0.2, VELUM_CLOSED, 1., (0.95, 0.06, 0.35)),
            V => art(0.8, VELUM_CLOSED, 0.6, (0.95, 0.06, 0.35)),
            S => art(0.2, VELUM_CLOSED, 1., (0.8, 0.06, 0.35)),
            Z => art(0.8, VELUM_CLOSED, 0.6, (0.8, 0.06, 0.35)),
            J => art(0.8, VELUM_CLOSED, 0.8, (0.72, 0.08, 0.35)),
            H => art(0.1, VELUM_CLOSED, 0., (0.5, 0.5, 1.)),
            L => art(1., VELUM_CLOSED, 0., (0.76, 0.05, 0.3)),
            M => art(0.9, NASAL_OPEN, 0., (LIPS, 0.06, 0.)),
            N => art(0.9, NASAL_OPEN, 0., (ALVEOLAR, 0.06, 0.)),
            W => art(1., VELUM_CLOSED, 0., (0.95, 0.1, 0.25)),
            Yr => art(1., VELUM_CLOSED, 0., (0.68, 0.15, 0.4)),
        }
    }

    pub const ALL: [Phoneme; 21] = {
        use Phoneme::*;
        [A, Ee, O, U, B, D, F, G, H, J, K, L, M, N, P, S, T, V, W, Yr, Z]
    };
}
