use crate::*;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

// Smooth noise

const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// The twelve edge gradients of a cube, projected onto the xy plane.
const GRADIENTS: [(f64, f64); 12] = [
    (1., 1.),
    (-1., 1.),
    (1., -1.),
    (-1., -1.),
    (1., 0.),
    (-1., 0.),
    (1., 0.),
    (-1., 0.),
    (0., 1.),
    (0., -1.),
    (0., 1.),
    (0., -1.),
];

/// Seeded 2-D simplex noise, used as a slow modulation source.
//
// Formulas:
//  Skew into the simplex grid:
//    F2 = (sqrt(3) - 1) / 2,   s = (x + y) * F2,   (i, j) = floor(x + s, y + s)
//  Unskew back:
//    G2 = (3 - sqrt(3)) / 6,   t = (i + j) * G2,   (x0, y0) = (x - i + t, y - j + t)
//  Corner contribution:
//    n = (0.5 - dx^2 - dy^2)^4 * (g . d)   if positive, else 0
//  Result:
//    70 * (n0 + n1 + n2)                    approximately within -1 .. 1
#[derive(Clone)]
pub struct NoiseField {
    perm: [u8; 512],
    grad: [(f64, f64); 512],
}
impl NoiseField {
    pub fn new(seed: f64) -> Self {
        let mut field = Self {
            perm: [0; 512],
            grad: [(0., 0.); 512],
        };
        field.seed(seed);
        field
    }

    /// Creates a field seeded from the wall clock, in milliseconds.
    pub fn from_time() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        // only the low 16 bits select the permutation
        Self::new((millis & 0xffff) as f64)
    }

    /// Regenerates the permutation and gradient tables.
    /// Values in (0, 1) are scaled by 65536, values below 256 are copied into the high byte.
    pub fn seed(&mut self, seed: f64) {
        let seed = if seed > 0. && seed < 1. {
            seed * 65536.
        } else {
            seed
        };
        let mut seed = seed.floor() as i64;
        if seed < 256 {
            seed |= seed << 8;
        }
        for i in 0..256 {
            let v = if i & 1 == 1 {
                PERMUTATION[i] ^ (seed & 255) as u8
            } else {
                PERMUTATION[i] ^ ((seed >> 8) & 255) as u8
            };
            self.perm[i] = v;
            self.perm[i + 256] = v;
            self.grad[i] = GRADIENTS[v as usize % 12];
            self.grad[i + 256] = GRADIENTS[v as usize % 12];
        }
    }

    pub fn simplex2(&self, xin: f64, yin: f64) -> f64 {
        let f2 = 0.5 * (3_f64.sqrt() - 1.);
        let g2 = (3. - 3_f64.sqrt()) / 6.;

        let s = (xin + yin) * f2;
        let i = (xin + s).floor();
        let j = (yin + s).floor();
        let t = (i + j) * g2;
        let x0 = xin - i + t;
        let y0 = yin - j + t;

        // lower or upper triangle of the skewed cell
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };
        let x1 = x0 - i1 as f64 + g2;
        let y1 = y0 - j1 as f64 + g2;
        let x2 = x0 - 1. + 2. * g2;
        let y2 = y0 - 1. + 2. * g2;

        let i = (i as i64 & 255) as usize;
        let j = (j as i64 & 255) as usize;
        let g0 = self.grad[i + self.perm[j] as usize];
        let g1 = self.grad[i + i1 + self.perm[j + j1] as usize];
        let g2c = self.grad[i + 1 + self.perm[j + 1] as usize];

        70. * (corner(x0, y0, g0) + corner(x1, y1, g1) + corner(x2, y2, g2c))
    }

    /// 1-D noise taken along a fixed line through the 2-D field.
    pub fn simplex1(&self, x: f64) -> f64 {
        self.simplex2(x * 1.2, -x * 0.7)
    }
}

fn corner(x: f64, y: f64, g: (f64, f64)) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0. {
        0.
    } else {
        let t = t * t;
        t * t * (g.0 * x + g.1 * y)
    }
}

// Band-passed noise

/// Returns a random number within the range -1 .. 1.
fn get_white_noise<R: Rng>(rng: &mut R) -> f64 {
    rng.random_range(-1. ..=1.)
}

/// Centre frequency and Q of the aspiration noise at the glottis.
pub const ASPIRATION_NOISE: (f64, f64) = (500., 0.5);
/// Centre frequency and Q of the frication noise in the tract.
pub const FRICATION_NOISE: (f64, f64) = (1000., 0.5);

/// White noise coloured by a band-pass filter.
/// The generator is supplied per call so several sources can share one.
#[derive(Clone)]
pub struct FilteredNoise {
    filter: BandPass,
}
impl FilteredNoise {
    pub fn new(sample_rate: usize, (f, q): (f64, f64)) -> VsResult<Self> {
        let mut filter = BandPass::new(sample_rate);
        filter.set(f, q)?;
        Ok(Self { filter })
    }

    pub fn get_next<R: Rng>(&mut self, rng: &mut R) -> f64 {
        let x = get_white_noise(rng);
        self.filter.step(x)
    }
}
