mod controller;
mod filter;
mod glottis;
mod noise;
mod phoneme;
mod synth;
mod tract;
mod utils;
mod voice;

#[cfg(test)]
mod test_utils;

pub use controller::*;
pub use filter::*;
pub use glottis::*;
pub use noise::*;
pub use phoneme::*;
pub use synth::*;
pub use tract::*;
pub use utils::*;
pub use voice::*;
