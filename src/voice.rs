use crate::*;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;

/// `[base, range]`: values are drawn from `base` to `base + range`, clustered at `base`.
pub type ParamRange = [f64; 2];

/// Name of the voice every other voice falls back to.
pub const DEFAULT_VOICE: &str = "default";

/// Largest vibrato depth a voice may ask for. Deeper vibrato would swing the pitch through 0.
pub const MAX_VIBRATO: f64 = 0.9;

/// Draws a value from a `[base, range]` pair.
/// `base + range * (2u - 1)^2` with `u` uniform in 0 .. 1: most likely near `base`,
/// thinning out towards `base + range`. `u = 0.5` gives exactly `base`.
pub fn get_value<R: Rng>(range: ParamRange, rng: &mut R) -> f64 {
    let [base, spread] = range;
    let u: f64 = rng.random();
    base + spread * (2. * u - 1.).powi(2)
}

/// A voice as written in the configuration. Missing fields come from the default voice.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoiceParms {
    pub volume: Option<ParamRange>,
    pub pitch: Option<ParamRange>,
    pub vibrato: Option<ParamRange>,
    pub phoneme: Option<ParamRange>,
    pub nasal: Option<ParamRange>,
    pub voiced: Option<ParamRange>,
    pub tongue_position: Option<ParamRange>,
    pub tongue_size: Option<ParamRange>,
    pub tongue_amount: Option<ParamRange>,
}

/// A fully resolved voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voice {
    /// Glottis loudness.
    pub volume: ParamRange,
    /// Pitch in Hz.
    pub pitch: ParamRange,
    /// Vibrato depth, relative to pitch.
    pub vibrato: ParamRange,
    /// How strongly the phoneme's tongue shape is applied, 0 .. 1.
    pub phoneme: ParamRange,
    /// Velum aperture multiplier.
    pub nasal: ParamRange,
    /// Vocal effort multiplier.
    pub voiced: ParamRange,
    /// Per-letter tongue wobble, independent of the phoneme.
    pub tongue_position: ParamRange,
    pub tongue_size: ParamRange,
    pub tongue_amount: ParamRange,
}
impl Voice {
    /// Values used when even the configured default voice leaves a field out.
    pub const FALLBACK: Voice = Voice {
        volume: [0.75, 0.05],
        pitch: [140., 30.],
        vibrato: [0.005, 0.005],
        phoneme: [1., 0.],
        nasal: [1., 0.],
        voiced: [0.7, 0.2],
        tongue_position: [0.5, 0.3],
        tongue_size: [0.15, 0.05],
        tongue_amount: [1., 0.15],
    };

    fn resolve(parms: &VoiceParms, fallback: &Voice) -> Voice {
        Voice {
            volume: parms.volume.unwrap_or(fallback.volume),
            pitch: parms.pitch.unwrap_or(fallback.pitch),
            vibrato: parms.vibrato.unwrap_or(fallback.vibrato),
            phoneme: parms.phoneme.unwrap_or(fallback.phoneme),
            nasal: parms.nasal.unwrap_or(fallback.nasal),
            voiced: parms.voiced.unwrap_or(fallback.voiced),
            tongue_position: parms.tongue_position.unwrap_or(fallback.tongue_position),
            tongue_size: parms.tongue_size.unwrap_or(fallback.tongue_size),
            tongue_amount: parms.tongue_amount.unwrap_or(fallback.tongue_amount),
        }
    }

    fn fields(&self) -> [(&'static str, ParamRange); 9] {
        [
            ("volume", self.volume),
            ("pitch", self.pitch),
            ("vibrato", self.vibrato),
            ("phoneme", self.phoneme),
            ("nasal", self.nasal),
            ("voiced", self.voiced),
            ("tonguePosition", self.tongue_position),
            ("tongueSize", self.tongue_size),
            ("tongueAmount", self.tongue_amount),
        ]
    }
}

fn default_auto_reset() -> bool {
    true
}

/// The named voices available to dialog, plus reset behaviour.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoiceConfig {
    /// Return to the default voice whenever a dialog closes.
    #[serde(default = "default_auto_reset")]
    pub auto_reset: bool,
    pub voices: BTreeMap<String, VoiceParms>,
}
impl VoiceConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> VsResult<Self> {
        let config: VoiceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VsResult<()> {
        if !self.voices.contains_key(DEFAULT_VOICE) {
            return VsError::err("voice configuration has no \"default\" voice");
        }
        for name in self.voices.keys() {
            let Some(voice) = self.resolve(name) else {
                continue;
            };
            for (field, [base, range]) in voice.fields() {
                if !base.is_finite() || !range.is_finite() {
                    return VsError::err(format!("voice {name:?}: {field} is not finite"));
                }
            }
            let [base, range] = voice.pitch;
            if base.min(base + range) <= 0. {
                return VsError::err(format!("voice {name:?}: pitch must stay above 0 Hz"));
            }
            let [base, range] = voice.vibrato;
            if base.abs().max((base + range).abs()) > MAX_VIBRATO {
                return VsError::err(format!(
                    "voice {name:?}: vibrato must stay within -{MAX_VIBRATO} .. {MAX_VIBRATO}"
                ));
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.voices.contains_key(name)
    }

    /// Resolves a voice by name, or `None` if there is no such voice.
    pub fn resolve(&self, name: &str) -> Option<Voice> {
        let parms = self.voices.get(name)?;
        Some(Voice::resolve(parms, &self.default_voice()))
    }

    pub fn default_voice(&self) -> Voice {
        match self.voices.get(DEFAULT_VOICE) {
            Some(parms) => Voice::resolve(parms, &Voice::FALLBACK),
            None => Voice::FALLBACK,
        }
    }
}
impl Default for VoiceConfig {
    fn default() -> Self {
        let mut voices = BTreeMap::new();
        voices.insert(DEFAULT_VOICE.to_string(), VoiceParms::default());
        voices.insert(
            "deep".to_string(),
            VoiceParms {
                pitch: Some([85., 15.]),
                tongue_amount: Some([0.9, 0.1]),
                ..Default::default()
            },
        );
        voices.insert(
            "high".to_string(),
            VoiceParms {
                pitch: Some([260., 40.]),
                vibrato: Some([0.01, 0.005]),
                ..Default::default()
            },
        );
        voices.insert(
            "whisper".to_string(),
            VoiceParms {
                volume: Some([0.5, 0.]),
                voiced: Some([0.05, 0.05]),
                ..Default::default()
            },
        );
        voices.insert(
            "robot".to_string(),
            VoiceParms {
                pitch: Some([110., 0.]),
                vibrato: Some([0., 0.]),
                voiced: Some([0.9, 0.]),
                tongue_amount: Some([1., 0.]),
                ..Default::default()
            },
        );
        Self {
            auto_reset: true,
            voices,
        }
    }
}
