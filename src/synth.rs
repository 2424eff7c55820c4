use crate::*;
use rand::Rng;
use serde::Deserialize;
use std::mem;

/// Main parameters of the synthesizer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SynthParms {
    /// Sample rate in Hz.
    pub sample_rate: usize,
    /// Number of samples per audio block. Articulators move once per block.
    pub block_size: usize,
    /// Keep the glottis sounding between letters.
    pub always_voice: bool,
    /// Add a slow random drift to the pitch.
    pub auto_wobble: bool,
    /// Noise field seed, or `None` to seed from the clock.
    pub seed: Option<f64>,
}
impl Default for SynthParms {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            always_voice: false,
            auto_wobble: false,
            seed: None,
        }
    }
}
impl SynthParms {
    pub fn from_json(json: &str) -> VsResult<Self> {
        let parms: SynthParms = serde_json::from_str(json)?;
        parms.validate()?;
        Ok(parms)
    }

    pub fn validate(&self) -> VsResult<()> {
        if self.sample_rate == 0 {
            return VsError::err("sample rate must be greater than 0");
        }
        if self.block_size == 0 {
            return VsError::err("block size must be greater than 0");
        }
        if let Some(seed) = self.seed {
            if !seed.is_finite() {
                return VsError::err("noise seed must be finite");
            }
        }
        Ok(())
    }

    /// Duration of one block in seconds.
    pub fn block_time(&self) -> f64 {
        self.block_size as f64 / self.sample_rate as f64
    }
}

/// Glottis and tract wired together, plus the noise they are driven with.
pub struct VocalSynthesizer<R: Rng> {
    parms: SynthParms,
    pub glottis: Glottis,
    pub tract: Tract,
    aspiration: FilteredNoise,
    frication: FilteredNoise,
    aspiration_buf: Vec<f64>,
    frication_buf: Vec<f64>,
    rng: R,
}
impl<R: Rng> VocalSynthesizer<R> {
    /// # Arguments
    /// * `parms` - main parameters
    /// * `rng` - white noise source for aspiration and frication
    pub fn new(parms: SynthParms, rng: R) -> VsResult<Self> {
        parms.validate()?;
        let noise = parms.seed.map(NoiseField::new).unwrap_or_else(NoiseField::from_time);
        let mut glottis = Glottis::new(parms.sample_rate, noise);
        glottis.always_voice = parms.always_voice;
        glottis.auto_wobble = parms.auto_wobble;
        let tract = Tract::new(parms.sample_rate);
        let aspiration = FilteredNoise::new(parms.sample_rate, ASPIRATION_NOISE)?;
        let frication = FilteredNoise::new(parms.sample_rate, FRICATION_NOISE)?;
        log::info!(
            "synthesizer ready: {} Hz, {} samples per block, seed {:?}",
            parms.sample_rate,
            parms.block_size,
            parms.seed
        );
        Ok(Self {
            aspiration_buf: Vec::with_capacity(parms.block_size),
            frication_buf: Vec::with_capacity(parms.block_size),
            parms,
            glottis,
            tract,
            aspiration,
            frication,
            rng,
        })
    }

    pub fn parms(&self) -> &SynthParms {
        &self.parms
    }

    /// Fills `out` with one block of audio, generating its own noise.
    pub fn process_block(&mut self, out: &mut [f32]) {
        let mut aspiration = mem::take(&mut self.aspiration_buf);
        let mut frication = mem::take(&mut self.frication_buf);
        aspiration.clear();
        frication.clear();
        for _ in 0..out.len() {
            aspiration.push(self.aspiration.get_next(&mut self.rng));
            frication.push(self.frication.get_next(&mut self.rng));
        }
        self.process_block_with_noise(out, &aspiration, &frication);
        self.aspiration_buf = aspiration;
        self.frication_buf = frication;
    }

    /// Fills `out` with one block of audio from host supplied noise.
    /// The tract runs at twice the output rate. Missing noise samples count as silence.
    /// # Arguments
    /// * `out` - output block
    /// * `aspiration` - band-passed noise for the glottis
    /// * `frication` - band-passed noise for the constrictions
    pub fn process_block_with_noise(&mut self, out: &mut [f32], aspiration: &[f64], frication: &[f64]) {
        let n = out.len();
        if n == 0 {
            return;
        }
        for (j, sample) in out.iter_mut().enumerate() {
            let lambda1 = j as f64 / n as f64;
            let lambda2 = (j as f64 + 0.5) / n as f64;
            let asp = aspiration.get(j).copied().unwrap_or(0.);
            let fric = frication.get(j).copied().unwrap_or(0.);

            let glottal_output = self.glottis.run_step(lambda1, asp);
            let turbulence = fric * self.glottis.noise_modulator();

            self.tract.run_step(glottal_output, turbulence, lambda1);
            let mut v = self.tract.lip_output() + self.tract.nose_output();
            self.tract.run_step(glottal_output, turbulence, lambda2);
            v += self.tract.lip_output() + self.tract.nose_output();
            *sample = (v * 0.125) as f32;
        }
        self.glottis.finish_block();
        self.tract.finish_block(n as f64 / self.parms.sample_rate as f64);
    }
}

/// Speaks a dialog text offline and returns the samples.
/// Glyphs are printed every `samples_per_letter` samples, `(voice "name")` tags switch the
/// voice and `'\n'` advances the page. The result ends with the release after the dialog closes.
pub fn render_dialog<R: Rng, C: Rng>(
    synth: &mut VocalSynthesizer<R>,
    controller: &mut VoiceController<C>,
    text: &str,
    samples_per_letter: usize,
) -> Vec<f32> {
    const TAIL_BLOCKS: usize = 8;
    const MAX_RELEASE_BLOCKS: usize = 100;
    let block_size = synth.parms().block_size;
    let mut out = Vec::new();
    let mut block = vec![0.; block_size];
    let mut deadline = 0;

    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c == '(' {
            if let Some(end) = rest.find(')') {
                if controller.on_tag(&rest[..=end]) {
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        rest = &rest[c.len_utf8()..];
        if c == '\n' {
            controller.on_page_advance(synth);
        } else {
            controller.on_character(synth, Some(c));
        }
        deadline += samples_per_letter;
        while out.len() < deadline {
            synth.process_block(&mut block);
            out.extend_from_slice(&block);
        }
    }

    controller.on_dialog_exit(synth);
    let mut release = 0;
    while synth.glottis.intensity() > 0. && release < MAX_RELEASE_BLOCKS {
        synth.process_block(&mut block);
        out.extend_from_slice(&block);
        release += 1;
    }
    for _ in 0..TAIL_BLOCKS {
        synth.process_block(&mut block);
        out.extend_from_slice(&block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ConstRng;
    use rand::{rngs::StdRng, SeedableRng};

    const SEED: f64 = 1234.;

    fn parms() -> SynthParms {
        SynthParms {
            seed: Some(SEED),
            ..Default::default()
        }
    }

    fn synth() -> VocalSynthesizer<StdRng> {
        VocalSynthesizer::new(parms(), StdRng::seed_from_u64(7)).unwrap()
    }

    fn voice(synth: &mut VocalSynthesizer<StdRng>) {
        let mut controller = VoiceController::new(VoiceConfig::default(), ConstRng::MID).unwrap();
        controller.on_character(synth, Some('a'));
    }

    #[test]
    fn test_invalid_parms() {
        let zero_rate = SynthParms {
            sample_rate: 0,
            ..parms()
        };
        assert!(VocalSynthesizer::new(zero_rate, StdRng::seed_from_u64(7)).is_err());
        let zero_block = SynthParms {
            block_size: 0,
            ..parms()
        };
        assert!(VocalSynthesizer::new(zero_block, StdRng::seed_from_u64(7)).is_err());
        let bad_seed = SynthParms {
            seed: Some(f64::NAN),
            ..parms()
        };
        assert!(bad_seed.validate().is_err());
    }

    #[test]
    fn test_parms_from_json() {
        let parms = SynthParms::from_json("{}").unwrap();
        assert_eq!(parms, SynthParms::default());
        let parms = SynthParms::from_json(r#"{ "sampleRate": 22050, "alwaysVoice": true, "seed": 3 }"#)
            .unwrap();
        assert_eq!(parms.sample_rate, 22050);
        assert_eq!(parms.block_size, 512);
        assert!(parms.always_voice);
        assert_eq!(parms.seed, Some(3.));
        assert!(SynthParms::from_json(r#"{ "blockSize": 0 }"#).is_err());
        let e = SynthParms::from_json(r#"{ "rate": 1 }"#).unwrap_err();
        assert!(e.get_msg().starts_with("invalid configuration"));
    }

    #[test]
    fn test_block_time() {
        let parms = SynthParms {
            sample_rate: 1000,
            block_size: 250,
            ..parms()
        };
        assert_eq!(parms.block_time(), 0.25);
    }

    #[test]
    fn test_silence() {
        let mut synth = synth();
        let mut out = vec![1.; 512];
        for _ in 0..20 {
            synth.process_block(&mut out);
            assert!(out.iter().all(|&v| v == 0.));
        }
    }

    #[test]
    fn test_voiced_output() {
        let mut synth = synth();
        voice(&mut synth);
        let mut out = vec![0.; 512];
        let mut peak = 0_f32;
        for _ in 0..40 {
            synth.process_block(&mut out);
            for &v in &out {
                assert!(v.is_finite());
                peak = peak.max(v.abs());
            }
        }
        assert!(peak > 0.01, "peak {peak}");
        assert!(peak < 2., "peak {peak}");
    }

    // Each output sample is 0.125 times the sum of two tract steps at j/N and (j+0.5)/N.
    #[test]
    fn test_tract_runs_at_twice_the_rate() {
        let mut synth = synth();
        voice(&mut synth);
        let mut out = vec![0.; 256];
        for _ in 0..10 {
            synth.process_block(&mut out);
        }
        let n = 256;
        let mut rng = StdRng::seed_from_u64(11);
        let aspiration: Vec<f64> = (0..n).map(|_| rng.random::<f64>() * 2. - 1.).collect();
        let frication: Vec<f64> = (0..n).map(|_| rng.random::<f64>() * 2. - 1.).collect();
        let mut glottis = synth.glottis.clone();
        let mut tract = synth.tract.clone();
        synth.process_block_with_noise(&mut out, &aspiration, &frication);

        for j in 0..n {
            let lambda1 = j as f64 / n as f64;
            let lambda2 = (j as f64 + 0.5) / n as f64;
            let glottal_output = glottis.run_step(lambda1, aspiration[j]);
            let turbulence = frication[j] * glottis.noise_modulator();
            tract.run_step(glottal_output, turbulence, lambda1);
            let first = tract.lip_output() + tract.nose_output();
            tract.run_step(glottal_output, turbulence, lambda2);
            let second = tract.lip_output() + tract.nose_output();
            assert_eq!(out[j], (0.125 * (first + second)) as f32, "sample {j}");
        }
    }

    #[test]
    fn test_missing_noise_is_silence() {
        let mut a = synth();
        let mut b = synth();
        voice(&mut a);
        voice(&mut b);
        let mut out_a = vec![0.; 128];
        let mut out_b = vec![0.; 128];
        a.process_block_with_noise(&mut out_a, &[], &[]);
        b.process_block_with_noise(&mut out_b, &[0.; 128], &[0.; 128]);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_empty_block() {
        let mut synth = synth();
        voice(&mut synth);
        let before = synth.glottis.intensity();
        synth.process_block(&mut []);
        assert_eq!(synth.glottis.intensity(), before);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut synth = synth();
            voice(&mut synth);
            let mut out = vec![0.; 512];
            let mut all = Vec::new();
            for _ in 0..10 {
                synth.process_block(&mut out);
                all.extend_from_slice(&out);
            }
            all
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_always_voice() {
        let parms = SynthParms {
            always_voice: true,
            ..parms()
        };
        let mut synth = VocalSynthesizer::new(parms, StdRng::seed_from_u64(7)).unwrap();
        let mut out = vec![0.; 512];
        for _ in 0..10 {
            synth.process_block(&mut out);
        }
        assert_eq!(synth.glottis.intensity(), 1.);
        assert!(out.iter().any(|&v| v != 0.));
    }

    #[test]
    fn test_render_dialog() {
        let mut synth = synth();
        let mut controller = VoiceController::new(VoiceConfig::default(), ConstRng::MID).unwrap();
        let samples = render_dialog(&mut synth, &mut controller, "(voice \"deep\")hi!\nok", 2205);
        // 6 glyphs, rounded up to whole blocks, then the release
        assert!(samples.len() >= 6 * 2205);
        assert_eq!(samples.len() % 512, 0);
        assert!(samples.iter().all(|v| v.is_finite()));
        assert!(samples.iter().any(|&v| v != 0.));
        assert_eq!(synth.glottis.intensity(), 0.);
        // auto reset after the dialog
        assert_eq!(controller.voice_name(), DEFAULT_VOICE);
    }

    #[test]
    fn test_render_dialog_keeps_unknown_tags() {
        let mut synth = synth();
        let mut controller = VoiceController::new(VoiceConfig::default(), ConstRng::MID).unwrap();
        let tagged = render_dialog(&mut synth, &mut controller, "(voice \"high\")", 512);
        let plain = 8 * 512;
        assert_eq!(tagged.len(), plain);

        let mut synth = self::synth();
        let text = "(hello)";
        let samples = render_dialog(&mut synth, &mut controller, text, 512);
        assert!(samples.len() >= text.len() * 512);
    }
}
