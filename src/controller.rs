use crate::*;
use rand::Rng;

/// Extracts the voice name from a `(voice "name")` dialog tag.
/// A tag without a name yields `""`, which selects the default voice.
pub fn parse_voice_tag(tag: &str) -> Option<&str> {
    let inner = tag.trim().strip_prefix('(')?.strip_suffix(')')?.trim();
    let arg = inner.strip_prefix("voice")?;
    if !arg.is_empty() && !arg.starts_with(char::is_whitespace) && !arg.starts_with('"') {
        // some other tag, e.g. "(voiceover)"
        return None;
    }
    let arg = arg.trim();
    if arg.is_empty() {
        return Some("");
    }
    arg.strip_prefix('"')?.strip_suffix('"')
}

/// Drives the synthesizer from dialog events: one call per printed glyph, plus the skip,
/// page and exit notifications of the dialog box.
pub struct VoiceController<R: Rng> {
    config: VoiceConfig,
    voice_name: String,
    voice: Voice,
    skipping: bool,
    rng: R,
}
impl<R: Rng> VoiceController<R> {
    /// # Arguments
    /// * `config` - available voices
    /// * `rng` - source for the per-letter parameter variation
    pub fn new(config: VoiceConfig, rng: R) -> VsResult<Self> {
        config.validate()?;
        let voice = config.default_voice();
        Ok(Self {
            config,
            voice_name: DEFAULT_VOICE.to_string(),
            voice,
            skipping: false,
            rng,
        })
    }

    /// Articulates one printed glyph. Non-letters, unknown letters and skipped text fall silent.
    pub fn on_character<N: Rng>(&mut self, synth: &mut VocalSynthesizer<N>, c: Option<char>) {
        let phoneme = match c {
            Some(c) if !self.skipping && c.is_alphanumeric() => Phoneme::from_letter(c),
            _ => None,
        };
        let Some(phoneme) = phoneme else {
            log::trace!("silence on {c:?}");
            self.rest(synth);
            return;
        };
        log::trace!("{c:?} -> {phoneme:?}");

        let articulation = phoneme.articulation();
        let voice = self.voice;
        let rng = &mut self.rng;
        let glottis = &mut synth.glottis;
        let tract = &mut synth.tract;

        let first_sound = !glottis.is_touched;
        glottis.is_touched = true;
        glottis.target_tenseness = articulation.voiced * get_value(voice.voiced, rng);

        tract.reset_target();
        let strength = get_value(voice.phoneme, rng);
        Tongue {
            amount: interpolate(1., articulation.tongue.amount, strength),
            ..articulation.tongue
        }
        .apply(&mut tract.target_diameter);
        Tongue {
            position: get_value(voice.tongue_position, rng),
            size: get_value(voice.tongue_size, rng),
            amount: get_value(voice.tongue_amount, rng),
        }
        .apply(&mut tract.target_diameter);
        if articulation.frication > 0. {
            tract.constrictions.push(Constriction {
                position: articulation.tongue.position * (TRACT_LENGTH - 1) as f64,
                intensity: articulation.frication,
            });
        }
        if first_sound {
            // no glide in from the rest shape
            tract.diameter = tract.target_diameter;
        }

        apply_voice(&voice, articulation.nasal, glottis, tract, rng);
    }

    pub fn on_skip_begin(&mut self) {
        self.skipping = true;
    }

    pub fn on_skip_end(&mut self) {
        self.skipping = false;
    }

    /// The reader moved on to the next page of the dialog box.
    pub fn on_page_advance<N: Rng>(&mut self, synth: &mut VocalSynthesizer<N>) {
        self.rest(synth);
    }

    /// The dialog box closed.
    pub fn on_dialog_exit<N: Rng>(&mut self, synth: &mut VocalSynthesizer<N>) {
        self.rest(synth);
        if self.config.auto_reset {
            self.set_voice(DEFAULT_VOICE);
            let voice = self.voice;
            apply_voice(
                &voice,
                VELUM_CLOSED,
                &mut synth.glottis,
                &mut synth.tract,
                &mut self.rng,
            );
        }
    }

    /// Selects a voice by name. Unknown names select the default voice.
    pub fn set_voice(&mut self, name: &str) {
        let name = match self.config.resolve(name) {
            Some(voice) => {
                self.voice = voice;
                name
            }
            None => {
                if !name.is_empty() {
                    log::warn!("unknown voice {name:?}, using {DEFAULT_VOICE:?}");
                }
                self.voice = self.config.default_voice();
                DEFAULT_VOICE
            }
        };
        log::debug!("voice set to {name:?}");
        self.voice_name = name.to_string();
    }

    /// Handles a dialog tag. Returns `false` if it was not a voice tag.
    pub fn on_tag(&mut self, tag: &str) -> bool {
        match parse_voice_tag(tag) {
            Some(name) => {
                self.set_voice(name);
                true
            }
            None => false,
        }
    }

    pub fn voice_name(&self) -> &str {
        &self.voice_name
    }
    pub fn voice(&self) -> &Voice {
        &self.voice
    }
    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    fn rest<N: Rng>(&mut self, synth: &mut VocalSynthesizer<N>) {
        synth.tract.reset_target();
        synth.glottis.is_touched = false;
    }
}

fn apply_voice<R: Rng>(voice: &Voice, nasal: f64, glottis: &mut Glottis, tract: &mut Tract, rng: &mut R) {
    glottis.loudness = get_value(voice.volume, rng);
    glottis.vibrato_amount = get_value(voice.vibrato, rng);
    glottis.target_frequency = get_value(voice.pitch, rng);
    tract.velum_target = nasal * get_value(voice.nasal, rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ConstRng;
    use rand::{rngs::StdRng, SeedableRng};

    fn synth() -> VocalSynthesizer<StdRng> {
        let parms = SynthParms {
            seed: Some(4321.),
            ..Default::default()
        };
        VocalSynthesizer::new(parms, StdRng::seed_from_u64(99)).unwrap()
    }

    fn controller() -> VoiceController<ConstRng> {
        VoiceController::new(VoiceConfig::default(), ConstRng::MID).unwrap()
    }

    #[derive(Debug, PartialEq)]
    struct Snapshot {
        is_touched: bool,
        target_tenseness: f64,
        velum_target: f64,
        loudness: f64,
        vibrato_amount: f64,
        target_frequency: f64,
        target_diameter: [f64; TRACT_LENGTH],
        diameter: [f64; TRACT_LENGTH],
    }
    impl Snapshot {
        fn take<N: Rng>(synth: &VocalSynthesizer<N>) -> Self {
            Self {
                is_touched: synth.glottis.is_touched,
                target_tenseness: synth.glottis.target_tenseness,
                velum_target: synth.tract.velum_target,
                loudness: synth.glottis.loudness,
                vibrato_amount: synth.glottis.vibrato_amount,
                target_frequency: synth.glottis.target_frequency,
                target_diameter: synth.tract.target_diameter,
                diameter: synth.tract.diameter,
            }
        }
    }

    fn speak(text: &str) -> Vec<Snapshot> {
        let mut synth = synth();
        let mut controller = controller();
        let mut out = vec![0.; 512];
        let mut snapshots = Vec::new();
        for c in text.chars() {
            controller.on_character(&mut synth, Some(c));
            snapshots.push(Snapshot::take(&synth));
            for _ in 0..4 {
                synth.process_block(&mut out);
            }
            snapshots.push(Snapshot::take(&synth));
        }
        snapshots
    }

    #[test]
    fn test_unknown_glyphs_are_silent() {
        let mut synth = synth();
        let mut controller = controller();
        for c in [Some('!'), Some('7'), Some(' '), Some('é'), None] {
            controller.on_character(&mut synth, c);
            assert!(!synth.glottis.is_touched, "{c:?}");
            assert_eq!(synth.tract.target_diameter, synth.tract.rest_diameter);
        }
    }

    #[test]
    fn test_punctuation_stops_voicing() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('a'));
        assert!(synth.glottis.is_touched);
        controller.on_character(&mut synth, Some('.'));
        assert!(!synth.glottis.is_touched);
        assert_eq!(synth.tract.target_diameter, synth.tract.rest_diameter);
    }

    #[test]
    fn test_skipped_text_is_silent() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_skip_begin();
        controller.on_character(&mut synth, Some('a'));
        assert!(!synth.glottis.is_touched);
        controller.on_skip_end();
        controller.on_character(&mut synth, Some('a'));
        assert!(synth.glottis.is_touched);
    }

    #[test]
    fn test_first_letter() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('q'));

        let voice = Voice::FALLBACK;
        let k = Phoneme::K.articulation();
        assert!(synth.glottis.is_touched);
        assert_eq!(synth.glottis.target_tenseness, k.voiced * voice.voiced[0]);
        assert_eq!(synth.glottis.loudness, voice.volume[0]);
        assert_eq!(synth.glottis.vibrato_amount, voice.vibrato[0]);
        assert_eq!(synth.glottis.target_frequency, voice.pitch[0]);
        assert_eq!(synth.tract.velum_target, k.nasal * voice.nasal[0]);

        let mut expected = synth.tract.rest_diameter;
        k.tongue.apply(&mut expected);
        Tongue {
            position: voice.tongue_position[0],
            size: voice.tongue_size[0],
            amount: voice.tongue_amount[0],
        }
        .apply(&mut expected);
        assert_eq!(synth.tract.target_diameter, expected);
        // velar closure
        assert_eq!(synth.tract.target_diameter[26], 0.);
        // the first sound starts in place
        assert_eq!(synth.tract.diameter, synth.tract.target_diameter);
    }

    #[test]
    fn test_later_letters_glide() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('q'));
        controller.on_character(&mut synth, Some('w'));
        assert_ne!(synth.tract.diameter, synth.tract.target_diameter);
        assert_eq!(synth.tract.diameter[26], 0.);
    }

    // Segments 5, 20, 26, 30, 34, 40 and 43 of the target and current diameters, after each
    // letter of "qwer" and again after 4 blocks, with every voice parameter at its base.
    const QWER_SEGMENTS: [usize; 7] = [5, 20, 26, 30, 34, 40, 43];
    const QWER_TARGET: [[f64; 7]; 4] = [
        [0.6, 1.5, 0., 1.5, 1.5, 1.5, 1.5],
        [0.6, 1.5, 1.5, 1.5, 1.5, 0.5973837209302322, 0.9375000000000004],
        [0.6, 1.5, 1.0290697674418605, 0.6104651162790695, 1.008139534883721, 1.5, 1.5],
        [0.6, 1.5, 1.0520930232558146, 0.7060465116279069, 1.2641860465116275, 1.5, 1.5],
    ];
    const QWER_DIAMETER: [[f64; 7]; 8] = [
        [0.6, 1.5, 0., 1.5, 1.5, 1.5, 1.5],
        [0.6, 1.5, 0., 1.5, 1.5, 1.5, 1.5],
        [0.6, 1.5, 0., 1.5, 1.5, 1.5, 1.5],
        [0.6, 1.5, 0.5851428571428572, 1.5, 1.5, 0.5973837209302322, 0.9375000000000004],
        [0.6, 1.5, 0.5851428571428572, 1.5, 1.5, 0.5973837209302322, 0.9375000000000004],
        [0.6, 1.5, 1.0290697674418605, 0.6104651162790695, 1.008139534883721, 1.2939823603860146, 1.5],
        [0.6, 1.5, 1.0290697674418605, 0.6104651162790695, 1.008139534883721, 1.2939823603860146, 1.5],
        [0.6, 1.5, 1.0520930232558146, 0.7060465116279069, 1.2641860465116275, 1.5, 1.5],
    ];

    fn assert_segments(actual: &[f64; TRACT_LENGTH], expected: &[f64; 7], what: &str) {
        for (&i, &e) in QWER_SEGMENTS.iter().zip(expected) {
            assert!((actual[i] - e).abs() < 1e-12, "{what}[{i}] = {}, expected {e}", actual[i]);
        }
    }

    #[test]
    fn test_qwer_articulation() {
        let snapshots = speak("qwer");
        assert_eq!(snapshots.len(), 8);
        for (k, s) in snapshots.iter().enumerate() {
            let letter = k / 2;
            let what = format!("snapshot {k}");
            assert!(s.is_touched, "{what}");
            // q is voiceless, the rest fully voiced
            let tenseness = if letter == 0 { 0.2 * 0.7 } else { 0.7 };
            assert!((s.target_tenseness - tenseness).abs() < 1e-12, "{what}");
            assert_eq!(s.velum_target, 0.01, "{what}");
            assert_eq!(s.target_frequency, 140., "{what}");
            assert_eq!(s.loudness, 0.75, "{what}");
            assert_eq!(s.vibrato_amount, 0.005, "{what}");
            assert_segments(&s.target_diameter, &QWER_TARGET[letter], &format!("{what} target"));
            assert_segments(&s.diameter, &QWER_DIAMETER[k], &format!("{what} diameter"));
        }
        assert_eq!(snapshots, speak("qwer"));
    }

    #[test]
    fn test_fricative_places_constriction() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('s'));
        assert_eq!(synth.tract.constrictions.len(), 1);
        let position = synth.tract.constrictions[0].position;
        assert!((position - 0.8 * 43.).abs() < 1e-9);
        controller.on_character(&mut synth, Some('a'));
        assert!(synth.tract.constrictions.is_empty());
        controller.on_character(&mut synth, Some('s'));
        controller.on_character(&mut synth, Some(' '));
        assert!(synth.tract.constrictions.is_empty());
    }

    #[test]
    fn test_nasal_opens_velum() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('m'));
        assert_eq!(synth.tract.velum_target, 0.4);
        controller.on_character(&mut synth, Some('a'));
        assert_eq!(synth.tract.velum_target, VELUM_CLOSED);
    }

    #[test]
    fn test_unknown_voice_falls_back() {
        let mut controller = controller();
        controller.set_voice("robot");
        assert_eq!(controller.voice_name(), "robot");
        assert_eq!(controller.voice().pitch, [110., 0.]);
        controller.set_voice("nobody");
        assert_eq!(controller.voice_name(), DEFAULT_VOICE);
        assert_eq!(*controller.voice(), Voice::FALLBACK);
        controller.set_voice("robot");
        controller.set_voice("");
        assert_eq!(controller.voice_name(), DEFAULT_VOICE);
    }

    #[test]
    fn test_voice_changes_pitch() {
        let mut synth = synth();
        let mut controller = controller();
        assert!(controller.on_tag("(voice \"deep\")"));
        controller.on_character(&mut synth, Some('a'));
        assert_eq!(synth.glottis.target_frequency, 85.);
    }

    #[test]
    fn test_page_advance_rests() {
        let mut synth = synth();
        let mut controller = controller();
        controller.on_character(&mut synth, Some('a'));
        controller.on_page_advance(&mut synth);
        assert!(!synth.glottis.is_touched);
        assert_eq!(synth.tract.target_diameter, synth.tract.rest_diameter);
    }

    #[test]
    fn test_exit_resets_voice() {
        let mut synth = synth();
        let mut controller = controller();
        controller.set_voice("high");
        controller.on_character(&mut synth, Some('a'));
        assert_eq!(synth.glottis.target_frequency, 260.);
        controller.on_dialog_exit(&mut synth);
        assert!(!synth.glottis.is_touched);
        assert_eq!(controller.voice_name(), DEFAULT_VOICE);
        assert_eq!(synth.glottis.target_frequency, Voice::FALLBACK.pitch[0]);
        assert_eq!(synth.tract.velum_target, VELUM_CLOSED);
    }

    #[test]
    fn test_exit_keeps_voice_without_auto_reset() {
        let mut synth = synth();
        let config = VoiceConfig {
            auto_reset: false,
            ..Default::default()
        };
        let mut controller = VoiceController::new(config, ConstRng::MID).unwrap();
        controller.set_voice("high");
        controller.on_dialog_exit(&mut synth);
        assert_eq!(controller.voice_name(), "high");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = VoiceConfig {
            auto_reset: true,
            voices: Default::default(),
        };
        assert!(VoiceController::new(config, ConstRng::MID).is_err());
    }

    #[test]
    fn test_parse_voice_tag() {
        assert_eq!(parse_voice_tag("(voice \"robot\")"), Some("robot"));
        assert_eq!(parse_voice_tag("  ( voice  \"two words\" ) "), Some("two words"));
        assert_eq!(parse_voice_tag("(voice \"\")"), Some(""));
        assert_eq!(parse_voice_tag("(voice)"), Some(""));
        assert_eq!(parse_voice_tag("(voiceover \"x\")"), None);
        assert_eq!(parse_voice_tag("(say \"x\")"), None);
        assert_eq!(parse_voice_tag("(voice robot)"), None);
        assert_eq!(parse_voice_tag("voice \"robot\""), None);
    }
}
