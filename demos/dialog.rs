use hound::{SampleFormat, WavSpec, WavWriter};
use rand::rng;
use std::{env, error::Error, fs};
use vocalsyn::*;

const DEMO_TEXT: &str = "hello there, traveller!\n\
    (voice \"deep\")who goes there?\n\
    (voice \"high\")just a little bird.\n\
    (voice \"robot\")beep boop.";
const SECONDS_PER_LETTER: f64 = 0.05;

/// Usage: `dialog [text] [voices.json]`
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let text = args.next().unwrap_or_else(|| DEMO_TEXT.to_string());
    let config = match args.next() {
        Some(path) => VoiceConfig::from_json(&fs::read_to_string(path)?)?,
        None => VoiceConfig::default(),
    };

    let parms = SynthParms::default();
    let samples_per_letter = (SECONDS_PER_LETTER * parms.sample_rate as f64).round() as usize;
    let sample_rate = parms.sample_rate;
    let mut synth = VocalSynthesizer::new(parms, rng())?;
    let mut controller = VoiceController::new(config, rng())?;
    let sound = render_dialog(&mut synth, &mut controller, &text, samples_per_letter);

    let spec = WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create("dialog.wav", spec)?;
    for sample in sound {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
