//! WAV encode/decode for recognizer payloads and batch clips.

use std::io::Cursor;
use std::path::Path;

use crate::buffering::chunk::CommandAudio;
use crate::error::{HearthError, Result};

/// Encode mono 16-bit PCM into an in-memory WAV container.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| HearthError::Wav(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| HearthError::Wav(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| HearthError::Wav(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Read a mono 16-bit WAV file into `CommandAudio`.
///
/// # Errors
/// Rejects non-mono or non-16-bit files — the transcode step is expected
/// to have normalized the format already.
pub fn read_wav(path: &Path) -> Result<CommandAudio> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| HearthError::Wav(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(HearthError::Wav(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(HearthError::Wav(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .map_err(|e| HearthError::Wav(e.to_string()))?;

    Ok(CommandAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_read_preserves_samples() {
        let samples: Vec<i16> = (0..400).map(|i| (i * 37 % 2_000) as i16 - 1_000).collect();
        let bytes = encode_wav(&samples, 16_000).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, &bytes).unwrap();

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.samples, samples);
    }

    #[test]
    fn read_rejects_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..64 {
            writer.write_sample(0i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(read_wav(&path).is_err());
    }
}
