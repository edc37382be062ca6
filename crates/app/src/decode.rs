use std::path::Path;

use lyric_sync_core::{AudioSignal, LyricSyncError, Result};

/// Reads a WAV file into a mono [`AudioSignal`]. Multi-channel recordings
/// are downmixed by averaging across channels.
pub fn read_wav(path: &Path) -> Result<AudioSignal> {
    if !path.exists() {
        return Err(LyricSyncError::MissingResource(path.display().to_string()));
    }

    let reader = hound::WavReader::open(path)
        .map_err(|e| LyricSyncError::msg(format!("failed to read {}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| LyricSyncError::msg(format!("corrupt sample data: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample as u32 - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| LyricSyncError::msg(format!("corrupt sample data: {e}")))?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    AudioSignal::new(samples, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmixes_stereo_int_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample(16_384_i16).unwrap();
            writer.write_sample(-16_384_i16).unwrap();
        }
        writer.finalize().unwrap();

        let signal = read_wav(&path).unwrap();
        assert_eq!(signal.sample_rate(), 8_000);
        assert!((signal.duration_seconds() - 1.0).abs() < 1e-3);
        // Opposite-phase channels cancel in the downmix.
        assert!(signal.samples().iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn missing_file_is_a_missing_resource() {
        let err = read_wav(Path::new("no-such-file.wav")).unwrap_err();
        assert!(matches!(err, LyricSyncError::MissingResource(_)));
    }
}
