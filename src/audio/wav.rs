use super::format::AudioFormat;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("PCM length {len} is not a multiple of the {block_align}-byte frame size")]
    UnalignedInput { len: usize, block_align: usize },

    #[error("WAV write failed: {0}")]
    Write(String),
}

/// Wrap raw PCM bytes in a WAV container: 44-byte header describing the
/// format, then the samples unchanged. Pure and deterministic; the only
/// rejected input is a length that does not divide into whole sample frames.
pub fn encode(pcm: &[u8], format: AudioFormat) -> Result<Vec<u8>, EncodeError> {
    let block_align = format.block_align();
    if pcm.len() % block_align != 0 {
        return Err(EncodeError::UnalignedInput {
            len: pcm.len(),
            block_align,
        });
    }

    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    let mut writer =
        WavWriter::new(&mut cursor, spec).map_err(|e| EncodeError::Write(e.to_string()))?;
    for frame in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([frame[0], frame[1]]);
        writer
            .write_sample(sample)
            .map_err(|e| EncodeError::Write(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| EncodeError::Write(e.to_string()))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    fn sample_pcm(n_samples: usize) -> Vec<u8> {
        let mut pcm = Vec::with_capacity(n_samples * 2);
        for i in 0..n_samples {
            pcm.extend_from_slice(&((i as i16).wrapping_mul(17)).to_le_bytes());
        }
        pcm
    }

    #[test]
    fn test_container_is_header_plus_samples() {
        let pcm = sample_pcm(800);
        let wav = encode(&pcm, AudioFormat::default()).unwrap();

        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        // Declared data chunk length matches the input exactly.
        let declared = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(declared as usize, pcm.len());
    }

    #[test]
    fn test_header_round_trips_format() {
        let format = AudioFormat::default();
        let pcm = sample_pcm(160);
        let wav = encode(&pcm, format).unwrap();

        let reader = WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, format.sample_rate);
        assert_eq!(spec.channels, format.channels);
        assert_eq!(spec.bits_per_sample, AudioFormat::BITS_PER_SAMPLE);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_samples_round_trip() {
        let pcm = sample_pcm(321);
        let wav = encode(&pcm, AudioFormat::default()).unwrap();

        let mut reader = WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

        let original: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_unaligned_input_is_rejected() {
        let err = encode(&[0u8; 33], AudioFormat::default()).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::UnalignedInput {
                len: 33,
                block_align: 2
            }
        ));
    }

    #[test]
    fn test_empty_input_encodes_to_bare_header() {
        let wav = encode(&[], AudioFormat::default()).unwrap();
        assert_eq!(wav.len(), 44);
    }
}
