// Audio decoder using Symphonia
// Decodes in-memory clip bytes to interleaved f32 PCM

use std::io::Cursor;

use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

use super::buffer::AudioBuffer;
use super::resample::resample;

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

impl AudioDecoder {
    /// Probe clip bytes and prepare for decoding.
    /// `extension` is only a hint, the container is sniffed from the bytes.
    pub fn from_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self, String> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| format!("Failed to probe format: {}", e))?;

        let format = probed.format;

        let track = format.tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| "No audio track found".to_string())?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| format!("Failed to create decoder: {}", e))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode next packet, returns interleaved f32 samples
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, String> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(format!("Failed to read packet: {}", e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    // Some streams only reveal their real layout once decoding starts
                    let spec = decoded.spec();
                    self.sample_rate = spec.rate;
                    self.channels = spec.channels.count();
                    return Ok(Some(audio_buf_to_f32(&decoded)));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => return Err(format!("Decode failed: {}", e)),
            }
        }
    }

    /// Decode the whole stream into one buffer
    pub fn decode_all(mut self) -> Result<AudioBuffer, String> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(&chunk);
        }
        if samples.is_empty() {
            return Err("Stream contained no audio".to_string());
        }
        Ok(AudioBuffer::new(samples, self.sample_rate, self.channels as u16))
    }
}

/// Decode clip bytes and bring them to the engine's sample rate,
/// so buffer positions line up with engine frames
pub fn decode_clip(bytes: Vec<u8>, extension: Option<&str>, target_rate: u32) -> Result<AudioBuffer, String> {
    let buffer = AudioDecoder::from_bytes(bytes, extension)?.decode_all()?;
    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }
    resample(&buffer, target_rate)
}

/// Convert any AudioBufferRef to interleaved f32 samples
fn audio_buf_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::F32(b) => interleave(b.planes(), b.frames(), |s: f32| s),
        AudioBufferRef::F64(b) => interleave(b.planes(), b.frames(), |s: f64| s as f32),
        AudioBufferRef::S8(b) => interleave(b.planes(), b.frames(), |s: i8| s as f32 / 128.0),
        AudioBufferRef::S16(b) => interleave(b.planes(), b.frames(), |s: i16| s as f32 / 32768.0),
        AudioBufferRef::S24(b) => {
            interleave(b.planes(), b.frames(), |s| s.inner() as f32 / 8388608.0)
        }
        AudioBufferRef::S32(b) => {
            interleave(b.planes(), b.frames(), |s: i32| s as f32 / 2147483648.0)
        }
        AudioBufferRef::U8(b) => {
            interleave(b.planes(), b.frames(), |s: u8| (s as f32 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(b) => {
            interleave(b.planes(), b.frames(), |s: u16| (s as f32 - 32768.0) / 32768.0)
        }
        AudioBufferRef::U24(b) => {
            interleave(b.planes(), b.frames(), |s| (s.inner() as f32 - 8388608.0) / 8388608.0)
        }
        AudioBufferRef::U32(b) => {
            interleave(b.planes(), b.frames(), |s: u32| (s as f64 - 2147483648.0) as f32 / 2147483648.0)
        }
    }
}

fn interleave<T: Sample + Copy, F: Fn(T) -> f32>(planes: AudioPlanes<T>, frames: usize, convert: F) -> Vec<f32> {
    let planes = planes.planes();
    if planes.is_empty() || frames == 0 {
        return vec![];
    }

    let mut interleaved = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            interleaved.push(convert(plane[frame]));
        }
    }
    interleaved
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 16-bit PCM WAV bytes, `value` on every sample
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: usize, value: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames * channels as usize {
                writer.write_sample(value).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav() {
        let bytes = wav_bytes(8000, 2, 4000, 16384);
        let buffer = AudioDecoder::from_bytes(bytes, Some("wav"))
            .unwrap()
            .decode_all()
            .unwrap();

        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 4000);
        assert!((buffer.duration().as_secs_f64() - 0.5).abs() < 1e-9);
        assert!((buffer.samples()[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_clip_keeps_matching_rate() {
        let bytes = wav_bytes(8000, 1, 800, 0);
        let buffer = decode_clip(bytes, Some("wav"), 8000).unwrap();
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.frames(), 800);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = AudioDecoder::from_bytes(b"definitely not audio".to_vec(), Some("mp3"))
            .and_then(|d| d.decode_all());
        assert!(result.is_err());
    }
}
