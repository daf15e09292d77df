//! Audio codec for Mixdeck
//!
//! Decodes raw audio bytes handed to a deck into an [`AudioBuffer`] at the
//! engine rate, and encodes captured frames into the WAV container returned
//! by the recorder. Nothing here touches the filesystem; the caller owns
//! persistence.
//!
//! WAV goes through `hound`. Anything else (MP3, FLAC, OGG) is probed from
//! the bytes and decoded with `symphonia`.
//!
//! Sample rate conversion uses linear interpolation, matching the quality of
//! the deck's varispeed read head.

use std::io::{Cursor, ErrorKind};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, ChannelLayout, StereoFrame};
use crate::error::{MixError, Result};

/// Interleaved samples straight out of a container
struct RawAudio {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

/// Decode encoded audio bytes and convert to the engine sample rate
///
/// # Errors
/// * `Decode` - empty input, an unrecognised or malformed container, more
///   than two channels, an unsupported bit depth, or a stream with no frames
pub fn decode_audio(bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let buffer = decode_native(bytes)?;
    if buffer.sample_rate() == target_rate {
        return Ok(buffer);
    }

    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let resampled = (0..buffer.num_channels())
        .map(|ch| resample_linear(buffer.channel(ch), ratio))
        .collect();
    AudioBuffer::from_channels(resampled, target_rate)
}

/// Decode encoded audio bytes, keeping the file's own sample rate
pub fn decode_native(bytes: &[u8]) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(MixError::decode("input is empty"));
    }

    let raw = if is_wav(bytes) {
        read_wav(bytes)?
    } else {
        read_compressed(bytes)?
    };

    let layout = ChannelLayout::from_count(raw.channels).ok_or_else(|| {
        MixError::decode(format!(
            "{}-channel audio (only mono/stereo supported)",
            raw.channels
        ))
    })?;
    if raw.sample_rate == 0 {
        return Err(MixError::decode("stream has no sample rate"));
    }
    if raw.samples.len() < raw.channels {
        return Err(MixError::decode("audio contains no frames"));
    }

    let buffer = AudioBuffer::from_interleaved(&raw.samples, layout, raw.sample_rate)?;
    if !buffer.is_finite() {
        return Err(MixError::decode("audio contains NaN or infinite samples"));
    }
    Ok(buffer)
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn read_wav(bytes: &[u8]) -> Result<RawAudio> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| MixError::Decode {
        reason: format!("Failed to read WAV header: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    // Checked before the samples are read
    if ChannelLayout::from_count(spec.channels as usize).is_none() {
        return Err(MixError::decode(format!(
            "{}-channel audio (only mono/stereo supported)",
            spec.channels
        )));
    }
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    Ok(RawAudio {
        samples,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

/// Detect the container from the bytes and decode its default track
fn read_compressed(bytes: &[u8]) -> Result<RawAudio> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| codec_error("Unrecognised audio format", e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| MixError::decode("no audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| codec_error("Unsupported codec", e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(codec_error("Failed to read packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                log::debug!("Skipping corrupt packet: {}", reason);
                continue;
            }
            Err(e) => return Err(codec_error("Failed to decode packet", e)),
        };
        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate.get_or_insert(spec.rate);

        let mut chunk = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        chunk.copy_interleaved_ref(decoded);
        samples.extend_from_slice(chunk.samples());
    }

    Ok(RawAudio {
        samples,
        channels,
        sample_rate: sample_rate.unwrap_or(0),
    })
}

fn codec_error(context: &str, e: SymphoniaError) -> MixError {
    MixError::Decode {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    }
}

/// Encode stereo frames as a 32-bit float WAV container
pub fn encode_wav(frames: &[StereoFrame], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + frames.len() * 8));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(to_io_error)?;
        for frame in frames {
            writer.write_sample(frame.left).map_err(to_io_error)?;
            writer.write_sample(frame.right).map_err(to_io_error)?;
        }
        writer.finalize().map_err(to_io_error)?;
    }

    Ok(cursor.into_inner())
}

/// Encode a decoded buffer as WAV bytes (mono buffers stay mono)
pub fn encode_buffer(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = buffer.num_channels();
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(to_io_error)?;
        for i in 0..buffer.num_frames() {
            for ch in 0..channels {
                let scaled = (buffer.channel(ch)[i] * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(to_io_error)?;
            }
        }
        writer.finalize().map_err(to_io_error)?;
    }

    Ok(cursor.into_inner())
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin() * 0.5)
        .collect();

    AudioBuffer::from_channels(vec![samples], sample_rate)
        .unwrap_or_else(|_| unreachable!("one channel at a non-zero rate is always valid"))
}

/// Generate a constant-level stereo buffer (DC), handy for gain tests
pub fn generate_constant(level: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    AudioBuffer::from_channels(vec![vec![level; num_samples]; 2], sample_rate)
        .unwrap_or_else(|_| unreachable!("two equal channels at a non-zero rate are always valid"))
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn to_io_error(e: hound::Error) -> MixError {
    match e {
        hound::Error::IoError(io) => MixError::Io(io),
        other => MixError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decode_err = |bits: &str, e: hound::Error| MixError::Decode {
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("float", e)),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("8-bit", e)),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("16-bit", e)),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("24-bit", e)),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err("32-bit int", e)),
        (format, bits) => Err(MixError::decode(format!(
            "unsupported sample format {:?} at {} bits",
            format, bits
        ))),
    }
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil().max(1.0) as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================
