//! Byte-level conversion between `.raw` payloads and `f64` samples

use crate::error::{NextMindError, Result};
use crate::signal::SignalBuffer;
use crate::types::{ByteOrder, FrameLayout, MetadataFields, RecordingMetadata, SampleDtype};
use byteorder::{BigEndian, LittleEndian};
use std::path::Path;

fn read_values<E: byteorder::ByteOrder>(bytes: &[u8], dtype: SampleDtype) -> Vec<f64> {
    let width = dtype.bytes_per_sample();
    let chunks = bytes.chunks_exact(width);
    match dtype {
        SampleDtype::Int16 => chunks.map(|b| E::read_i16(b) as f64).collect(),
        SampleDtype::Float32 => chunks.map(|b| E::read_f32(b) as f64).collect(),
        SampleDtype::Int32 => chunks.map(|b| E::read_i32(b) as f64).collect(),
        SampleDtype::Float64 => chunks.map(E::read_f64).collect(),
    }
}

fn write_values<E: byteorder::ByteOrder>(values: &[f64], dtype: SampleDtype) -> Vec<u8> {
    let width = dtype.bytes_per_sample();
    let mut out = vec![0u8; values.len() * width];
    for (chunk, &v) in out.chunks_exact_mut(width).zip(values) {
        match dtype {
            // `as` saturates out-of-range values and maps NaN to 0
            SampleDtype::Int16 => E::write_i16(chunk, v.round() as i16),
            SampleDtype::Float32 => E::write_f32(chunk, v as f32),
            SampleDtype::Int32 => E::write_i32(chunk, v.round() as i32),
            SampleDtype::Float64 => E::write_f64(chunk, v),
        }
    }
    out
}

/// Decode an in-memory payload into a buffer.
///
/// `path` is only used for error context.
pub fn decode_bytes(bytes: &[u8], metadata: RecordingMetadata, path: &Path) -> Result<SignalBuffer> {
    let fields = metadata.fields();
    let frame_bytes = fields.frame_bytes() as u64;
    let byte_len = bytes.len() as u64;

    if frame_bytes == 0 || byte_len == 0 || byte_len % frame_bytes != 0 {
        return Err(NextMindError::TruncatedFile {
            path: path.to_path_buf(),
            byte_len,
            frame_bytes,
            hypothesis: format!("{} x {} ch", fields.dtype, fields.channel_count),
        });
    }

    let values = match fields.byte_order {
        ByteOrder::Little => read_values::<LittleEndian>(bytes, fields.dtype),
        ByteOrder::Big => read_values::<BigEndian>(bytes, fields.dtype),
    };

    let data = match fields.layout {
        FrameLayout::Interleaved => values,
        FrameLayout::Sequential => sequential_to_frames(&values, fields.channel_count),
    };

    log::debug!(
        "Decoded {} bytes as {} x {} ch ({} samples per channel)",
        byte_len,
        fields.dtype,
        fields.channel_count,
        data.len() / fields.channel_count
    );

    SignalBuffer::from_frames(data, metadata).ok_or_else(|| NextMindError::TruncatedFile {
        path: path.to_path_buf(),
        byte_len,
        frame_bytes,
        hypothesis: "frame reshape".to_string(),
    })
}

/// Encode a buffer back into `.raw` bytes using its byte order and layout.
///
/// Integer dtypes round half away from zero and saturate; NaN becomes 0.
pub fn encode(buffer: &SignalBuffer, dtype: SampleDtype) -> Vec<u8> {
    let fields: &MetadataFields = buffer.fields();
    let ordered;
    let values: &[f64] = match fields.layout {
        FrameLayout::Interleaved => buffer.samples(),
        FrameLayout::Sequential => {
            ordered = buffer.to_channels().concat();
            &ordered
        }
    };
    match fields.byte_order {
        ByteOrder::Little => write_values::<LittleEndian>(values, dtype),
        ByteOrder::Big => write_values::<BigEndian>(values, dtype),
    }
}

fn sequential_to_frames(values: &[f64], n_channels: usize) -> Vec<f64> {
    let n_samples = values.len() / n_channels;
    let mut frames = vec![0.0; values.len()];
    for (c, block) in values.chunks_exact(n_samples).enumerate() {
        for (i, &v) in block.iter().enumerate() {
            frames[i * n_channels + c] = v;
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit(channels: usize, dtype: SampleDtype) -> RecordingMetadata {
        RecordingMetadata::Explicit(MetadataFields::new(256.0, channels, dtype))
    }

    fn payload(dtype: SampleDtype, channels: usize, n: usize) -> Vec<u8> {
        // Distinct value per (sample, channel): sample * 100 + channel, alternating sign
        let values: Vec<f64> = (0..n * channels)
            .map(|k| {
                let (i, c) = (k / channels, k % channels);
                let v = (i * 100 + c) as f64;
                if i % 2 == 0 { v } else { -v }
            })
            .collect();
        write_values::<LittleEndian>(&values, dtype)
    }

    #[test]
    fn test_decode_recovers_every_shape() {
        for dtype in SampleDtype::ALL {
            for channels in [1usize, 2, 4, 8, 16, 32, 64] {
                for n in [1usize, 3, 17] {
                    let bytes = payload(dtype, channels, n);
                    assert_eq!(bytes.len(), channels * dtype.bytes_per_sample() * n);

                    let buf = decode_bytes(&bytes, explicit(channels, dtype), Path::new("t.raw"))
                        .unwrap();
                    assert_eq!(buf.n_samples(), n, "{} x {}", dtype, channels);
                    assert_eq!(buf.n_channels(), channels);
                    let last = buf.get(n - 1, channels - 1).unwrap();
                    let expected = ((n - 1) * 100 + channels - 1) as f64;
                    assert_eq!(last.abs(), expected);
                }
            }
        }
    }

    #[test]
    fn test_decode_then_encode_is_lossless() {
        for dtype in SampleDtype::ALL {
            let bytes = payload(dtype, 4, 25);
            let buf = decode_bytes(&bytes, explicit(4, dtype), Path::new("t.raw")).unwrap();
            assert_eq!(encode(&buf, dtype), bytes, "{}", dtype);
        }
    }

    #[test]
    fn test_float_bit_patterns_survive_roundtrip() {
        let values = [0.1f32, -0.0, f32::MIN_POSITIVE, f32::MAX, 1e-42, f32::INFINITY];
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let buf = decode_bytes(&bytes, explicit(2, SampleDtype::Float32), Path::new("t.raw")).unwrap();
        assert_eq!(encode(&buf, SampleDtype::Float32), bytes);
    }

    #[test]
    fn test_partial_frame_is_truncated() {
        let mut bytes = payload(SampleDtype::Int16, 4, 10);
        bytes.pop();
        let err = decode_bytes(&bytes, explicit(4, SampleDtype::Int16), Path::new("t.raw")).unwrap_err();
        assert!(matches!(
            err,
            NextMindError::TruncatedFile { byte_len: 79, frame_bytes: 8, .. }
        ));
    }

    #[test]
    fn test_empty_payload_is_truncated() {
        assert!(decode_bytes(&[], explicit(1, SampleDtype::Int16), Path::new("t.raw")).is_err());
    }

    #[test]
    fn test_big_endian_int16() {
        let mut fields = MetadataFields::new(256.0, 1, SampleDtype::Int16);
        fields.byte_order = ByteOrder::Big;
        let bytes = [0x01, 0x00, 0xff, 0xfe];
        let buf = decode_bytes(&bytes, RecordingMetadata::Explicit(fields), Path::new("t.raw")).unwrap();
        assert_eq!(buf.samples(), &[256.0, -2.0]);
        assert_eq!(encode(&buf, SampleDtype::Int16), bytes);
    }

    #[test]
    fn test_sequential_layout() {
        let mut fields = MetadataFields::new(256.0, 2, SampleDtype::Int16);
        fields.layout = FrameLayout::Sequential;
        // channel 0: 1, 2, 3; channel 1: 10, 20, 30
        let bytes = write_values::<LittleEndian>(&[1.0, 2.0, 3.0, 10.0, 20.0, 30.0], SampleDtype::Int16);
        let buf = decode_bytes(&bytes, RecordingMetadata::Explicit(fields), Path::new("t.raw")).unwrap();
        assert_eq!(buf.channel(0), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.channel(1), vec![10.0, 20.0, 30.0]);
        assert_eq!(encode(&buf, SampleDtype::Int16), bytes);
    }

    #[test]
    fn test_integer_encode_saturates_and_zeroes_nan() {
        let buf = SignalBuffer::from_frames(
            vec![1e9, -1e9, f64::NAN, 2.5],
            explicit(1, SampleDtype::Int16),
        )
        .unwrap();
        let bytes = encode(&buf, SampleDtype::Int16);
        let back: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(back, vec![i16::MAX, i16::MIN, 0, 3]);
    }
}
