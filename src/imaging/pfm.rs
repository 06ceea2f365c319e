//! Portable float map encoder (grayscale)

use bytes::{BufMut, Bytes, BytesMut};

use super::persist::ImagingError;

/// Encode `height` rows of `width` floats, top row first
///
/// PFM stores rows bottom to top; a negative scale marks little-endian data.
pub fn encode_pfm(data: &[f32], width: usize, height: usize) -> Result<Bytes, ImagingError> {
    if width == 0 || height == 0 || data.len() != width * height {
        return Err(ImagingError::BadFloatBuffer {
            len: data.len(),
            width,
            height,
        });
    }

    let header = format!("Pf\n{} {}\n-1.000000\n", width, height);
    let mut buf = BytesMut::with_capacity(header.len() + data.len() * 4);
    buf.put_slice(header.as_bytes());

    for row in data.chunks_exact(width).rev() {
        for value in row {
            buf.put_f32_le(*value);
        }
    }

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_row_order() {
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let encoded = encode_pfm(&data, 3, 2).expect("encode failed");

        let header = b"Pf\n3 2\n-1.000000\n";
        assert!(encoded.starts_with(header));

        let body = &encoded[header.len()..];
        let first = f32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        // Bottom row comes first
        assert_eq!(first, 4.0);
        assert_eq!(body.len(), 6 * 4);
    }

    #[test]
    fn test_size_mismatch() {
        let result = encode_pfm(&[0.0; 5], 3, 2);
        assert!(matches!(result, Err(ImagingError::BadFloatBuffer { len: 5, .. })));
    }
}
