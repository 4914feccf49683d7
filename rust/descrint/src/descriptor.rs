//! Encoded descriptor layout.
//!
//! Byte layout: `[DescrHeader (16 bytes)][packed b-bit codes]`, every field
//! little-endian. Code `i` occupies bits `[i*b, i*b + b)` of the payload,
//! least significant bit first.

use std::mem::size_of;

/// Smallest norm ever stored in a header.
pub const NORM_EPS: f32 = 1e-12;

/// Size of the per-descriptor header in bytes.
pub const HEADER_SIZE: usize = size_of::<DescrHeader>();

/// Supported code depths.
pub const MIN_DEPTH: usize = 4;
pub const MAX_DEPTH: usize = 8;

// ── DescrHeader ───────────────────────────────────────────────────────────────

/// Quantization profile stored in front of every encoded descriptor.
///
/// A component decodes as `code * scale + shift`. `mean` and `norm` let the
/// pairwise kernel reconstruct a dot product from the integer correlation of
/// two code streams without dequantizing either side.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DescrHeader {
    pub scale: f32,
    pub shift: f32,
    pub mean: f32,
    pub norm: f32,
}

impl DescrHeader {
    /// Reads a header from the first 16 bytes of `bytes`.
    pub fn read(bytes: &[u8]) -> Self {
        let words: [u32; 4] = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
        let [scale, shift, mean, norm] = words.map(|w| f32::from_bits(u32::from_le(w)));
        Self {
            scale,
            shift,
            mean,
            norm,
        }
    }

    /// Writes the header into the first 16 bytes of `bytes`.
    pub fn write(&self, bytes: &mut [u8]) {
        let words = [self.scale, self.shift, self.mean, self.norm].map(|x| x.to_bits().to_le());
        bytes[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&words));
    }
}

/// Returns true when `dim` and `depth` describe a supported descriptor shape.
pub fn valid(dim: usize, depth: usize) -> bool {
    dim >= 8 && dim % 8 == 0 && (MIN_DEPTH..=MAX_DEPTH).contains(&depth)
}

/// Packed payload length for `dim` codes of `depth` bits.
pub fn payload_size(dim: usize, depth: usize) -> usize {
    (dim * depth).div_ceil(8)
}

/// Total byte size of an encoded descriptor.
pub fn encoded_size(dim: usize, depth: usize) -> usize {
    HEADER_SIZE + payload_size(dim, depth)
}

// ── EncodedDescr ──────────────────────────────────────────────────────────────

/// Zero-copy view over an encoded descriptor.
pub struct EncodedDescr<T = Vec<u8>>(T);

impl<T> EncodedDescr<T> {
    /// Wraps existing bytes as an encoded descriptor.
    pub fn new(bytes: T) -> Self {
        Self(bytes)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: AsRef<[u8]>> EncodedDescr<T> {
    pub fn header(&self) -> DescrHeader {
        DescrHeader::read(self.0.as_ref())
    }

    pub fn scale(&self) -> f32 {
        self.header().scale
    }

    pub fn shift(&self) -> f32 {
        self.header().shift
    }

    pub fn mean(&self) -> f32 {
        self.header().mean
    }

    pub fn norm(&self) -> f32 {
        self.header().norm
    }

    /// Packed codes following the header.
    pub fn payload(&self) -> &[u8] {
        &self.0.as_ref()[HEADER_SIZE..]
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for EncodedDescr<T> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_shapes() {
        assert!(valid(8, 4));
        assert!(valid(8, 8));
        assert!(valid(512, 6));
        assert!(!valid(0, 8));
        assert!(!valid(12, 8));
        assert!(!valid(64, 3));
        assert!(!valid(64, 9));
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(HEADER_SIZE, 16);
        assert_eq!(encoded_size(8, 8), 24);
        assert_eq!(encoded_size(8, 4), 20);
        assert_eq!(encoded_size(128, 5), 16 + 80);
        assert_eq!(encoded_size(128, 7), 16 + 112);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = DescrHeader {
            scale: 0.25,
            shift: -1.5,
            mean: 3.0,
            norm: 7.75,
        };
        let mut bytes = vec![0u8; encoded_size(8, 4)];
        header.write(&mut bytes);
        assert_eq!(DescrHeader::read(&bytes), header);
        assert_eq!(&bytes[0..4], &0.25f32.to_le_bytes());

        let view = EncodedDescr::new(bytes.as_slice());
        assert_eq!(view.scale(), 0.25);
        assert_eq!(view.shift(), -1.5);
        assert_eq!(view.mean(), 3.0);
        assert_eq!(view.norm(), 7.75);
        assert_eq!(view.payload().len(), 4);
        assert_eq!(view.header(), header);
    }

    #[test]
    fn test_fields_are_little_endian() {
        let mut bytes = Vec::new();
        for x in [2.0f32, -0.5, 1e-3, 42.0] {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        bytes.extend_from_slice(&[0xAB; 4]);

        let view = EncodedDescr::new(bytes);
        assert_eq!(view.scale(), 2.0);
        assert_eq!(view.shift(), -0.5);
        assert_eq!(view.mean(), 1e-3);
        assert_eq!(view.norm(), 42.0);
        assert_eq!(view.payload(), &[0xAB; 4]);

        let mut written = vec![0u8; HEADER_SIZE];
        view.header().write(&mut written);
        assert_eq!(&written[..], &view.as_ref()[..HEADER_SIZE]);
    }
}
