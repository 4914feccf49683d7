//! Cosine distance between two encoded descriptors.

use crate::codec::Codec;
use crate::descriptor::DescrHeader;

/// Turns an integer code correlation into a cosine distance in `[0, 2]`.
///
/// Every batch path funnels through here, so a given correlation always maps
/// to the same distance. The cross terms are summed before being added to the
/// scaled correlation, which keeps the result bitwise symmetric in `(a, b)`.
#[inline]
pub(crate) fn distance(ab_sum: f32, a: &DescrHeader, b: &DescrHeader) -> f32 {
    let ab = ab_sum * (a.scale * b.scale) + (a.mean * b.shift + b.mean * a.shift);
    // `max` discards NaN.
    (1.0 - ab / (a.norm * b.norm)).max(0.0).min(2.0)
}

pub(crate) fn cosine_distance(codec: &Codec, a: &[u8], b: &[u8]) -> f32 {
    let ab_sum = codec.correlation(a, b) as f32;
    distance(ab_sum, &DescrHeader::read(a), &DescrHeader::read(b))
}
