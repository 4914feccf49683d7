//! Bit packing of `b`-bit codes.
//!
//! Every group of 8 codes occupies exactly `b` bytes, so packing works on
//! 8-code groups through a 64-bit little-endian accumulator. The routines are
//! monomorphized over the depth and bound once through [`Packing::for_depth`].

/// Codes per packing group.
pub const GROUP: usize = 8;

#[inline(always)]
fn pack_group<const BITS: usize>(codes: &[u8], dst: &mut [u8]) {
    let mut acc = 0u64;
    for (k, &code) in codes[..GROUP].iter().enumerate() {
        acc |= u64::from(code) << (k * BITS);
    }
    dst[..BITS].copy_from_slice(&acc.to_le_bytes()[..BITS]);
}

#[inline(always)]
fn unpack_group<const BITS: usize>(src: &[u8], dst: &mut [u8]) {
    let mut bytes = [0u8; 8];
    bytes[..BITS].copy_from_slice(&src[..BITS]);
    let acc = u64::from_le_bytes(bytes);
    let mask = (1u64 << BITS) - 1;
    for (k, code) in dst[..GROUP].iter_mut().enumerate() {
        *code = ((acc >> (k * BITS)) & mask) as u8;
    }
}

fn pack_codes<const BITS: usize>(codes: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(codes.len() % GROUP, 0);
    debug_assert!(dst.len() * 8 >= codes.len() * BITS);
    for (group, out) in codes.chunks_exact(GROUP).zip(dst.chunks_exact_mut(BITS)) {
        pack_group::<BITS>(group, out);
    }
}

fn unpack_codes<const BITS: usize>(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(dst.len() % GROUP, 0);
    debug_assert!(src.len() * 8 >= dst.len() * BITS);
    for (packed, group) in src.chunks_exact(BITS).zip(dst.chunks_exact_mut(GROUP)) {
        unpack_group::<BITS>(packed, group);
    }
}

/// Depth-specialized packing routines.
#[derive(Clone, Copy)]
pub struct Packing {
    depth: usize,
    pack: fn(&[u8], &mut [u8]),
    unpack: fn(&[u8], &mut [u8]),
}

impl Packing {
    /// Returns the routines for `depth`, or `None` outside `4..=8`.
    pub fn for_depth(depth: usize) -> Option<Self> {
        match depth {
            4 => Some(Self::of::<4>()),
            5 => Some(Self::of::<5>()),
            6 => Some(Self::of::<6>()),
            7 => Some(Self::of::<7>()),
            8 => Some(Self::of::<8>()),
            _ => None,
        }
    }

    fn of<const BITS: usize>() -> Self {
        Self {
            depth: BITS,
            pack: pack_codes::<BITS>,
            unpack: unpack_codes::<BITS>,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Largest representable code.
    pub fn max_code(&self) -> u8 {
        ((1u16 << self.depth) - 1) as u8
    }

    /// Packed byte length of `count` codes. `count` must be a multiple of 8.
    pub fn packed_len(&self, count: usize) -> usize {
        count / GROUP * self.depth
    }

    /// Packs one-byte codes (a multiple of 8 of them) into `dst`.
    pub fn pack(&self, codes: &[u8], dst: &mut [u8]) {
        (self.pack)(codes, dst)
    }

    /// Unpacks `dst.len()` codes from the start of `src`.
    pub fn unpack(&self, src: &[u8], dst: &mut [u8]) {
        (self.unpack)(src, dst)
    }

    /// Unpacks `dst.len()` codes starting at code index `start` of `payload`.
    /// `start` must be a multiple of 8.
    pub fn unpack_at(&self, payload: &[u8], start: usize, dst: &mut [u8]) {
        debug_assert_eq!(start % GROUP, 0);
        (self.unpack)(&payload[self.packed_len(start)..], dst)
    }
}

impl std::fmt::Debug for Packing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packing").field("depth", &self.depth).finish()
    }
}
