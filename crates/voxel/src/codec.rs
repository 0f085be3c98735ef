//! Chunk payload layout, in `u32` words:
//!
//! `[palette_len, bits, palette[0..palette_len], packed indices...]`
//!
//! Indices are `bits` wide, stored little-endian bit order starting at the
//! first index word, and may straddle two words. A one-entry palette stores
//! no index words at all.

use crate::{chunk_voxel_index, CHUNK_VOXELS};

pub const PAYLOAD_HEADER_WORDS: usize = 2;

pub fn bits_per_index(palette_len: u32) -> u32
{
    match palette_len
    {
        0 | 1 => 0,
        len => u32::BITS - (len - 1).leading_zeros()
    }
}

pub fn index_words(bits: u32) -> usize
{
    (CHUNK_VOXELS * bits as usize).div_ceil(32)
}

pub fn payload_words(palette_len: u32) -> usize
{
    PAYLOAD_HEADER_WORDS + palette_len as usize + index_words(bits_per_index(palette_len))
}

/// Size in bytes of a chunk payload with this many palette entries.
pub fn encoded_size(palette_len: u32) -> u32
{
    (payload_words(palette_len) * 4) as u32
}

/// Encodes a chunk into `out`, which must be exactly
/// `payload_words(palette.len())` long. `palette` must be sorted and contain
/// every value `voxel_at` returns.
pub fn encode_chunk(palette: &[u32], voxel_at: impl Fn(usize) -> u32, out: &mut [u32])
{
    let palette_len = palette.len() as u32;
    let bits = bits_per_index(palette_len);

    assert_eq!(out.len(), payload_words(palette_len));
    debug_assert!(palette.windows(2).all(|w| w[0] < w[1]));

    out[0] = palette_len;
    out[1] = bits;
    out[PAYLOAD_HEADER_WORDS..PAYLOAD_HEADER_WORDS + palette.len()].copy_from_slice(palette);

    let indices = &mut out[PAYLOAD_HEADER_WORDS + palette.len()..];

    indices.fill(0);

    if bits == 0
    {
        return;
    }

    for voxel in 0..CHUNK_VOXELS
    {
        let value = voxel_at(voxel);
        let palette_index = match palette.binary_search(&value)
        {
            Ok(i) => i as u64,
            Err(_) => panic!("Voxel value {value} missing from palette {palette:?}")
        };

        let bit = voxel * bits as usize;
        let word = bit / 32;
        let shift = bit % 32;
        let shifted = palette_index << shift;

        indices[word] |= shifted as u32;

        if shift + bits as usize > 32
        {
            indices[word + 1] |= (shifted >> 32) as u32;
        }
    }
}

/// Read-only view over an encoded chunk payload.
#[derive(Clone, Copy, Debug)]
pub struct PayloadView<'a>
{
    words: &'a [u32]
}

impl<'a> PayloadView<'a>
{
    /// `words` may extend past the payload.
    pub fn new(words: &'a [u32]) -> PayloadView<'a>
    {
        let view = PayloadView {
            words
        };

        debug_assert!(words.len() >= payload_words(view.get_palette_len()));

        view
    }

    pub fn get_palette_len(&self) -> u32
    {
        self.words[0]
    }

    pub fn get_bits(&self) -> u32
    {
        self.words[1]
    }

    pub fn palette(&self) -> &'a [u32]
    {
        &self.words[PAYLOAD_HEADER_WORDS..PAYLOAD_HEADER_WORDS + self.get_palette_len() as usize]
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> u32
    {
        self.get_linear(chunk_voxel_index(x, y, z))
    }

    pub fn get_linear(&self, voxel: usize) -> u32
    {
        let bits = self.get_bits() as usize;
        let palette = self.palette();

        if bits == 0
        {
            return palette[0];
        }

        let indices = &self.words[PAYLOAD_HEADER_WORDS + palette.len()..];
        let bit = voxel * bits;
        let word = bit / 32;
        let shift = bit % 32;

        let mut packed = indices[word] as u64;

        if shift + bits > 32
        {
            packed |= (indices[word + 1] as u64) << 32;
        }

        let palette_index = (packed >> shift) & ((1u64 << bits) - 1);

        palette[palette_index as usize]
    }

    pub fn decode_all(&self) -> Vec<u32>
    {
        (0..CHUNK_VOXELS).map(|v| self.get_linear(v)).collect()
    }
}
