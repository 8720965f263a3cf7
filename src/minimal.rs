//! The Zcash minimal byte encoding of proofs
//!
//! A proof is serialized as `2^K` indices of `DIGIT_BITS + 1` bits each,
//! written big-endian and bit-packed back to back. Big-endian keeps
//! lexicographic comparison of the bytes equivalent to numeric comparison
//! of the indices. The helpers below re-chunk between that packed form and
//! 4-byte-per-index arrays.

use crate::err::Error;
use crate::params::Params;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use std::mem::size_of;

/// Unpack `bit_len`-bit big-endian chunks into `byte_pad`-prefixed rows.
pub(crate) fn expand_array(vin: &[u8], bit_len: usize, byte_pad: usize) -> Vec<u8> {
    assert!(bit_len >= 8);
    assert!(u32::BITS as usize >= 7 + bit_len);

    let out_width = (bit_len + 7) / 8 + byte_pad;
    let out_len = 8 * out_width * vin.len() / bit_len;

    // Shortcut for parameters where expansion is a no-op
    if out_len == vin.len() {
        return vin.to_vec();
    }

    let mut vout: Vec<u8> = vec![0; out_len];
    let bit_len_mask: u32 = (1 << bit_len) - 1;

    // The acc_bits least-significant bits of acc_value represent a bit
    // sequence in big-endian order.
    let mut acc_bits = 0;
    let mut acc_value: u32 = 0;

    let mut j = 0;
    for b in vin {
        acc_value = (acc_value << 8) | u32::from(*b);
        acc_bits += 8;

        // When we have bit_len or more bits in the accumulator, write the
        // next output element.
        if acc_bits >= bit_len {
            acc_bits -= bit_len;
            for x in byte_pad..out_width {
                vout[j + x] = ((
                    // Big-endian
                    acc_value >> (acc_bits + (8 * (out_width - x - 1)))
                ) & (
                    // Apply bit_len_mask across byte boundaries
                    (bit_len_mask >> (8 * (out_width - x - 1))) & 0xFF
                )) as u8;
            }
            j += out_width;
        }
    }

    vout
}

/// Pack `byte_pad`-prefixed rows back into `bit_len`-bit big-endian chunks.
pub(crate) fn compress_array(vin: &[u8], out_len: usize, bit_len: usize, byte_pad: usize) -> Vec<u8> {
    assert!(bit_len >= 8);
    assert!(u32::BITS as usize >= 7 + bit_len);

    let in_width = (bit_len + 7) / 8 + byte_pad;
    assert_eq!(out_len, bit_len * vin.len() / (8 * in_width));

    let mut vout = Vec::with_capacity(out_len);
    let bit_len_mask: u32 = (1 << bit_len) - 1;

    let mut acc_bits = 0;
    let mut acc_value: u32 = 0;

    let mut j = 0;
    for _ in 0..out_len {
        // When fewer than 8 bits are left in the accumulator, read the
        // next input row.
        if acc_bits < 8 {
            acc_value <<= bit_len;
            for x in byte_pad..in_width {
                acc_value |= u32::from(
                    // Apply bit_len_mask across byte boundaries
                    vin[j + x] & ((bit_len_mask >> (8 * (in_width - x - 1))) & 0xFF) as u8,
                ) << (8 * (in_width - x - 1));
            }
            j += in_width;
            acc_bits += bit_len;
        }

        acc_bits -= 8;
        vout.push((acc_value >> acc_bits) as u8);
    }

    vout
}

/// Packed byte length of a proof.
pub(crate) fn minimal_len<P: Params>() -> usize {
    P::PROOFSIZE * (P::DIGIT_BITS as usize + 1) / 8
}

/// Decode a minimal encoding into plain indices.
pub(crate) fn indices_from_minimal<P: Params>(minimal: &[u8]) -> Result<Vec<u32>, Error> {
    if minimal.len() != minimal_len::<P>() {
        return Err(Error::Malformed);
    }
    let bit_len = P::DIGIT_BITS as usize + 1;
    let byte_pad = size_of::<u32>() - (bit_len + 7) / 8;

    let mut csr = Cursor::new(expand_array(minimal, bit_len, byte_pad));
    let mut indices = Vec::with_capacity(P::PROOFSIZE);
    while let Ok(i) = csr.read_u32::<BigEndian>() {
        indices.push(i);
    }
    Ok(indices)
}

/// Encode plain indices into the minimal form.
pub(crate) fn minimal_from_indices<P: Params>(indices: &[u32]) -> Vec<u8> {
    let bit_len = P::DIGIT_BITS as usize + 1;
    let byte_pad = size_of::<u32>() - (bit_len + 7) / 8;

    // Big-endian so that lexicographic array comparison is equivalent to
    // integer comparison
    let array: Vec<u8> = indices.iter().flat_map(|i| i.to_be_bytes()).collect();
    compress_array(&array, minimal_len::<P>(), bit_len, byte_pad)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{N200K9, N96K5, Params};

    #[test]
    fn array_expansion() {
        let check_array = |(bit_len, byte_pad), compact: &[u8], expanded: &[u8]| {
            assert_eq!(expand_array(compact, bit_len, byte_pad), expanded);
            assert_eq!(
                compress_array(expanded, compact.len(), bit_len, byte_pad),
                compact,
            );
        };

        // 8 11-bit chunks, all-ones
        check_array(
            (11, 0),
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            ],
            &[
                0x07, 0xff, 0x07, 0xff, 0x07, 0xff, 0x07, 0xff, 0x07, 0xff, 0x07, 0xff, 0x07, 0xff,
                0x07, 0xff,
            ],
        );
        // 8 21-bit chunks, alternating 1s and 0s
        check_array(
            (21, 0),
            &[
                0xaa, 0xaa, 0xad, 0x55, 0x55, 0x6a, 0xaa, 0xab, 0x55, 0x55, 0x5a, 0xaa, 0xaa, 0xd5,
                0x55, 0x56, 0xaa, 0xaa, 0xb5, 0x55, 0x55,
            ],
            &[
                0x15, 0x55, 0x55, 0x15, 0x55, 0x55, 0x15, 0x55, 0x55, 0x15, 0x55, 0x55, 0x15, 0x55,
                0x55, 0x15, 0x55, 0x55, 0x15, 0x55, 0x55, 0x15, 0x55, 0x55,
            ],
        );
        // 8 11-bit chunks, all-ones, 2-byte padding
        check_array(
            (11, 2),
            &[
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            ],
            &[
                0x00, 0x00, 0x07, 0xff, 0x00, 0x00, 0x07, 0xff, 0x00, 0x00, 0x07, 0xff, 0x00, 0x00,
                0x07, 0xff, 0x00, 0x00, 0x07, 0xff, 0x00, 0x00, 0x07, 0xff, 0x00, 0x00, 0x07, 0xff,
                0x00, 0x00, 0x07, 0xff,
            ],
        );
    }

    #[test]
    fn indices_round_trip() {
        let indices: Vec<u32> = (0..N96K5::PROOFSIZE as u32)
            .map(|i| i * 3001 % N96K5::NHASHES)
            .collect();
        let packed = minimal_from_indices::<N96K5>(&indices);
        assert_eq!(packed.len(), 68);
        assert_eq!(
            indices_from_minimal::<N96K5>(&packed).expect("length is exact"),
            indices,
        );

        let indices: Vec<u32> = (0..N200K9::PROOFSIZE as u32)
            .map(|i| i * 4099 % N200K9::NHASHES)
            .collect();
        let packed = minimal_from_indices::<N200K9>(&indices);
        assert_eq!(packed.len(), 1344);
        assert_eq!(
            indices_from_minimal::<N200K9>(&packed).expect("length is exact"),
            indices,
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(indices_from_minimal::<N96K5>(&[0; 67]).is_err());
        assert!(indices_from_minimal::<N96K5>(&[0; 69]).is_err());
    }
}
