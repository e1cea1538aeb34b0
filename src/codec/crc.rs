// SPDX-License-Identifier: Apache-2.0

//! CRC8 checksum over packet payload bytes.
//!
//! The algorithm matches the CRC-8/BLUETOOTH parameters (polynomial 0xA7,
//! init 0x00, xor-out 0x00, input and output reflected) so that this
//! implementation and the peer's reference implementation produce
//! bit-identical checksums.

use crc::{Algorithm, Crc, CRC_8_BLUETOOTH};

/// The fixed CRC8 parameters used for every packet on the wire.
///
/// `crc::CRC_8_BLUETOOTH` already encodes poly=0xa7, init=0x00, xorout=0x00,
/// refin=true, refout=true - exactly the parameters this protocol specifies.
pub const ALGORITHM: Algorithm<u8> = CRC_8_BLUETOOTH;

const CRC8: Crc<u8> = Crc::<u8>::new(&ALGORITHM);

/// Computes the checksum over `payload`.
#[inline]
pub fn checksum(payload: &[u8]) -> u8 {
    CRC8.checksum(payload)
}
