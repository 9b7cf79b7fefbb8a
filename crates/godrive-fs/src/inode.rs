//! Mapping of Drive object ids to kernel inode numbers.

use crc::{Crc, CRC_64_XZ};

/// CRC-64 over the ECMA-182 polynomial, reflected form.
const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Derive the inode number for a Drive object id.
///
/// A pure function of the id: the same object gets the same inode number in
/// every process and across lookups. Collisions between distinct ids are
/// possible and ignored; the kernel only needs stability.
#[must_use]
pub fn ino_for_id(id: &str) -> u64 {
    CRC64.checksum(id.as_bytes())
}
