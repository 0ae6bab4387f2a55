//! Hash digests used to identify proposals, blocks and signed consensus payloads.

use std::{
    array::TryFromSliceError,
    convert::TryFrom,
    fmt::{self, Debug, Display, Formatter, LowerHex},
};

use blake2::{
    digest::{Update, VariableOutput},
    VarBlake2b,
};
use datasize::DataSize;
use hex_buffer_serde::{Hex, HexForm};
use serde::{Deserialize, Serialize};

/// The hash digest; a wrapped `u8` array.
#[derive(
    Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Serialize, Deserialize, DataSize,
)]
#[serde(deny_unknown_fields)]
pub struct Digest(#[serde(with = "HexForm::<[u8; Digest::LENGTH]>")] [u8; Digest::LENGTH]);

impl Digest {
    /// The number of bytes in a digest hash.
    pub const LENGTH: usize = 32;

    /// The all-zero digest. Used as a sentinel meaning "no value".
    pub const ZERO: Digest = Digest([0u8; Digest::LENGTH]);

    /// Creates a 32-byte blake2b hash digest of the given data.
    pub fn hash<T: AsRef<[u8]>>(data: T) -> Digest {
        let mut result = [0; Digest::LENGTH];

        // Safe to unwrap: `VarBlake2b` supports every output size from 1 to 64 bytes.
        let mut hasher = VarBlake2b::new(Digest::LENGTH).unwrap();
        hasher.update(data);
        hasher.finalize_variable(|slice| {
            result.copy_from_slice(slice);
        });
        Digest(result)
    }

    /// Returns a reference to the underlying bytes.
    pub fn inner(&self) -> &[u8; Digest::LENGTH] {
        &self.0
    }

    /// Returns the underlying bytes.
    pub fn value(self) -> [u8; Digest::LENGTH] {
        self.0
    }

    /// Returns `true` if this is the all-zero sentinel digest.
    pub fn is_zero(&self) -> bool {
        *self == Digest::ZERO
    }

    /// Parses a hex-encoded digest.
    pub fn from_hex<T: AsRef<[u8]>>(hex_input: T) -> Result<Self, hex::FromHexError> {
        let mut inner = [0; Digest::LENGTH];
        hex::decode_to_slice(hex_input, &mut inner)?;
        Ok(Digest(inner))
    }
}

impl LowerHex for Digest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let hex_string = base16::encode_lower(self.inner());
        if f.alternate() {
            write!(f, "0x{}", hex_string)
        } else {
            write!(f, "{}", hex_string)
        }
    }
}

/// Prints the first five bytes only, which is plenty to tell digests apart in logs.
impl Display for Digest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", base16::encode_lower(&self.0[..5]))
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Digest({:x})", self)
    }
}

impl From<[u8; Digest::LENGTH]> for Digest {
    fn from(arr: [u8; Digest::LENGTH]) -> Self {
        Digest(arr)
    }
}

impl<'a> TryFrom<&'a [u8]> for Digest {
    type Error = TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Digest, Self::Error> {
        <[u8; Digest::LENGTH]>::try_from(slice).map(Digest)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Digest> for [u8; Digest::LENGTH] {
    fn from(hash: Digest) -> Self {
        hash.0
    }
}
