//! Ed25519 keys and signatures.

use std::{
    convert::TryFrom,
    fmt::{self, Debug, Display, Formatter},
    fs,
    path::Path,
};

use datasize::DataSize;
use ed25519_dalek::{self as ed25519, ExpandedSecretKey};
use hex_buffer_serde::{Hex, HexForm};
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use super::Error;

/// A secret ed25519 key.
pub struct SecretKey(ed25519::SecretKey);

impl SecretKey {
    /// The length in bytes of a secret key.
    pub const LENGTH: usize = ed25519::SECRET_KEY_LENGTH;

    /// Constructs a secret key from its raw bytes.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, Error> {
        Ok(SecretKey(ed25519::SecretKey::from_bytes(bytes.as_ref())?))
    }

    /// Generates a new secret key using the operating system's secure random number generator.
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; Self::LENGTH];
        getrandom::getrandom(&mut bytes[..]).map_err(Error::Entropy)?;
        Self::from_bytes(bytes)
    }

    /// Reads a hex-encoded secret key from the given file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|error| Error::KeyFile {
            path: path.to_path_buf(),
            error,
        })?;
        let bytes = hex::decode(contents.trim())?;
        Self::from_bytes(bytes)
    }

    /// Writes the secret key to the given file, hex-encoded.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        fs::write(path, hex::encode(self.0.as_bytes())).map_err(|error| Error::KeyFile {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Returns the public key belonging to this secret key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(ed25519::PublicKey::from(&self.0).to_bytes())
    }

    /// Signs the given message.
    pub fn sign<T: AsRef<[u8]>>(&self, message: T) -> Signature {
        let public_key = ed25519::PublicKey::from(&self.0);
        let expanded = ExpandedSecretKey::from(&self.0);
        Signature(expanded.sign(message.as_ref(), &public_key).to_bytes())
    }
}

impl Debug for SecretKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "SecretKey(...)")
    }
}

/// A public ed25519 key, identifying a peer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize)]
pub struct PublicKey(#[serde(with = "HexForm::<[u8; PublicKey::LENGTH]>")] [u8; PublicKey::LENGTH]);

impl PublicKey {
    /// The length in bytes of a public key.
    pub const LENGTH: usize = ed25519::PUBLIC_KEY_LENGTH;

    /// Constructs a public key from its raw bytes, checking that they encode a curve point.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, Error> {
        let key = ed25519::PublicKey::from_bytes(bytes.as_ref())?;
        Ok(PublicKey(key.to_bytes()))
    }

    /// Returns the raw bytes of the key.
    pub fn as_bytes(&self) -> &[u8; PublicKey::LENGTH] {
        &self.0
    }

    /// Verifies that `signature` is a valid signature of `message` by this key.
    pub fn verify<T: AsRef<[u8]>>(&self, message: T, signature: &Signature) -> Result<(), Error> {
        let public_key = ed25519::PublicKey::from_bytes(&self.0)?;
        let signature = ed25519::Signature::try_from(&signature.0[..])?;
        public_key.verify_strict(message.as_ref(), &signature)?;
        Ok(())
    }
}

impl Display for PublicKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:10}", HexFmt(&self.0))
    }
}

impl Debug for PublicKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "PublicKey({})", HexFmt(&self.0))
    }
}

/// An ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "HexForm::<[u8; Signature::LENGTH]>")] [u8; Signature::LENGTH]);

impl Signature {
    /// The length in bytes of a signature.
    pub const LENGTH: usize = ed25519::SIGNATURE_LENGTH;

    /// Constructs a signature from its raw bytes. The bytes are only checked on verification.
    pub fn from_bytes(bytes: [u8; Signature::LENGTH]) -> Self {
        Signature(bytes)
    }

    /// Returns the raw bytes of the signature.
    pub fn as_bytes(&self) -> &[u8; Signature::LENGTH] {
        &self.0
    }
}

impl DataSize for Signature {
    const IS_DYNAMIC: bool = false;

    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        0
    }
}

impl Display for Signature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:10}", HexFmt(&self.0))
    }
}

impl Debug for Signature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Signature({:20})", HexFmt(&self.0))
    }
}
