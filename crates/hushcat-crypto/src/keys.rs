//! Long-term identity keys.
//!
//! A [`StaticKeypair`] is the X25519 key the Noise handshake authenticates.
//! Its [`Fingerprint`] is the SHA-256 digest of the public half.
//!
//! # Key File
//!
//! One line of standard base64 encoding `secret (32) || public (32)`. The file
//! is created with mode 0600 inside a directory created with mode 0700.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hushcat_core::Fingerprint;
use sha2::{Digest, Sha256};
use snow::{
    params::DHChoice,
    resolvers::{CryptoResolver, DefaultResolver},
    types::Dh,
};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::noise::NOISE_PATTERN;

/// X25519 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors generating, loading or saving keys.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Key file does not exist
    #[error("the private key ({}) does not exist; use genkey", .0.display())]
    Missing(PathBuf),

    /// Refusing to overwrite an existing key
    #[error("the private key ({}) already exists", .0.display())]
    Exists(PathBuf),

    /// Key file contents are not a valid key
    #[error("invalid or corrupted private key ({})", .0.display())]
    Corrupt(PathBuf),

    /// Key generation failed
    #[error("key generation failed: {0}")]
    Generate(String),

    /// Filesystem operation failed
    #[error("{}: {source}", .path.display())]
    Io {
        /// File or directory that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl KeyError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Long-term X25519 identity.
pub struct StaticKeypair {
    secret: [u8; KEY_LEN],
    public: [u8; KEY_LEN],
}

impl StaticKeypair {
    /// Generate a fresh keypair from OS randomness.
    pub fn generate() -> Result<Self, KeyError> {
        let params = NOISE_PATTERN
            .parse::<snow::params::NoiseParams>()
            .map_err(|e| KeyError::Generate(e.to_string()))?;
        let mut keypair = snow::Builder::new(params)
            .generate_keypair()
            .map_err(|e| KeyError::Generate(e.to_string()))?;

        let pair = Self::from_slices(&keypair.private, &keypair.public);
        keypair.private.zeroize();
        pair.ok_or_else(|| KeyError::Generate("unexpected key length".to_string()))
    }

    /// Keypair from raw halves. `None` if either half is not [`KEY_LEN`] bytes.
    #[must_use]
    pub fn from_slices(secret: &[u8], public: &[u8]) -> Option<Self> {
        Some(Self { secret: secret.try_into().ok()?, public: public.try_into().ok()? })
    }

    /// Public half.
    #[must_use]
    pub fn public_key(&self) -> &[u8; KEY_LEN] {
        &self.public
    }

    pub(crate) fn secret_key(&self) -> &[u8; KEY_LEN] {
        &self.secret
    }

    /// Fingerprint others see for this identity.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint_of(&self.public)
    }

    /// Key file encoding.
    #[must_use]
    pub fn encode(&self) -> Zeroizing<String> {
        let mut raw = Zeroizing::new([0u8; KEY_LEN * 2]);
        raw[..KEY_LEN].copy_from_slice(&self.secret);
        raw[KEY_LEN..].copy_from_slice(&self.public);
        Zeroizing::new(BASE64.encode(&raw[..]))
    }

    /// Parse the key file encoding. Surrounding whitespace is ignored.
    ///
    /// `None` unless the stored public half is the one the secret derives.
    pub fn decode(text: &str) -> Option<Self> {
        let raw = Zeroizing::new(BASE64.decode(text.trim()).ok()?);
        if raw.len() != KEY_LEN * 2 {
            return None;
        }

        let (secret, public) = raw.split_at(KEY_LEN);
        if derive_public(secret)? != public {
            return None;
        }
        Self::from_slices(secret, public)
    }

    /// Read a key file.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => Zeroizing::new(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeyError::Missing(path.to_path_buf()));
            },
            Err(e) => return Err(KeyError::io(path, e)),
        };

        Self::decode(&text).ok_or_else(|| KeyError::Corrupt(path.to_path_buf()))
    }

    /// Write a new key file, creating its directory if missing.
    ///
    /// Never overwrites: an existing file is reported as [`KeyError::Exists`].
    pub fn save_new(&self, path: &Path) -> Result<(), KeyError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_private_dir(dir)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(KeyError::Exists(path.to_path_buf()));
            },
            Err(e) => return Err(KeyError::io(path, e)),
        };

        let encoded = self.encode();
        file.write_all(encoded.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all())
            .map_err(|e| KeyError::io(path, e))
    }
}

impl Drop for StaticKeypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Create `dir` (mode 0700) if it does not exist.
pub fn create_private_dir(dir: &Path) -> Result<(), KeyError> {
    if dir.exists() {
        return Ok(());
    }

    tracing::info!("creating the hushcat directory: {}", dir.display());
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| KeyError::io(dir, e))
}

/// X25519 public key for `secret`.
fn derive_public(secret: &[u8]) -> Option<[u8; KEY_LEN]> {
    let mut dh = DefaultResolver.resolve_dh(&DHChoice::Curve25519)?;
    dh.set(secret);
    dh.pubkey().try_into().ok()
}

/// Fingerprint of an X25519 public key.
#[must_use]
pub fn fingerprint_of(public: &[u8]) -> Fingerprint {
    Fingerprint::new(Sha256::digest(public).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_identity() {
        let key = StaticKeypair::generate().unwrap();
        let decoded = StaticKeypair::decode(&key.encode()).unwrap();

        assert_eq!(decoded.public_key(), key.public_key());
        assert_eq!(decoded.secret_key(), key.secret_key());
        assert_eq!(decoded.fingerprint(), key.fingerprint());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(StaticKeypair::decode(&BASE64.encode([7u8; 40])).is_none());
        assert!(StaticKeypair::decode("not base64!").is_none());
    }

    #[test]
    fn decode_rejects_mismatched_public_half() {
        let key = StaticKeypair::generate().unwrap();
        let mut raw = BASE64.decode(key.encode().as_bytes()).unwrap();
        raw[KEY_LEN] ^= 0x01;

        assert!(StaticKeypair::decode(&BASE64.encode(&raw)).is_none());
    }

    #[test]
    fn corrupted_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.priv");
        let key = StaticKeypair::generate().unwrap();
        let other = StaticKeypair::generate().unwrap();

        let mut raw = BASE64.decode(key.encode().as_bytes()).unwrap();
        raw[KEY_LEN..].copy_from_slice(other.public_key());
        fs::write(&path, BASE64.encode(&raw)).unwrap();

        assert!(matches!(StaticKeypair::load(&path), Err(KeyError::Corrupt(_))));
    }

    #[test]
    fn fingerprint_is_sha256_of_public_key() {
        let fp = fingerprint_of(&[0u8; KEY_LEN]);
        assert_eq!(fp.as_bytes().len(), 32);
        assert_eq!(
            fp.to_hex(),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn save_new_creates_dir_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hushcat").join("id.priv");
        let key = StaticKeypair::generate().unwrap();

        key.save_new(&path).unwrap();
        let loaded = StaticKeypair::load(&path).unwrap();
        assert_eq!(loaded.public_key(), key.public_key());

        let other = StaticKeypair::generate().unwrap();
        assert!(matches!(other.save_new(&path), Err(KeyError::Exists(_))));
        assert_eq!(StaticKeypair::load(&path).unwrap().public_key(), key.public_key());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.priv");
        StaticKeypair::generate().unwrap().save_new(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_key_suggests_genkey() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticKeypair::load(&dir.path().join("absent")).err().unwrap();
        assert!(matches!(err, KeyError::Missing(_)));
        assert!(err.to_string().contains("genkey"));
    }
}
