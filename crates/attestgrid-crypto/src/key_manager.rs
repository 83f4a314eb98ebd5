//! # Node Key Manager
//!
//! Owns the node's single Ed25519 signing key.
//!
//! ## Storage layout
//!
//! ```text
//! <key_dir>/ed25519_private.hex   64 hex chars (32-byte seed), mode 0600
//! <key_dir>/ed25519_public.hex    64 hex chars (32-byte public key)
//! ```
//!
//! ## Lifecycle
//!
//! The key is loaded or generated on first use and cached for the life of
//! the manager. Initialization runs at most once even when many threads
//! sign concurrently. Across processes sharing a directory, the private key
//! is published with an atomic hard link, so exactly one generated key wins
//! and every process loads that one.
//!
//! A public key file that exists but does not match the private key is a
//! fatal misconfiguration (`CryptoError::KeyMismatch`). A missing public key
//! file is rewritten from the private key.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use attestgrid_core::CanonicalBytes;
use once_cell::sync::OnceCell;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::backend::{BackendKind, KeySigner, SigningBackend};
use crate::ed25519::{Ed25519PublicKey, Ed25519Signature, SecretSeed};
use crate::error::CryptoError;

/// File name of the hex-encoded private seed.
pub const PRIVATE_KEY_FILE: &str = "ed25519_private.hex";

/// File name of the hex-encoded public key.
pub const PUBLIC_KEY_FILE: &str = "ed25519_public.hex";

struct LoadedKey {
    signer: Box<dyn KeySigner>,
    public_key: Ed25519PublicKey,
}

/// Loads, generates and uses the node signing key.
pub struct KeyManager {
    key_dir: Option<PathBuf>,
    backend: Arc<dyn SigningBackend>,
    loaded: OnceCell<LoadedKey>,
}

impl KeyManager {
    /// A manager for `key_dir` that touches the filesystem only on first use.
    pub fn new(key_dir: impl Into<PathBuf>, backend: Arc<dyn SigningBackend>) -> Self {
        Self {
            key_dir: Some(key_dir.into()),
            backend,
            loaded: OnceCell::new(),
        }
    }

    /// A manager for `key_dir` that loads an existing key immediately.
    ///
    /// If no key files exist yet, generation is deferred to the first
    /// `sign()` or `public_key()` call. Existing but unreadable, mismatched
    /// or orphaned key material fails here rather than at first use.
    pub fn open(key_dir: impl Into<PathBuf>, backend: Arc<dyn SigningBackend>) -> Result<Self, CryptoError> {
        let manager = Self::new(key_dir, backend);
        if let Some(dir) = manager.key_dir.as_deref() {
            if dir.join(PRIVATE_KEY_FILE).exists() || dir.join(PUBLIC_KEY_FILE).exists() {
                manager.loaded()?;
            }
        }
        Ok(manager)
    }

    /// An in-memory manager with a fixed key. Nothing is written to disk.
    pub fn from_seed(seed: SecretSeed, backend: Arc<dyn SigningBackend>) -> Self {
        let signer = backend.signer(&seed);
        let public_key = signer.public_key();
        Self {
            key_dir: None,
            backend,
            loaded: OnceCell::with_value(LoadedKey { signer, public_key }),
        }
    }

    pub fn key_dir(&self) -> Option<&Path> {
        self.key_dir.as_deref()
    }

    pub fn backend(&self) -> &Arc<dyn SigningBackend> {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether the key has been loaded or generated yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// The node's public key, generating the key pair on first use.
    pub fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        Ok(self.loaded()?.public_key)
    }

    /// Sign raw bytes with the node key.
    pub fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, CryptoError> {
        Ok(self.loaded()?.signer.sign(message))
    }

    /// Sign canonical bytes with the node key.
    pub fn sign_canonical(&self, data: &CanonicalBytes) -> Result<Ed25519Signature, CryptoError> {
        self.sign(data.as_bytes())
    }

    fn loaded(&self) -> Result<&LoadedKey, CryptoError> {
        self.loaded.get_or_try_init(|| self.load_or_generate())
    }

    fn load_or_generate(&self) -> Result<LoadedKey, CryptoError> {
        let dir = self
            .key_dir
            .as_deref()
            .ok_or_else(|| CryptoError::KeyUnavailable("no key directory configured".to_string()))?;

        let seed = match read_seed(dir)? {
            Some(seed) => seed,
            None if public_key_published(dir)? => {
                // Re-read in case another process published both files meanwhile.
                read_seed(dir)?.ok_or_else(|| CryptoError::KeyMismatch {
                    path: dir.join(PUBLIC_KEY_FILE),
                })?
            }
            None => {
                create_key_dir(dir).map_err(|e| unavailable(dir, "create key directory", e))?;
                let fresh = SecretSeed::generate();
                let created = publish_private_key(dir, &fresh)
                    .map_err(|e| unavailable(dir, "write private key", e))?;
                if created {
                    tracing::info!(key_dir = %dir.display(), "generated new node signing key");
                    fresh
                } else {
                    // Another process published first; use its key.
                    read_seed(dir)?.ok_or_else(|| {
                        CryptoError::KeyUnavailable(format!(
                            "private key in {} disappeared after concurrent creation",
                            dir.display()
                        ))
                    })?
                }
            }
        };

        let signer = self.backend.signer(&seed);
        let public_key = signer.public_key();
        reconcile_public_key(dir, &public_key)?;
        tracing::info!(
            key_dir = %dir.display(),
            public_key = %public_key,
            backend = self.backend.kind().as_str(),
            "node signing key loaded"
        );
        Ok(LoadedKey { signer, public_key })
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_dir", &self.key_dir)
            .field("backend", &self.backend.kind())
            .field("public_key", &self.loaded.get().map(|k| k.public_key))
            .finish()
    }
}

fn unavailable(dir: &Path, action: &str, err: io::Error) -> CryptoError {
    CryptoError::KeyUnavailable(format!("{action} in {}: {err}", dir.display()))
}

fn read_seed(dir: &Path) -> Result<Option<SecretSeed>, CryptoError> {
    let path = dir.join(PRIVATE_KEY_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let contents = Zeroizing::new(contents);
            SecretSeed::from_hex(&contents).map(Some)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(unavailable(dir, "read private key", e)),
    }
}

/// A public key without its private key is never paired with a fresh seed.
fn public_key_published(dir: &Path) -> Result<bool, CryptoError> {
    dir.join(PUBLIC_KEY_FILE)
        .try_exists()
        .map_err(|e| unavailable(dir, "inspect public key", e))
}

fn create_key_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Write `contents` to a fresh temp file in `dir`, fsynced.
fn write_temp(dir: &Path, contents: &[u8], mode: u32) -> io::Result<PathBuf> {
    let tmp = dir.join(format!(".tmp-{:016x}", rand::rngs::OsRng.next_u64()));
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = opts.open(&tmp)?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(tmp)
}

/// Publish the private key only if none exists. Returns `false` when
/// another writer got there first.
fn publish_private_key(dir: &Path, seed: &SecretSeed) -> io::Result<bool> {
    let mut contents = Zeroizing::new(String::with_capacity(65));
    contents.push_str(&seed.to_hex());
    contents.push('\n');
    let tmp = write_temp(dir, contents.as_bytes(), 0o600)?;
    let result = match fs::hard_link(&tmp, dir.join(PRIVATE_KEY_FILE)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    };
    let _ = fs::remove_file(&tmp);
    result
}

fn reconcile_public_key(dir: &Path, public_key: &Ed25519PublicKey) -> Result<(), CryptoError> {
    let path = dir.join(PUBLIC_KEY_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => match Ed25519PublicKey::from_hex(&contents) {
            Ok(on_disk) if on_disk == *public_key => Ok(()),
            _ => Err(CryptoError::KeyMismatch { path }),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let contents = format!("{}\n", public_key.to_hex());
            let tmp = write_temp(dir, contents.as_bytes(), 0o644)
                .map_err(|e| unavailable(dir, "write public key", e))?;
            fs::rename(&tmp, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp);
                unavailable(dir, "write public key", e)
            })?;
            tracing::info!(path = %path.display(), "wrote public key file");
            Ok(())
        }
        Err(e) => Err(unavailable(dir, "read public key", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{select_backend, BackendPreference};

    fn backend() -> Arc<dyn SigningBackend> {
        select_backend(BackendPreference::Auto)
    }

    #[test]
    fn generates_on_first_use_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("keys");
        let km = KeyManager::new(&keys, backend());
        assert!(!km.is_loaded());
        assert!(!keys.exists());

        let pk = km.public_key().unwrap();
        assert!(km.is_loaded());

        let priv_hex = fs::read_to_string(keys.join(PRIVATE_KEY_FILE)).unwrap();
        assert_eq!(priv_hex.trim().len(), 64);
        let pub_hex = fs::read_to_string(keys.join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(pub_hex.trim(), pk.to_hex());
    }

    #[test]
    fn reload_yields_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let first = KeyManager::new(dir.path(), backend()).public_key().unwrap();
        let reopened = KeyManager::open(dir.path(), backend()).unwrap();
        assert!(reopened.is_loaded());
        assert_eq!(reopened.public_key().unwrap(), first);
    }

    #[test]
    fn open_on_empty_dir_defers_generation() {
        let dir = tempfile::tempdir().unwrap();
        let km = KeyManager::open(dir.path(), backend()).unwrap();
        assert!(!km.is_loaded());
        assert!(!dir.path().join(PRIVATE_KEY_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        KeyManager::new(dir.path(), backend()).public_key().unwrap();
        let mode = fs::metadata(dir.path().join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn mismatched_public_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        KeyManager::new(dir.path(), backend()).public_key().unwrap();
        fs::write(dir.path().join(PUBLIC_KEY_FILE), "ab".repeat(32)).unwrap();

        let err = KeyManager::open(dir.path(), backend()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch { .. }));
    }

    #[test]
    fn orphaned_public_key_blocks_generation() {
        let dir = tempfile::tempdir().unwrap();
        let stale = "ab".repeat(32);
        fs::write(dir.path().join(PUBLIC_KEY_FILE), &stale).unwrap();

        let err = KeyManager::open(dir.path(), backend()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch { .. }));
        let lazy = KeyManager::new(dir.path(), backend());
        assert!(matches!(lazy.public_key(), Err(CryptoError::KeyMismatch { .. })));
        assert!(!dir.path().join(PRIVATE_KEY_FILE).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join(PUBLIC_KEY_FILE)).unwrap(),
            stale
        );
    }

    #[test]
    fn missing_public_key_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let pk = KeyManager::new(dir.path(), backend()).public_key().unwrap();
        fs::remove_file(dir.path().join(PUBLIC_KEY_FILE)).unwrap();

        let km = KeyManager::open(dir.path(), backend()).unwrap();
        assert_eq!(km.public_key().unwrap(), pk);
        let pub_hex = fs::read_to_string(dir.path().join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(pub_hex.trim(), pk.to_hex());
    }

    #[test]
    fn corrupt_private_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), "not a key").unwrap();
        let err = KeyManager::open(dir.path(), backend()).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPrivateKey(_)));
    }

    #[test]
    fn concurrent_first_use_generates_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let km = Arc::new(KeyManager::new(dir.path(), backend()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let km = Arc::clone(&km);
                std::thread::spawn(move || km.public_key().unwrap())
            })
            .collect();
        let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn independent_managers_on_one_dir_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || KeyManager::new(path, backend()).public_key().unwrap())
            })
            .collect();
        let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[test]
    fn from_seed_signs_without_disk() {
        let km = KeyManager::from_seed(SecretSeed::from_bytes([3u8; 32]), backend());
        assert!(km.is_loaded());
        assert!(km.key_dir().is_none());
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let sig = km.sign_canonical(&cb).unwrap();
        assert!(km
            .backend()
            .verify(cb.as_bytes(), &sig, &km.public_key().unwrap()));
    }

    #[test]
    fn signing_is_deterministic() {
        let km = KeyManager::from_seed(SecretSeed::from_bytes([5u8; 32]), backend());
        assert_eq!(km.sign(b"x").unwrap(), km.sign(b"x").unwrap());
    }

    #[test]
    fn debug_omits_secret() {
        let km = KeyManager::from_seed(SecretSeed::from_bytes([0xee; 32]), backend());
        let debug = format!("{km:?}");
        assert!(debug.contains("KeyManager"));
        assert!(!debug.contains(&"ee".repeat(32)));
    }
}
