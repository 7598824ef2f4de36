//! Stable path identity derivation.
//!
//! Every indexed file is keyed by a 128-bit identifier derived from its
//! normalized relative path, never from its content. Renaming a file
//! therefore produces a new identity, while overwriting a file in place
//! keeps the old one.
//!
//! Normalization canonicalizes all separators to `/` and applies Unicode
//! NFC so the same visual path hashes identically on every platform
//! (macOS reports NFD-decomposed names, Windows and Linux NFC).
//!
//! # Example
//!
//! ```
//! use dupindex::identity::PathIdentity;
//!
//! let ident = PathIdentity::from_relative("photos/2024/beach.jpg").unwrap();
//! assert_eq!(ident.directory, "photos/2024");
//! assert_eq!(ident.filename, "beach.jpg");
//! assert_eq!(ident.id.len(), 32); // 128 bits, hex-encoded
//!
//! // Backslash separators hash to the same identity
//! let windows = PathIdentity::from_relative("photos\\2024\\beach.jpg").unwrap();
//! assert_eq!(windows.id, ident.id);
//! ```

use std::fmt::Write as _;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Number of digest bytes kept for the identity (128 bits).
pub const ID_BYTES: usize = 16;

/// Errors from identity derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The input path was empty (or empty after normalization).
    #[error("cannot derive an identity from an empty path")]
    Empty,
}

/// Stable identity and normalized components of a relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathIdentity {
    /// 32-hex-char identifier of the normalized path.
    pub id: String,
    /// Normalized directory portion (empty for top-level entries).
    pub directory: String,
    /// Normalized file name.
    pub filename: String,
}

impl PathIdentity {
    /// Derive the identity for a path relative to the index base.
    ///
    /// Pure function: no I/O, no knowledge of the filesystem. The same
    /// input always yields the same identity.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Empty`] when the path has no components
    /// left after normalization.
    pub fn from_relative(path: &str) -> Result<Self, IdentityError> {
        let normalized = normalize_path_str(path);
        let trimmed = normalized.trim_matches('/');
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }

        let (directory, filename) = match trimmed.rfind('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => ("", trimmed),
        };

        let joined = format!("{}/{}", directory, filename);
        let digest = blake3::hash(joined.as_bytes());
        let id = hex_prefix(digest.as_bytes(), ID_BYTES);

        Ok(Self {
            id,
            directory: directory.to_string(),
            filename: filename.to_string(),
        })
    }

    /// The normalized relative path this identity was derived from.
    #[must_use]
    pub fn relative_path(&self) -> String {
        if self.directory.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.directory, self.filename)
        }
    }
}

/// Normalize a path string: forward slashes, Unicode NFC, no duplicate
/// separators.
#[must_use]
pub fn normalize_path_str(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let nfc: String = forward.nfc().collect();

    // Collapse `a//b` to `a/b` so the same file cannot hash twice.
    let mut out = String::with_capacity(nfc.len());
    let mut prev_sep = false;
    for ch in nfc.chars() {
        if ch == '/' {
            if !prev_sep {
                out.push(ch);
            }
            prev_sep = true;
        } else {
            out.push(ch);
            prev_sep = false;
        }
    }
    out
}

/// Hex-encode the first `len` bytes of a digest.
fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len * 2);
    for byte in &bytes[..len.min(bytes.len())] {
        // write! into a String cannot fail
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
