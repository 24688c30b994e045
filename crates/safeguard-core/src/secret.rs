//! Secret material that is wiped when released.
//!
//! [`SecretMaterial`] holds passwords and raw certificate bytes. The buffer is
//! zeroed on drop, and [`SecretMaterial::wipe`] zeroes it earlier on demand.
//! [`SecretBuilder`] assembles a secret one character at a time (for masked
//! password entry) without ever leaving a stale copy of the buffer behind.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

/// Initial capacity of a [`SecretBuilder`] buffer, in bytes.
const BUILDER_INITIAL_CAPACITY: usize = 64;

/// Opaque secret bytes, zeroed on drop.
///
/// # Security
///
/// - Never exposed in Debug output
/// - Cloning produces an independent copy that is wiped separately
#[derive(Clone, Default)]
pub struct SecretMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretMaterial {
    /// Take ownership of raw secret bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Take ownership of a secret string.
    pub fn from_string(secret: String) -> Self {
        Self::from_bytes(secret.into_bytes())
    }

    /// Returns an empty secret.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the secret bytes.
    ///
    /// # Security
    ///
    /// Use only for immediate operations (building a request, decoding a
    /// certificate). Never store or log the returned slice.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the secret as UTF-8 text, if it is valid UTF-8.
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the secret holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero the buffer now and leave the secret empty.
    ///
    /// Safe to call more than once.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl From<&str> for SecretMaterial {
    fn from(secret: &str) -> Self {
        Self::from_string(secret.to_string())
    }
}

impl From<String> for SecretMaterial {
    fn from(secret: String) -> Self {
        Self::from_string(secret)
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretMaterial").field(&"[REDACTED]").finish()
    }
}

/// Incrementally builds a [`SecretMaterial`] from typed characters.
///
/// The buffer is reallocated by hand: the old allocation is zeroed before it
/// is freed, so growing never leaves partial secrets in released memory.
///
/// # Example
///
/// ```
/// use safeguard_core::SecretBuilder;
///
/// let mut builder = SecretBuilder::new();
/// for ch in "hunter3".chars() {
///     builder.push(ch);
/// }
/// builder.pop();
/// builder.push('2');
///
/// let secret = builder.finish();
/// assert_eq!(secret.expose_str(), Some("hunter2"));
/// ```
pub struct SecretBuilder {
    buf: Zeroizing<String>,
}

impl SecretBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            buf: Zeroizing::new(String::with_capacity(BUILDER_INITIAL_CAPACITY)),
        }
    }

    /// Append a character.
    pub fn push(&mut self, ch: char) {
        if self.buf.len() + ch.len_utf8() > self.buf.capacity() {
            let capacity = (self.buf.capacity() * 2).max(BUILDER_INITIAL_CAPACITY);
            let mut grown = Zeroizing::new(String::with_capacity(capacity));
            grown.push_str(&self.buf);
            // Dropping the previous buffer zeroes it.
            self.buf = grown;
        }
        self.buf.push(ch);
    }

    /// Remove the last character. Returns false if the builder was empty.
    pub fn pop(&mut self) -> bool {
        if self.buf.pop().is_none() {
            return false;
        }
        // The removed bytes stay in spare capacity; move the prefix to a fresh
        // buffer so the old one is zeroed now rather than at finish.
        let mut shrunk = Zeroizing::new(String::with_capacity(self.buf.capacity()));
        shrunk.push_str(&self.buf);
        self.buf = shrunk;
        true
    }

    /// Number of characters entered so far.
    pub fn len(&self) -> usize {
        self.buf.chars().count()
    }

    /// Returns true if nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish entry and return the secret.
    pub fn finish(mut self) -> SecretMaterial {
        let secret = std::mem::take(&mut *self.buf);
        SecretMaterial::from_string(secret)
    }
}

impl Default for SecretBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuilder")
            .field("len", &self.len())
            .field("buf", &"[REDACTED]")
            .finish()
    }
}
