//! Deterministic cache keys derived from call arguments.
//!
//! A fingerprint is `{prefix}{function}:{hash}` where `hash` is the first
//! 128 bits of a SHA-256 digest over the canonical JSON form of the
//! positional and named arguments. Named arguments are kept in a sorted map
//! and JSON objects serialize with sorted keys, so the order in which a
//! caller supplies keyword arguments never changes the key.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Number of digest bytes kept in the key.
const HASH_BYTES: usize = 16;

/// A cache key derived from a function identity and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Start building a fingerprint for calls to `function`.
    pub fn builder(function: impl Into<String>) -> FingerprintBuilder {
        FingerprintBuilder::new(function)
    }

    /// Wrap an already-derived key.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the fingerprint, returning the key.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Fingerprint {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulates the arguments of a call before hashing them.
///
/// Serialization failures are deferred until [`build`](Self::build) so that
/// arguments can be chained fluently.
#[derive(Debug)]
pub struct FingerprintBuilder {
    function: String,
    prefix: String,
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    error: Option<serde_json::Error>,
}

impl FingerprintBuilder {
    fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            prefix: String::new(),
            positional: Vec::new(),
            named: BTreeMap::new(),
            error: None,
        }
    }

    /// Prepend `prefix` to the generated key.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Append a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if let Some(value) = self.to_value(value) {
            self.positional.push(value);
        }
        self
    }

    /// Add a named argument. Later values for the same name win.
    pub fn named<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        if let Some(value) = self.to_value(value) {
            self.named.insert(name.into(), value);
        }
        self
    }

    /// Hash the collected arguments into a [`Fingerprint`].
    pub fn build(self) -> Result<Fingerprint> {
        if let Some(source) = self.error {
            return Err(CacheError::Fingerprint {
                function: self.function,
                source,
            });
        }

        let canonical = serde_json::json!([self.positional, self.named]).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        let hash = hex::encode(&digest[..HASH_BYTES]);

        Ok(Fingerprint(format!("{}{}:{}", self.prefix, self.function, hash)))
    }

    fn to_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Option<Value> {
        if self.error.is_some() {
            return None;
        }
        match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }
}
