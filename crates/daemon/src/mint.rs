// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write tokens
//!
//! A token is the lowercase hex HMAC-SHA512 of the stream id under a
//! secret drawn once per process. Tokens do not survive a daemon restart.

use hmac::{Hmac, Mac};
use rakaia_core::StreamId;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Length of the per-process secret in bytes
pub const SECRET_LEN: usize = 64;

/// Mint errors
#[derive(Debug, Error)]
pub enum MintError {
    /// Token missing, malformed, or for another stream. Carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid mint key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),
}

/// Issues and checks per-stream write tokens
#[derive(Clone)]
pub struct Mint {
    keyed: HmacSha512,
}

impl Mint {
    /// New mint with a fresh random secret
    pub fn new() -> Result<Self, MintError> {
        let mut secret = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        Self::from_secret(&secret)
    }

    pub fn from_secret(secret: &[u8]) -> Result<Self, MintError> {
        Ok(Self {
            keyed: HmacSha512::new_from_slice(secret)?,
        })
    }

    /// Token authorizing writes to `stream_id`
    pub fn mint(&self, stream_id: &StreamId) -> String {
        hex::encode(self.tag(stream_id))
    }

    /// Check `token` against `stream_id` in constant time
    pub fn validate(&self, stream_id: &StreamId, token: &str) -> Result<(), MintError> {
        let expected = self.mint(stream_id);
        if bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
            Ok(())
        } else {
            Err(MintError::Unauthorized)
        }
    }

    fn tag(&self, stream_id: &StreamId) -> Vec<u8> {
        let mut mac = self.keyed.clone();
        mac.update(stream_id.as_str().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for Mint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mint")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[path = "mint_tests.rs"]
mod tests;
