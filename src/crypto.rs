// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random tokens, PKCE challenges and signed cookie values.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of session ids and PKCE verifiers before encoding.
pub const TOKEN_BYTES: usize = 32;

/// Generate `len` random bytes encoded as URL-safe base64.
pub fn random_token(len: usize) -> anyhow::Result<String> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Short lowercase alphanumeric suffix for object names.
pub fn random_suffix(len: usize) -> anyhow::Result<String> {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
    Ok(bytes
        .iter()
        .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
        .collect())
}

/// S256 PKCE challenge for a code verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Sign a value as `value.signature_hex`.
pub fn sign_value(value: &str, key: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(value.as_bytes());
    Ok(format!("{}.{}", value, hex::encode(mac.finalize().into_bytes())))
}

/// Verify a value produced by [`sign_value`] and return the inner value.
pub fn verify_signed_value(signed: &str, key: &[u8]) -> Option<String> {
    let (value, signature_hex) = signed.rsplit_once('.')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(value.as_bytes());
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&signature).into() {
        Some(value.to_string())
    } else {
        tracing::warn!("Session cookie signature mismatch");
        None
    }
}
