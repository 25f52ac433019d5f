//! HOTP code generation: HMAC over a big-endian counter followed by dynamic
//! truncation (RFC 4226 §5.3).

use std::{fmt, str::FromStr};

use hmac::{digest::KeyInit, Hmac, Mac};

use crate::TotpError;

/// Longest code that still carries information, the truncated value is
/// below 2^31.
pub const MAX_DIGITS: u32 = 10;

/// Hash families supported for the HMAC step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl FromStr for Algorithm {
    type Err = TotpError;

    /// Case-insensitive, an empty name selects SHA1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "" | "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(TotpError::InvalidAlgorithm(s.to_owned())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        };
        f.write_str(name)
    }
}

impl Algorithm {
    /// HMAC of `message` keyed with `key`.
    pub fn digest(self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, TotpError> {
        let digest = match self {
            Self::Sha1 => keyed_digest::<Hmac<sha1::Sha1>>(key, message)?,
            Self::Sha256 => keyed_digest::<Hmac<sha2::Sha256>>(key, message)?,
            Self::Sha512 => keyed_digest::<Hmac<sha2::Sha512>>(key, message)?,
        };
        Ok(digest)
    }
}

fn keyed_digest<M: Mac + KeyInit>(
    key: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, hmac::digest::crypto_common::InvalidLength> {
    let mut mac = <M as Mac>::new_from_slice(key)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Input to [`generate`], the secret is already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions<'a> {
    pub secret: &'a [u8],
    pub counter: u64,
    pub digits: u32,
    pub algorithm: Algorithm,
}

/// Generate a counter based OTP code of exactly `digits` characters.
///
/// `digits` is capped at [`MAX_DIGITS`], it usually comes from an untrusted
/// provisioning URI and sizes the output buffer.
pub fn generate(opts: &GenerateOptions) -> Result<String, TotpError> {
    if opts.secret.is_empty() {
        return Err(TotpError::MissingSecret);
    }
    if opts.digits > MAX_DIGITS {
        return Err(TotpError::TooManyDigits(opts.digits));
    }

    let counter = opts.counter.to_be_bytes();
    let digest = opts.algorithm.digest(opts.secret, &counter)?;

    let code = u64::from(truncate(&digest)) % 10_u64.pow(opts.digits);

    Ok(zero_padded(code, opts.digits as usize))
}

/// Dynamic truncation: the low nibble of the last byte selects a 4-byte
/// window, read big-endian with the sign bit cleared.
fn truncate(digest: &[u8]) -> u32 {
    // Every supported digest is at least 20 bytes, so offset + 3 <= 18.
    let offset = match digest.last() {
        Some(last) => (last & 0x0f) as usize,
        None => return 0,
    };
    log::trace!("Dynamic truncation offset {offset}");

    ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32)
}

/// Render `value` as exactly `width` decimal digits, most significant digits
/// beyond `width` are dropped.
fn zero_padded(mut value: u64, width: usize) -> String {
    let mut buf = vec![b'0'; width];
    for slot in buf.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
    buf.into_iter().map(char::from).collect()
}
