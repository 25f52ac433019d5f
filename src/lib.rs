//! Time-based one-time codes (RFC 6238) on top of the HOTP generator in
//! [`generator`] (RFC 4226), plus parsing of `otpauth://totp/...`
//! provisioning URIs in the Key Uri Format used by authenticator apps.

use std::{
    borrow::Cow,
    num::ParseIntError,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use data_encoding::{Encoding, BASE32};
use hmac::digest::crypto_common;
use lazy_static::lazy_static;

pub mod generator;

pub use generator::{Algorithm, GenerateOptions};

pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u64 = 30;

lazy_static! {
    /// RFC 4648 base32 with `=` padding that ignores non-zero trailing bits
    static ref BASE32_LENIENT: Encoding = {
        let mut lenient = BASE32.specification();
        lenient.check_trailing_bits = false;
        lenient.encoding().expect("valid base32 specification")
    };
}

/// First value of the query parameter `key`, empty values count as absent.
fn query_value<'a>(uri: &'a url::Url, key: &str) -> Option<Cow<'a, str>> {
    uri.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TotpError {
    #[error("no secret key provided")]
    MissingSecret,
    #[error("bad secret key: {0}")]
    BadSecretKey(#[from] data_encoding::DecodeError),
    #[error("too many digits {0}, at most {max} are supported", max = generator::MAX_DIGITS)]
    TooManyDigits(u32),
    #[error("invalid algorithm {0:?}, use one of SHA1/SHA256/SHA512")]
    InvalidAlgorithm(String),
    #[error("unable to compute HMAC: {0}")]
    Hmac(#[from] crypto_common::InvalidLength),
    #[error("unsupported credential kind {0:?}, the only kind supported is: totp")]
    UnsupportedKind(String),
    #[error("secret cannot be empty")]
    EmptySecret,
    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

/// Time-based OTP parameters, see RFC 6238.
///
/// A zero `digits` or `period` and an empty `algorithm` fall back to the
/// defaults (6 digits, 30 seconds, SHA1) when generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Base32 encoded secret key
    pub secret: String,
    pub digits: u32,
    /// "SHA1", "SHA256" or "SHA512", case-insensitive
    pub algorithm: String,
    /// Seconds each code is valid for
    pub period: u64,
    /// Reference time in seconds since `UNIX_EPOCH`, the current time when unset
    pub unix_time: Option<i64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            secret: String::new(),
            digits: DEFAULT_DIGITS,
            algorithm: String::new(),
            period: DEFAULT_PERIOD,
            unix_time: None,
        }
    }
}

impl Options {
    /// Generate the TOTP code for these options.
    pub fn generate(&self) -> Result<String, TotpError> {
        generate(self)
    }
}

impl FromStr for Options {
    type Err = TotpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_uri(s)
    }
}

/// Generate a TOTP code.
pub fn generate(opts: &Options) -> Result<String, TotpError> {
    let digits = if opts.digits == 0 { DEFAULT_DIGITS } else { opts.digits };
    let counter = counter(opts.unix_time, opts.period);
    let secret = parse_key(&opts.secret)?;
    if secret.is_empty() {
        return Err(TotpError::MissingSecret);
    }
    let algorithm = Algorithm::from_str(&opts.algorithm)?;
    log::debug!("Generating {digits} digit {algorithm} code for counter {counter}");

    generator::generate(&GenerateOptions {
        secret: &secret,
        // Pre-epoch counters keep their two's complement bit pattern
        counter: counter as u64,
        digits,
        algorithm,
    })
}

/// Upper-case `s`, drop all whitespace and pad with `=` to a multiple of 8.
pub fn normalize_key(s: &str) -> String {
    let mut clean = s.split_whitespace().collect::<String>().to_uppercase();
    let n = clean.len() % 8;
    if n != 0 {
        clean.push_str(&"========"[..8 - n]);
    }
    clean
}

/// Parse a key encoded as base32, the format used by common two-factor
/// authentication setup tools. Whitespace is ignored, case is normalized,
/// and padding is added if required.
pub fn parse_key(s: &str) -> Result<Vec<u8>, TotpError> {
    let secret = BASE32_LENIENT.decode(normalize_key(s).as_bytes())?;
    Ok(secret)
}

/// Parse an `otpauth://totp/...` URI into [`Options`]. The secret is
/// normalized but only decoded when generating.
pub fn parse_uri(uri: &str) -> Result<Options, TotpError> {
    let uri = url::Url::parse(uri)?;

    let kind = uri.host_str().unwrap_or_default();
    if !kind.eq_ignore_ascii_case("totp") {
        return Err(TotpError::UnsupportedKind(kind.to_owned()));
    }

    let Some(secret) = query_value(&uri, "secret") else {
        return Err(TotpError::EmptySecret);
    };
    let secret = normalize_key(&secret);

    let algorithm = query_value(&uri, "algorithm").unwrap_or_default().into_owned();

    let digits = match query_value(&uri, "digits") {
        Some(d) => str::parse::<u32>(&d)?,
        None => DEFAULT_DIGITS,
    };

    let period = match query_value(&uri, "period") {
        Some(p) => str::parse::<u64>(&p)?,
        None => DEFAULT_PERIOD,
    };

    log::debug!("Parsed totp URI: algorithm={algorithm:?} digits={digits} period={period}");

    Ok(Options {
        secret,
        digits,
        algorithm,
        period,
        unix_time: None,
    })
}

/// The TOTP counter `T = (time - T0) / period` with `T0 = 0`, using the
/// current time when `unix_time` is unset. A zero period means the default.
pub fn counter(unix_time: Option<i64>, period: u64) -> i64 {
    let period = if period == 0 { DEFAULT_PERIOD } else { period };
    let t = unix_time.unwrap_or_else(now);
    // |t / period| <= |t|, the quotient always fits back into an i64
    (i128::from(t) / i128::from(period)) as i64
}

fn now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
