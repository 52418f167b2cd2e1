//! Self-describing PBKDF2 password hash records.
//!
//! A record is `base64(version || prf || iterations || salt_len || salt || subkey)`
//! with the three integer fields big-endian `u32`. Verification honors whatever
//! parameters the record declares, so iteration counts can be raised without
//! invalidating stored credentials.

use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

const FORMAT_VERSION: u8 = 0x01;
const HEADER_LEN: usize = 13;

const PRF_HMAC_SHA1: u32 = 0;
const PRF_HMAC_SHA256: u32 = 1;
const PRF_HMAC_SHA512: u32 = 2;

const ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;
const SUBKEY_LEN: usize = 32;

const MIN_SALT_LEN: usize = 16;
const MIN_SUBKEY_LEN: usize = 16;

/// Pseudorandom function declared in a record header. SHA-1 records parse but
/// never verify.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Prf {
    HmacSha1,
    HmacSha256,
    HmacSha512,
}

impl Prf {
    const fn from_id(id: u32) -> Option<Self> {
        match id {
            PRF_HMAC_SHA1 => Some(Self::HmacSha1),
            PRF_HMAC_SHA256 => Some(Self::HmacSha256),
            PRF_HMAC_SHA512 => Some(Self::HmacSha512),
            _ => None,
        }
    }
}

struct ParsedRecord {
    prf: Prf,
    iterations: u32,
    salt: Vec<u8>,
    subkey: Vec<u8>,
}

/// Hash a password into a fresh record with a random 16-byte salt.
pub fn hash(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate password salt")?;

    let mut subkey = [0u8; SUBKEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut subkey);

    encode_record(PRF_HMAC_SHA256, ITERATIONS, &salt, &subkey)
}

/// Verify a password against a stored record.
///
/// Malformed records (bad base64, truncated buffer, unsupported version or
/// PRF, short salt or subkey, zero iterations) count as a failed match, never
/// an error. A tampered record must be indistinguishable from a wrong
/// password.
#[must_use]
pub fn verify(password: &str, record: &str) -> bool {
    let Some(parsed) = parse_record(record) else {
        return false;
    };
    let Some(derived) = derive_subkey(password, &parsed) else {
        return false;
    };

    derived.ct_eq(&parsed.subkey).into()
}

fn encode_record(prf_id: u32, iterations: u32, salt: &[u8], subkey: &[u8]) -> Result<String> {
    let salt_len = u32::try_from(salt.len()).context("salt length exceeds format range")?;

    let mut buffer = Vec::with_capacity(HEADER_LEN + salt.len() + subkey.len());
    buffer.push(FORMAT_VERSION);
    buffer.extend_from_slice(&prf_id.to_be_bytes());
    buffer.extend_from_slice(&iterations.to_be_bytes());
    buffer.extend_from_slice(&salt_len.to_be_bytes());
    buffer.extend_from_slice(salt);
    buffer.extend_from_slice(subkey);

    Ok(Base64::encode_string(&buffer))
}

fn parse_record(record: &str) -> Option<ParsedRecord> {
    let buffer = Base64::decode_vec(record).ok()?;

    if buffer.len() < HEADER_LEN || buffer[0] != FORMAT_VERSION {
        return None;
    }

    let prf = Prf::from_id(read_u32(&buffer, 1)?)?;
    let iterations = read_u32(&buffer, 5)?;
    let salt_len = usize::try_from(read_u32(&buffer, 9)?).ok()?;

    if iterations == 0 || salt_len < MIN_SALT_LEN {
        return None;
    }

    let salt_end = HEADER_LEN.checked_add(salt_len)?;
    if buffer.len() < salt_end {
        return None;
    }

    let salt = buffer[HEADER_LEN..salt_end].to_vec();
    let subkey = buffer[salt_end..].to_vec();

    if subkey.len() < MIN_SUBKEY_LEN {
        return None;
    }

    Some(ParsedRecord {
        prf,
        iterations,
        salt,
        subkey,
    })
}

fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

fn derive_subkey(password: &str, record: &ParsedRecord) -> Option<Vec<u8>> {
    let mut derived = vec![0u8; record.subkey.len()];

    match record.prf {
        Prf::HmacSha1 => return None,
        Prf::HmacSha256 => pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            &record.salt,
            record.iterations,
            &mut derived,
        ),
        Prf::HmacSha512 => pbkdf2_hmac::<Sha512>(
            password.as_bytes(),
            &record.salt,
            record.iterations,
            &mut derived,
        ),
    }

    Some(derived)
}
