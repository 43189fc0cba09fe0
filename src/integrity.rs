//! Integrity tokens
//!
//! A manifest digest is either a transport integrity token
//! (`sha256-<base64>`, the format a fetch `integrity` option accepts) or a
//! plain lowercase hex SHA-256 of the content. Both are verified locally
//! after every network fetch, whether or not the transport enforced them.

use crate::error::{StickyError, StickyResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

/// How manifest digests are expressed and checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestScheme {
    /// `sha256-<base64>` tokens, also handed to the transport
    #[default]
    TransportIntegrity,
    /// Hex SHA-256 checked after the response body is read
    ContentHash,
}

impl fmt::Display for DigestScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportIntegrity => write!(f, "transport-integrity"),
            Self::ContentHash => write!(f, "content-hash"),
        }
    }
}

/// Hash algorithm of a transport integrity value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Token prefix, e.g. `sha256`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

/// Expected digest of one manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    /// Transport integrity metadata; the strongest algorithm present decides
    Transport {
        token: String,
        values: Vec<(Algorithm, Vec<u8>)>,
    },
    /// Lowercase hex SHA-256
    ContentHash(String),
}

impl Integrity {
    /// Parse a manifest token according to the configured scheme
    pub fn parse(token: &str, scheme: DigestScheme) -> StickyResult<Self> {
        let token = token.trim();
        let invalid = |reason: &str| StickyError::InvalidDigest {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        match scheme {
            DigestScheme::ContentHash => {
                let bytes = hex::decode(token).map_err(|e| invalid(&e.to_string()))?;
                if bytes.len() != 32 {
                    return Err(invalid("expected 64 hex characters"));
                }
                Ok(Self::ContentHash(token.to_ascii_lowercase()))
            }
            DigestScheme::TransportIntegrity => {
                let mut values = Vec::new();
                for item in token.split_whitespace() {
                    // Options after '?' carry no integrity meaning
                    let item = item.split('?').next().unwrap_or(item);
                    let Some((algo, encoded)) = item.split_once('-') else {
                        continue;
                    };
                    let Some(algorithm) = Algorithm::parse(algo) else {
                        continue;
                    };
                    let digest = BASE64
                        .decode(encoded)
                        .map_err(|e| invalid(&e.to_string()))?;
                    if digest.len() != algorithm.digest_len() {
                        return Err(invalid("digest length does not match algorithm"));
                    }
                    values.push((algorithm, digest));
                }
                if values.is_empty() {
                    return Err(invalid("no supported integrity value"));
                }
                Ok(Self::Transport {
                    token: token.to_string(),
                    values,
                })
            }
        }
    }

    /// Compute the token for some content under the given scheme
    pub fn compute(bytes: &[u8], scheme: DigestScheme) -> Self {
        match scheme {
            DigestScheme::ContentHash => Self::ContentHash(hex::encode(Sha256::digest(bytes))),
            DigestScheme::TransportIntegrity => {
                let digest = Sha256::digest(bytes).to_vec();
                Self::Transport {
                    token: format!("sha256-{}", BASE64.encode(&digest)),
                    values: vec![(Algorithm::Sha256, digest)],
                }
            }
        }
    }

    /// The token as it appears in the manifest
    pub fn token(&self) -> &str {
        match self {
            Self::Transport { token, .. } => token,
            Self::ContentHash(hex) => hex,
        }
    }

    /// Value to hand to a transport that enforces integrity itself
    pub fn transport_token(&self) -> Option<&str> {
        match self {
            Self::Transport { token, .. } => Some(token),
            Self::ContentHash(_) => None,
        }
    }

    fn strongest(values: &[(Algorithm, Vec<u8>)]) -> Algorithm {
        values
            .iter()
            .map(|(algorithm, _)| *algorithm)
            .max()
            .unwrap_or(Algorithm::Sha256)
    }

    /// Check content against this digest
    ///
    /// On mismatch returns the received token, rendered in the same format
    /// as the expected one.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), String> {
        match self {
            Self::ContentHash(expected) => {
                let received = hex::encode(Sha256::digest(bytes));
                if &received == expected {
                    Ok(())
                } else {
                    Err(received)
                }
            }
            Self::Transport { values, .. } => {
                let algorithm = Self::strongest(values);
                let computed = algorithm.digest(bytes);
                let matched = values
                    .iter()
                    .any(|(a, digest)| *a == algorithm && *digest == computed);
                if matched {
                    Ok(())
                } else {
                    Err(format!("{}-{}", algorithm.prefix(), BASE64.encode(&computed)))
                }
            }
        }
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
