//! # Threshold Multi-Signature
//!
//! `M`-of-`N` signature collection over a fixed message, authorizing release of
//! jointly held Bitcoin.
//!
//! Slots are positional: `signatures[i]` belongs to `signers[i]`. The wire form
//! only carries filled slots, each tagged with its index, and decoding puts them
//! back in place. The address is derived from signers, message and threshold
//! alone, so it does not move while signatures trickle in.

use super::value_objects::{Hash, PublicKeyBytes};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Multi-signature errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiSigError {
    /// No signers supplied.
    #[error("Missing signers")]
    MissingSigners,

    /// Threshold outside `[0, N]`.
    #[error("Invalid threshold: m={m}, n={n}")]
    InvalidThreshold {
        /// Requested threshold
        m: usize,
        /// Number of signers
        n: usize,
    },

    /// Address does not match the signer recorded at the index.
    #[error("Unexpected signer at index {index}")]
    UnexpectedSigner {
        /// Claimed signer index
        index: usize,
    },

    /// Index beyond the signer list.
    #[error("Signer index {index} out of range (n={n})")]
    IndexOutOfRange {
        /// Claimed signer index
        index: usize,
        /// Number of signers
        n: usize,
    },

    /// Signature bytes are empty.
    #[error("Empty signature")]
    EmptySignature,

    /// Address is not in the signer list.
    #[error("Address is not a signer")]
    UnknownSigner,

    /// Encoding failed.
    #[error("Multisig encoding failed: {0}")]
    Encoding(String),
}

/// One partial signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcSignature {
    /// Position of the signer.
    pub index: usize,
    /// Compressed public key of the signer.
    #[serde(with = "hex::serde")]
    pub address: PublicKeyBytes,
    /// Signature bytes.
    #[serde(with = "hex::serde")]
    pub sign: Vec<u8>,
}

/// Threshold signature collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MultiSigRecord", into = "MultiSigRecord")]
pub struct BtcMultiSig {
    msg: Vec<u8>,
    m: usize,
    signers: Vec<PublicKeyBytes>,
    signatures: Vec<Option<BtcSignature>>,
}

/// Wire form: filled slots only.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct MultiSigRecord {
    #[serde(with = "hex::serde")]
    msg: Vec<u8>,
    m: usize,
    signers: Vec<HexBytes>,
    signatures: Vec<BtcSignature>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
struct HexBytes(#[serde(with = "hex::serde")] Vec<u8>);

impl BtcMultiSig {
    /// Create an empty collection for `signers` requiring `m` signatures.
    pub fn new(msg: Vec<u8>, m: usize, signers: Vec<PublicKeyBytes>) -> Result<Self, MultiSigError> {
        if signers.is_empty() {
            return Err(MultiSigError::MissingSigners);
        }
        if m > signers.len() {
            return Err(MultiSigError::InvalidThreshold {
                m,
                n: signers.len(),
            });
        }

        let n = signers.len();
        Ok(Self {
            msg,
            m,
            signers,
            signatures: vec![None; n],
        })
    }

    /// Attach a signature at its signer's slot.
    ///
    /// Nothing is modified on error. Re-signing an already filled slot replaces it.
    pub fn add_signature(&mut self, sig: BtcSignature) -> Result<(), MultiSigError> {
        let expected = self
            .signers
            .get(sig.index)
            .ok_or(MultiSigError::IndexOutOfRange {
                index: sig.index,
                n: self.signers.len(),
            })?;
        if *expected != sig.address {
            return Err(MultiSigError::UnexpectedSigner { index: sig.index });
        }
        if sig.sign.is_empty() {
            return Err(MultiSigError::EmptySignature);
        }

        let index = sig.index;
        self.signatures[index] = Some(sig);
        Ok(())
    }

    /// Number of filled slots.
    pub fn signed_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    /// True once at least `m` slots are filled.
    pub fn is_valid(&self) -> bool {
        self.signed_count() >= self.m
    }

    /// Content address over signers, message and threshold.
    pub fn address(&self) -> Result<Hash, MultiSigError> {
        let unsigned = MultiSigRecord {
            msg: self.msg.clone(),
            m: self.m,
            signers: self.signers.iter().cloned().map(HexBytes).collect(),
            signatures: Vec::new(),
        };
        // Field order is fixed by the struct, so the JSON is canonical.
        let bytes =
            serde_json::to_vec(&unsigned).map_err(|e| MultiSigError::Encoding(e.to_string()))?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Canonical encoding including filled signatures.
    pub fn bytes(&self) -> Result<Vec<u8>, MultiSigError> {
        serde_json::to_vec(&MultiSigRecord::from(self.clone()))
            .map_err(|e| MultiSigError::Encoding(e.to_string()))
    }

    /// Decode from [`BtcMultiSig::bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MultiSigError> {
        let record: MultiSigRecord =
            serde_json::from_slice(bytes).map_err(|e| MultiSigError::Encoding(e.to_string()))?;
        Self::try_from(record)
    }

    /// Filled signatures in signer order, ready for a spending witness.
    pub fn signatures_in_order(&self) -> Vec<Vec<u8>> {
        self.signatures
            .iter()
            .flatten()
            .map(|s| s.sign.clone())
            .collect()
    }

    /// Position of `addr` in the signer list.
    pub fn signer_index(&self, addr: &[u8]) -> Result<usize, MultiSigError> {
        self.signers
            .iter()
            .position(|s| s.as_slice() == addr)
            .ok_or(MultiSigError::UnknownSigner)
    }

    /// Whether `addr` is a signer and has filled its slot.
    pub fn has_address_signed(&self, addr: &[u8]) -> bool {
        self.signer_index(addr)
            .map(|i| self.signatures[i].is_some())
            .unwrap_or(false)
    }

    /// Message being signed.
    pub fn msg(&self) -> &[u8] {
        &self.msg
    }

    /// Required signature count.
    pub fn threshold(&self) -> usize {
        self.m
    }

    /// Signer list.
    pub fn signers(&self) -> &[PublicKeyBytes] {
        &self.signers
    }

    /// Positional slots.
    pub fn signatures(&self) -> &[Option<BtcSignature>] {
        &self.signatures
    }
}

impl From<BtcMultiSig> for MultiSigRecord {
    fn from(ms: BtcMultiSig) -> Self {
        Self {
            msg: ms.msg,
            m: ms.m,
            signers: ms.signers.into_iter().map(HexBytes).collect(),
            signatures: ms.signatures.into_iter().flatten().collect(),
        }
    }
}

impl TryFrom<MultiSigRecord> for BtcMultiSig {
    type Error = MultiSigError;

    fn try_from(record: MultiSigRecord) -> Result<Self, Self::Error> {
        let signers = record.signers.into_iter().map(|h| h.0).collect();
        let mut ms = BtcMultiSig::new(record.msg, record.m, signers)?;
        for sig in record.signatures {
            ms.add_signature(sig)?;
        }
        Ok(ms)
    }
}
