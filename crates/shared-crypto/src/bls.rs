//! # BLS12-381 Committee Signatures
//!
//! Guardian and elite-edge-node committees co-sign checkpoints with BLS
//! (`min_pk`: 48-byte public keys, 96-byte signatures). A committee aggregate
//! folds partial signatures together and records, per member, how many times
//! that member's partial signature was folded in. Verification therefore needs
//! the *weighted* aggregate public key `Σ m_i · pk_i`.
//!
//! ## Weighted aggregation
//!
//! `weighted_aggregate_public_key` scales each key by double-and-add on G1, so
//! the cost is logarithmic in the multiplicity. Zero multiplicities are skipped
//! and members are scaled in parallel with rayon.
//! `naive_weighted_aggregate_public_key` is the O(Σ m_i) repeated-addition form,
//! kept as the reference the fast path is checked against.

use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use rayon::prelude::*;
use zeroize::Zeroize;

use crate::CryptoError;

/// Domain separation tag for BLS signatures (proof-of-possession scheme).
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key.
pub type BlsPublicKeyBytes = [u8; 48];

/// Compressed signature.
pub type BlsSignatureBytes = [u8; 96];

/// BLS key pair for signing operations
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKeyBytes,
}

impl BlsKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Result<Self, CryptoError> {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        let secret = SecretKey::key_gen(&ikm, &[])
            .map_err(|e| CryptoError::KeyGenerationFailed(format!("{e:?}")));
        ikm.zeroize();
        Ok(Self::from_secret(secret?))
    }

    /// Create from existing secret key bytes
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.sk_to_pk().to_bytes();
        Self { secret, public }
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> BlsSignatureBytes {
        self.secret.sign(message, DST, &[]).to_bytes()
    }

    /// Get the public key
    pub fn public_key(&self) -> BlsPublicKeyBytes {
        self.public
    }

    /// Get the secret key bytes (be careful with this!)
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

/// Verify a single signature.
pub fn verify(
    public_key: &BlsPublicKeyBytes,
    message: &[u8],
    signature: &BlsSignatureBytes,
) -> bool {
    let (Ok(pk), Ok(sig)) = (parse_public_key(public_key), parse_signature(signature)) else {
        return false;
    };
    sig.verify(true, message, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
}

/// Add two (aggregate) signatures.
pub fn aggregate_signatures(
    a: &BlsSignatureBytes,
    b: &BlsSignatureBytes,
) -> Result<BlsSignatureBytes, CryptoError> {
    let a = parse_signature(a)?;
    let b = parse_signature(b)?;
    let mut agg = AggregateSignature::from_signature(&a);
    agg.add_signature(&b, true)
        .map_err(|_| CryptoError::AggregationFailed)?;
    Ok(agg.to_signature().to_bytes())
}

/// `Σ multiplies[i] · public_keys[i]` by double-and-add.
pub fn weighted_aggregate_public_key(
    public_keys: &[BlsPublicKeyBytes],
    multiplies: &[u32],
) -> Result<BlsPublicKeyBytes, CryptoError> {
    check_lengths(public_keys, multiplies)?;

    let scaled = public_keys
        .par_iter()
        .zip(multiplies.par_iter())
        .filter(|(_, m)| **m > 0)
        .map(|(pk, m)| Ok(scale(&parse_public_key(pk)?, *m)))
        .collect::<Result<Vec<AggregatePublicKey>, CryptoError>>()?;

    let mut points = scaled.into_iter();
    let mut acc = points.next().ok_or(CryptoError::EmptyAggregate)?;
    for point in points {
        acc.add_aggregate(&point);
    }
    Ok(acc.to_public_key().to_bytes())
}

/// `Σ multiplies[i] · public_keys[i]` by repeated addition.
pub fn naive_weighted_aggregate_public_key(
    public_keys: &[BlsPublicKeyBytes],
    multiplies: &[u32],
) -> Result<BlsPublicKeyBytes, CryptoError> {
    check_lengths(public_keys, multiplies)?;

    let mut acc: Option<AggregatePublicKey> = None;
    for (pk, m) in public_keys.iter().zip(multiplies) {
        if *m == 0 {
            continue;
        }
        let pk = parse_public_key(pk)?;
        for _ in 0..*m {
            match acc.as_mut() {
                Some(agg) => agg
                    .add_public_key(&pk, false)
                    .map_err(|_| CryptoError::AggregationFailed)?,
                None => acc = Some(AggregatePublicKey::from_public_key(&pk)),
            }
        }
    }
    acc.map(|agg| agg.to_public_key().to_bytes())
        .ok_or(CryptoError::EmptyAggregate)
}

/// Verify an aggregate signature against the weighted aggregate key.
pub fn verify_weighted(
    public_keys: &[BlsPublicKeyBytes],
    multiplies: &[u32],
    message: &[u8],
    signature: &BlsSignatureBytes,
) -> Result<(), CryptoError> {
    let aggregate_key = weighted_aggregate_public_key(public_keys, multiplies)?;
    if verify(&aggregate_key, message, signature) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}

/// `k · pk` for `k > 0`.
fn scale(public_key: &PublicKey, k: u32) -> AggregatePublicKey {
    let mut base = AggregatePublicKey::from_public_key(public_key);
    let mut acc: Option<AggregatePublicKey> = None;
    let mut k = k;
    while k > 0 {
        if k & 1 == 1 {
            match acc.as_mut() {
                Some(sum) => sum.add_aggregate(&base),
                None => acc = Some(base.clone()),
            }
        }
        k >>= 1;
        if k > 0 {
            let doubled = base.clone();
            base.add_aggregate(&doubled);
        }
    }
    // k > 0 guarantees at least one set bit.
    acc.unwrap_or(base)
}

fn check_lengths(public_keys: &[BlsPublicKeyBytes], multiplies: &[u32]) -> Result<(), CryptoError> {
    if public_keys.len() != multiplies.len() {
        return Err(CryptoError::LengthMismatch {
            keys: public_keys.len(),
            weights: multiplies.len(),
        });
    }
    Ok(())
}

fn parse_public_key(bytes: &BlsPublicKeyBytes) -> Result<PublicKey, CryptoError> {
    PublicKey::key_validate(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

fn parse_signature(bytes: &BlsSignatureBytes) -> Result<Signature, CryptoError> {
    Signature::from_bytes(bytes).map_err(|_| CryptoError::InvalidSignature)
}
