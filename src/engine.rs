//! Pluggable signing and verification engines.
//!
//! The codec never constructs or owns a cryptographic engine: signing and
//! verification capabilities are injected at the call boundary as trait
//! objects, and a single attempt either succeeds or fails for the caller to
//! handle. [`LocalSigner`] and [`LocalVerifier`] are in-process
//! implementations backed by the `rsa`, `p256` and `p384` crates.

use crate::hash::HashAlgorithm;
use crate::oids;
use der::asn1::Any;
use der::{Decode, Encode};
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use spki::{AlgorithmIdentifierOwned, DecodePublicKey, EncodePublicKey, SubjectPublicKeyInfoOwned};
use thiserror::Error;
use x509_cert::name::Name;

/// Errors raised by a signing or verification engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// the engine does not implement the requested primitive
    #[error("unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// the public key cannot initialize the requested primitive
    #[error("invalid key: {context}")]
    InvalidKey { context: String },

    /// engine-specific failure
    #[error("{context}")]
    Engine { context: String },
}

impl EngineError {
    fn engine(e: impl ToString) -> Self {
        EngineError::Engine {
            context: e.to_string(),
        }
    }

    fn invalid_key(e: impl ToString) -> Self {
        EngineError::InvalidKey {
            context: e.to_string(),
        }
    }
}

/// A signing capability: owns or asserts the identity being certified,
/// announces the signature algorithm it produces, and signs raw bytes.
pub trait RequestSigner {
    /// Distinguished name of the entity requesting certification.
    fn subject(&self) -> Name;

    /// Identifier of the signature algorithm `sign` produces.
    fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned;

    /// Produce raw signature bytes over `msg`.
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, EngineError>;
}

/// A verification capability: checks a signature over `msg` using the given
/// public key and primitive name.
///
/// Returns `Ok(false)` when the signature simply does not match; `Err` is
/// reserved for engine failures (unknown primitive, unusable key, internal
/// error).
pub trait SignatureVerifier {
    fn verify(
        &self,
        public_key_info: &SubjectPublicKeyInfoOwned,
        primitive: &str,
        msg: &[u8],
        signature: &[u8],
    ) -> Result<bool, EngineError>;
}

fn pkcs1v15_scheme(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    }
}

enum SigningKey {
    // RSA private keys are large; keep the variant slim.
    Rsa(Box<RsaPrivateKey>),
    EcdsaP256(p256::ecdsa::SigningKey),
    EcdsaP384(p384::ecdsa::SigningKey),
}

/// In-process signer over an RSA or ECDSA private key.
pub struct LocalSigner {
    subject: Name,
    key: SigningKey,
    hash: HashAlgorithm,
}

impl LocalSigner {
    /// RSA PKCS#1 v1.5 signer with the given digest.
    pub fn new_rsa(subject: Name, key: RsaPrivateKey, hash: HashAlgorithm) -> Self {
        Self {
            subject,
            key: SigningKey::Rsa(Box::new(key)),
            hash,
        }
    }

    /// ECDSA signer over P-256, producing `ecdsa-with-SHA256` signatures.
    pub fn new_ecdsa_p256(subject: Name, key: p256::ecdsa::SigningKey) -> Self {
        Self {
            subject,
            key: SigningKey::EcdsaP256(key),
            hash: HashAlgorithm::Sha256,
        }
    }

    /// ECDSA signer over P-384, producing `ecdsa-with-SHA384` signatures.
    pub fn new_ecdsa_p384(subject: Name, key: p384::ecdsa::SigningKey) -> Self {
        Self {
            subject,
            key: SigningKey::EcdsaP384(key),
            hash: HashAlgorithm::Sha384,
        }
    }

    /// SubjectPublicKeyInfo for the public half of the signing key.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned, EngineError> {
        let document = match &self.key {
            SigningKey::Rsa(key) => RsaPublicKey::from(key.as_ref())
                .to_public_key_der()
                .map_err(EngineError::engine)?,
            SigningKey::EcdsaP256(key) => key
                .verifying_key()
                .to_public_key_der()
                .map_err(EngineError::engine)?,
            SigningKey::EcdsaP384(key) => key
                .verifying_key()
                .to_public_key_der()
                .map_err(EngineError::engine)?,
        };
        SubjectPublicKeyInfoOwned::from_der(document.as_bytes()).map_err(EngineError::engine)
    }
}

impl RequestSigner for LocalSigner {
    fn subject(&self) -> Name {
        self.subject.clone()
    }

    fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        match &self.key {
            SigningKey::Rsa(_) => {
                let oid = match self.hash {
                    HashAlgorithm::Md5 => oids::MD5_WITH_RSA_ENCRYPTION,
                    HashAlgorithm::Sha1 => oids::SHA1_WITH_RSA_ENCRYPTION,
                    HashAlgorithm::Sha256 => oids::SHA256_WITH_RSA_ENCRYPTION,
                    HashAlgorithm::Sha384 => oids::SHA384_WITH_RSA_ENCRYPTION,
                    HashAlgorithm::Sha512 => oids::SHA512_WITH_RSA_ENCRYPTION,
                };
                AlgorithmIdentifierOwned {
                    oid,
                    parameters: Some(Any::null()),
                }
            }
            SigningKey::EcdsaP256(_) => AlgorithmIdentifierOwned {
                oid: oids::ECDSA_WITH_SHA256,
                parameters: None,
            },
            SigningKey::EcdsaP384(_) => AlgorithmIdentifierOwned {
                oid: oids::ECDSA_WITH_SHA384,
                parameters: None,
            },
        }
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, EngineError> {
        match &self.key {
            SigningKey::Rsa(key) => key
                .sign(pkcs1v15_scheme(self.hash), &self.hash.digest(msg))
                .map_err(EngineError::engine),
            SigningKey::EcdsaP256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(msg);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            SigningKey::EcdsaP384(key) => {
                let signature: p384::ecdsa::Signature = key.sign(msg);
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// In-process verifier dispatching on engine primitive names.
///
/// Understood primitives: `MD5/RSA`, `SHA1/RSA`, `SHA256withRSA`,
/// `SHA384withRSA`, `SHA512withRSA` (RSA PKCS#1 v1.5), `SHA256/EC` (ECDSA
/// P-256) and `SHA384/EC` (ECDSA P-384). Anything else, including `MD2/RSA`
/// and `SHA1/DSA`, is reported as unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalVerifier;

impl SignatureVerifier for LocalVerifier {
    fn verify(
        &self,
        public_key_info: &SubjectPublicKeyInfoOwned,
        primitive: &str,
        msg: &[u8],
        signature: &[u8],
    ) -> Result<bool, EngineError> {
        match primitive {
            "MD5/RSA" => verify_rsa(public_key_info, HashAlgorithm::Md5, msg, signature),
            "SHA1/RSA" => verify_rsa(public_key_info, HashAlgorithm::Sha1, msg, signature),
            "SHA256withRSA" => verify_rsa(public_key_info, HashAlgorithm::Sha256, msg, signature),
            "SHA384withRSA" => verify_rsa(public_key_info, HashAlgorithm::Sha384, msg, signature),
            "SHA512withRSA" => verify_rsa(public_key_info, HashAlgorithm::Sha512, msg, signature),
            "SHA256/EC" => verify_p256(public_key_info, msg, signature),
            "SHA384/EC" => verify_p384(public_key_info, msg, signature),
            other => Err(EngineError::UnsupportedAlgorithm {
                algorithm: other.to_owned(),
            }),
        }
    }
}

fn spki_der(public_key_info: &SubjectPublicKeyInfoOwned) -> Result<Vec<u8>, EngineError> {
    public_key_info.to_der().map_err(EngineError::engine)
}

fn verify_rsa(
    public_key_info: &SubjectPublicKeyInfoOwned,
    hash: HashAlgorithm,
    msg: &[u8],
    signature: &[u8],
) -> Result<bool, EngineError> {
    let der = spki_der(public_key_info)?;
    let key = RsaPublicKey::from_public_key_der(&der).map_err(EngineError::invalid_key)?;
    match key.verify(pkcs1v15_scheme(hash), &hash.digest(msg), signature) {
        Ok(()) => Ok(true),
        Err(rsa::Error::Verification) => Ok(false),
        Err(e) => Err(EngineError::engine(e)),
    }
}

fn verify_p256(
    public_key_info: &SubjectPublicKeyInfoOwned,
    msg: &[u8],
    signature: &[u8],
) -> Result<bool, EngineError> {
    let der = spki_der(public_key_info)?;
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(&der).map_err(EngineError::invalid_key)?;
    let signature = match p256::ecdsa::Signature::from_der(signature) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(msg, &signature).is_ok())
}

fn verify_p384(
    public_key_info: &SubjectPublicKeyInfoOwned,
    msg: &[u8],
    signature: &[u8],
) -> Result<bool, EngineError> {
    let der = spki_der(public_key_info)?;
    let key = p384::ecdsa::VerifyingKey::from_public_key_der(&der).map_err(EngineError::invalid_key)?;
    let signature = match p384::ecdsa::Signature::from_der(signature) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(msg, &signature).is_ok())
}
