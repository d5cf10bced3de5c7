//! # pkcs10
//!
//! PKCS#10 certification request (CSR) codec: parsing, signing and
//! verification as specified by [RFC 2986](https://tools.ietf.org/html/rfc2986).
//!
//! The decoder keeps the exact byte range of the signed
//! `CertificationRequestInfo` as it appeared in the input, so signature
//! verification always operates over the bytes that were actually signed and
//! never over a re-derived encoding. The encoder upholds the same invariant
//! in reverse: the bytes handed to the signer are the bytes embedded in the
//! final message.
//!
//! ```rust
//! use pkcs10::{CertificationRequest, LocalSigner, LocalVerifier, HashAlgorithm};
//! use std::str::FromStr;
//! use x509_cert::name::Name;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = rand::rngs::OsRng;
//! let key = rsa::RsaPrivateKey::new(&mut rng, 2048)?;
//! let subject = Name::from_str("CN=example.org")?;
//! let signer = LocalSigner::new_rsa(subject, key, HashAlgorithm::Sha256);
//!
//! let mut csr = CertificationRequest::new(signer.public_key_info()?);
//! csr.sign(&signer)?;
//! println!("{}", csr.to_pem()?);
//!
//! let decoded = CertificationRequest::from_der_verified(csr.signed_bytes()?, &LocalVerifier)?;
//! assert_eq!(decoded.subject_name(), csr.subject_name());
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod attribute;
mod decode;
pub mod engine;
pub mod error;
pub mod hash;
pub mod oids;
pub mod pem;
pub mod request;

pub use engine::{EngineError, LocalSigner, LocalVerifier, RequestSigner, SignatureVerifier};
pub use error::RequestError;
pub use hash::HashAlgorithm;
pub use pem::Pem;
pub use request::{CertificationRequest, CertificationRequestInfo};
