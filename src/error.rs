//! Crate-wide error taxonomy for the request codec.

use crate::pem::PemError;
use thiserror::Error;

/// Errors reported by the certification request codec.
///
/// The codec performs no local recovery and no retries: every failure is a
/// terminal result for the call that produced it.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The byte buffer does not match the required SEQUENCE shapes, field
    /// counts, or tag types.
    #[error("malformed {element}: {context}")]
    MalformedStructure {
        element: &'static str,
        context: String,
    },

    /// A collaborator failed to DER-encode one of our elements.
    #[error("couldn't encode {element}: {context}")]
    Asn1Encoding {
        element: &'static str,
        context: String,
    },

    /// The signature algorithm identifier has no known or engine-recognized
    /// mapping.
    #[error("unsupported signature algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// The parsed public key cannot be used to initialize the verification
    /// primitive.
    #[error("invalid public key: {context}")]
    InvalidKey { context: String },

    /// Structurally valid request, resolvable algorithm, usable key, but the
    /// signature does not match the signed bytes.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// The verification engine itself raised an error.
    #[error("verification engine error: {context}")]
    VerificationEngine { context: String },

    /// The signing engine itself raised an error.
    #[error("signing engine error: {context}")]
    SigningEngine { context: String },

    /// Signing was attempted on a request that is already signed.
    #[error("certification request is already signed")]
    AlreadySigned,

    /// The requested output exists only once the request has been signed.
    #[error("certification request is not signed yet")]
    NotYetSigned,

    /// invalid PEM label
    #[error("invalid PEM label: {label}")]
    InvalidPemLabel { label: String },

    /// couldn't read PEM
    #[error("couldn't read PEM: {0}")]
    Pem(#[from] PemError),
}

impl RequestError {
    pub(crate) fn malformed(element: &'static str, source: der::Error) -> Self {
        RequestError::MalformedStructure {
            element,
            context: source.to_string(),
        }
    }

    pub(crate) fn encoding(element: &'static str, source: der::Error) -> Self {
        RequestError::Asn1Encoding {
            element,
            context: source.to_string(),
        }
    }
}
