//! Certification request model, signing and export.

use crate::decode;
use crate::engine::{EngineError, RequestSigner, SignatureVerifier};
use crate::error::RequestError;
use crate::pem::Pem;
use der::asn1::{AnyRef, BitString};
use der::{Encode, Sequence, Tag};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::fmt;
use x509_cert::attr::Attributes;
use x509_cert::name::Name;

/// PEM label used when exporting a signed request.
pub const REQUEST_PEM_LABEL: &str = "NEW CERTIFICATE REQUEST";

/// Legacy PEM label accepted on import.
const REQUEST_PEM_LABEL_COMPAT: &str = "CERTIFICATE REQUEST";

/// [RFC 2986 #4](https://tools.ietf.org/html/rfc2986#section-4)
///
/// ```not_rust
/// CertificationRequestInfo ::= SEQUENCE {
///      version       INTEGER { v1(0) } (v1,...),
///      subject       Name,
///      subjectPKInfo SubjectPublicKeyInfo{{ PKInfoAlgorithms }},
///      attributes    [0] Attributes{{ CRIAttributes }}
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Sequence)]
pub struct CertificationRequestInfo {
    pub version: u8,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    pub attributes: Attributes,
}

impl CertificationRequestInfo {
    pub fn new(subject: Name, subject_public_key_info: SubjectPublicKeyInfoOwned, attributes: Attributes) -> Self {
        // It shall be 0 for this version of the standard.
        Self {
            version: 0,
            subject,
            subject_public_key_info,
            attributes,
        }
    }
}

/// The signed third of the request. Either all of these exist or none do;
/// there is no partial state.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SignedData {
    /// Exact bytes of the CertificationRequestInfo SEQUENCE as signed.
    /// Authoritative: never re-derived by re-encoding the structured fields,
    /// since BER/DER encoders do not guarantee bit-identical output.
    pub(crate) info_der: Vec<u8>,
    pub(crate) algorithm: AlgorithmIdentifierOwned,
    pub(crate) signature: BitString,
    /// Full outer DER encoding.
    pub(crate) encoded: Vec<u8>,
}

/// Certification request per [RFC 2986 #4](https://tools.ietf.org/html/rfc2986#section-4).
///
/// ```not_rust
/// CertificationRequest ::= SEQUENCE {
///      certificationRequestInfo CertificationRequestInfo,
///      signatureAlgorithm AlgorithmIdentifier{{ SignatureAlgorithms }},
///      signature          BIT STRING
/// }
/// ```
///
/// A request is created either by decoding untrusted bytes (born signed) or
/// by construction from a public key and optional attributes (born unsigned,
/// transitioning to signed exactly once via [`CertificationRequest::sign`]).
#[derive(Clone, Debug, PartialEq)]
pub struct CertificationRequest {
    version: u64,
    subject: Option<Name>,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    attributes: Attributes,
    signed: Option<SignedData>,
}

impl CertificationRequest {
    /// Unsigned request for the given public key, with no attributes.
    pub fn new(subject_public_key_info: SubjectPublicKeyInfoOwned) -> Self {
        Self::with_attributes(subject_public_key_info, Attributes::default())
    }

    /// Unsigned request for the given public key and attribute set.
    pub fn with_attributes(subject_public_key_info: SubjectPublicKeyInfoOwned, attributes: Attributes) -> Self {
        Self {
            version: 0,
            subject: None,
            subject_public_key_info,
            attributes,
            signed: None,
        }
    }

    pub(crate) fn from_parts(
        version: u64,
        subject: Name,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
        attributes: Attributes,
        signed: SignedData,
    ) -> Self {
        Self {
            version,
            subject: Some(subject),
            subject_public_key_info,
            attributes,
            signed: Some(signed),
        }
    }

    /// Decode a DER-encoded certification request without verifying its
    /// signature.
    pub fn from_der(input: &[u8]) -> Result<Self, RequestError> {
        decode::decode(input)
    }

    /// Decode a DER-encoded certification request and verify the embedded
    /// signature over the exact info bytes captured from the input.
    pub fn from_der_verified(input: &[u8], verifier: &dyn SignatureVerifier) -> Result<Self, RequestError> {
        let request = decode::decode(input)?;
        request.verify_signature(verifier)?;
        Ok(request)
    }

    /// Read a request from PEM, without signature verification.
    ///
    /// Accepts both the `NEW CERTIFICATE REQUEST` and the plain
    /// `CERTIFICATE REQUEST` labels.
    pub fn from_pem(pem: &Pem<'_>) -> Result<Self, RequestError> {
        match pem.label() {
            REQUEST_PEM_LABEL | REQUEST_PEM_LABEL_COMPAT => Self::from_der(pem.data()),
            label => Err(RequestError::InvalidPemLabel {
                label: label.to_owned(),
            }),
        }
    }

    /// Read a request from PEM and verify the embedded signature.
    pub fn from_pem_verified(pem: &Pem<'_>, verifier: &dyn SignatureVerifier) -> Result<Self, RequestError> {
        let request = Self::from_pem(pem)?;
        request.verify_signature(verifier)?;
        Ok(request)
    }

    /// Read a request from PEM text, without signature verification.
    pub fn from_pem_str(input: &str) -> Result<Self, RequestError> {
        let pem = crate::pem::parse_pem(input)?;
        Self::from_pem(&pem)
    }

    /// The version field. 0 for every request this version of the standard
    /// describes; any unsigned INTEGER value is tolerated on decode and
    /// surfaced here, but callers should treat non-zero values as suspicious.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Subject distinguished name. `None` while unsigned and not yet bound
    /// to a signer identity.
    pub fn subject_name(&self) -> Option<&Name> {
        self.subject.as_ref()
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.subject_public_key_info
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_signed(&self) -> bool {
        self.signed.is_some()
    }

    /// Identifier of the algorithm the request is signed with.
    pub fn signature_algorithm(&self) -> Option<&AlgorithmIdentifierOwned> {
        self.signed.as_ref().map(|signed| &signed.algorithm)
    }

    /// Raw signature bytes (the BIT STRING payload).
    pub fn signature(&self) -> Option<&[u8]> {
        self.signed.as_ref().map(|signed| signed.signature.raw_bytes())
    }

    /// Full DER encoding of the signed message.
    pub fn signed_bytes(&self) -> Result<&[u8], RequestError> {
        self.signed
            .as_ref()
            .map(|signed| signed.encoded.as_slice())
            .ok_or(RequestError::NotYetSigned)
    }

    /// Exact CertificationRequestInfo byte span that was (or will be
    /// presented as) signed, for out-of-band re-verification.
    pub fn info_bytes(&self) -> Result<&[u8], RequestError> {
        self.signed
            .as_ref()
            .map(|signed| signed.info_der.as_slice())
            .ok_or(RequestError::NotYetSigned)
    }

    /// Add an attribute to an unsigned request.
    pub fn add_attribute(&mut self, attribute: x509_cert::attr::Attribute) -> Result<(), RequestError> {
        if self.signed.is_some() {
            return Err(RequestError::AlreadySigned);
        }
        self.attributes
            .insert(attribute)
            .map_err(|e| RequestError::encoding("attribute set", e))
    }

    /// Sign the request, transitioning it to the signed state.
    ///
    /// Single-shot by design: signing an already signed request fails with
    /// [`RequestError::AlreadySigned`]. The signer asserts the subject
    /// identity; the bytes handed to it are exactly the bytes embedded in the
    /// final message.
    pub fn sign(&mut self, signer: &dyn RequestSigner) -> Result<(), RequestError> {
        if self.signed.is_some() {
            return Err(RequestError::AlreadySigned);
        }

        let subject = signer.subject();
        let info = CertificationRequestInfo::new(
            subject.clone(),
            self.subject_public_key_info.clone(),
            self.attributes.clone(),
        );
        let info_der = info
            .to_der()
            .map_err(|e| RequestError::encoding("certification request info", e))?;

        let signature_bytes = match signer.sign(&info_der) {
            Ok(signature) => signature,
            Err(EngineError::UnsupportedAlgorithm { algorithm }) => {
                return Err(RequestError::UnsupportedAlgorithm { algorithm })
            }
            Err(EngineError::InvalidKey { context }) => return Err(RequestError::InvalidKey { context }),
            Err(EngineError::Engine { context }) => return Err(RequestError::SigningEngine { context }),
        };
        let signature =
            BitString::from_bytes(&signature_bytes).map_err(|e| RequestError::encoding("signature", e))?;

        let algorithm = signer.algorithm_identifier();
        let encoded = assemble(&info_der, &algorithm, &signature)?;

        self.subject = Some(subject);
        self.signed = Some(SignedData {
            info_der,
            algorithm,
            signature,
            encoded,
        });
        Ok(())
    }

    /// Verify the embedded signature with the given engine, over the exact
    /// captured info bytes.
    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> Result<(), RequestError> {
        let signed = self.signed.as_ref().ok_or(RequestError::NotYetSigned)?;
        let primitive = crate::algorithm::resolve(&signed.algorithm);
        match verifier.verify(
            &self.subject_public_key_info,
            &primitive,
            &signed.info_der,
            signed.signature.raw_bytes(),
        ) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RequestError::SignatureVerificationFailed),
            Err(EngineError::UnsupportedAlgorithm { algorithm }) => {
                Err(RequestError::UnsupportedAlgorithm { algorithm })
            }
            Err(EngineError::InvalidKey { context }) => Err(RequestError::InvalidKey { context }),
            Err(EngineError::Engine { context }) => Err(RequestError::VerificationEngine { context }),
        }
    }

    /// Full DER encoding of the signed message, as an owned buffer.
    pub fn to_der(&self) -> Result<Vec<u8>, RequestError> {
        Ok(self.signed_bytes()?.to_vec())
    }

    /// Render the signed message as a delimited base64 block.
    pub fn to_pem(&self) -> Result<Pem<'static>, RequestError> {
        Ok(Pem::new(REQUEST_PEM_LABEL, self.signed_bytes()?.to_vec()))
    }
}

impl fmt::Display for CertificationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject_name() {
            Some(subject) => writeln!(f, "subject: {subject}")?,
            None => writeln!(f, "subject: <unbound>")?,
        }
        writeln!(f, "version: {}", self.version)?;
        match self.signature_algorithm() {
            Some(algorithm) => writeln!(f, "signature algorithm: {}", crate::algorithm::resolve(algorithm)),
            None => writeln!(f, "signature algorithm: <not signed>"),
        }
    }
}

/// Assemble the outer SEQUENCE from the captured info bytes, the algorithm
/// identifier and the signature bit string. The info bytes are embedded
/// verbatim.
fn assemble(
    info_der: &[u8],
    algorithm: &AlgorithmIdentifierOwned,
    signature: &BitString,
) -> Result<Vec<u8>, RequestError> {
    let algorithm_der = algorithm
        .to_der()
        .map_err(|e| RequestError::encoding("signature algorithm", e))?;
    let signature_der = signature
        .to_der()
        .map_err(|e| RequestError::encoding("signature", e))?;

    let mut body = Vec::with_capacity(info_der.len() + algorithm_der.len() + signature_der.len());
    body.extend_from_slice(info_der);
    body.extend_from_slice(&algorithm_der);
    body.extend_from_slice(&signature_der);

    AnyRef::new(Tag::Sequence, &body)
        .and_then(|outer| outer.to_der())
        .map_err(|e| RequestError::encoding("certification request", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalSigner;
    use crate::hash::HashAlgorithm;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::str::FromStr;

    fn rsa_signer(cn: &str) -> LocalSigner {
        let mut rng = StdRng::seed_from_u64(1);
        let key = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        LocalSigner::new_rsa(Name::from_str(cn).unwrap(), key, HashAlgorithm::Sha256)
    }

    #[test]
    fn unsigned_request_has_no_signed_outputs() {
        let signer = rsa_signer("CN=unsigned");
        let request = CertificationRequest::new(signer.public_key_info().unwrap());

        assert!(!request.is_signed());
        assert!(request.subject_name().is_none());
        assert!(matches!(request.signed_bytes(), Err(RequestError::NotYetSigned)));
        assert!(matches!(request.info_bytes(), Err(RequestError::NotYetSigned)));
        assert!(matches!(request.to_pem(), Err(RequestError::NotYetSigned)));
    }

    #[test]
    fn signing_is_single_shot() {
        let signer = rsa_signer("CN=once");
        let mut request = CertificationRequest::new(signer.public_key_info().unwrap());

        request.sign(&signer).unwrap();
        assert!(request.is_signed());
        assert_eq!(request.subject_name().unwrap().to_string(), "CN=once");

        assert!(matches!(request.sign(&signer), Err(RequestError::AlreadySigned)));
    }

    #[test]
    fn attributes_are_frozen_after_signing() {
        let signer = rsa_signer("CN=frozen");
        let mut request = CertificationRequest::new(signer.public_key_info().unwrap());
        request.sign(&signer).unwrap();

        let attribute = crate::attribute::challenge_password("too late").unwrap();
        assert!(matches!(request.add_attribute(attribute), Err(RequestError::AlreadySigned)));
    }

    #[test]
    fn display_reports_signing_state() {
        let signer = rsa_signer("CN=display");
        let mut request = CertificationRequest::new(signer.public_key_info().unwrap());

        let unsigned = request.to_string();
        assert!(unsigned.contains("subject: <unbound>"));
        assert!(unsigned.contains("signature algorithm: <not signed>"));

        request.sign(&signer).unwrap();
        let signed = request.to_string();
        assert!(signed.contains("subject: CN=display"));
        assert!(signed.contains("signature algorithm: SHA256withRSA"));
    }

    #[test]
    fn signed_bytes_embed_info_bytes_verbatim() {
        let signer = rsa_signer("CN=verbatim");
        let mut request = CertificationRequest::new(signer.public_key_info().unwrap());
        request.sign(&signer).unwrap();

        let encoded = request.signed_bytes().unwrap();
        let info = request.info_bytes().unwrap();
        let position = encoded
            .windows(info.len())
            .position(|window| window == info)
            .expect("info bytes embedded in outer encoding");
        // Right after the outer SEQUENCE header.
        assert!(position <= 4);
    }
}
