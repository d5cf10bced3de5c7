//! DER decoding of certification requests.
//!
//! Decoding is done by hand with a slice reader rather than through a derived
//! `Sequence` impl so that the exact byte span of the signed
//! CertificationRequestInfo element can be captured out of the input buffer.
//! Re-encoding the structured fields is not guaranteed to reproduce the bytes
//! the signer saw, so it is never used for verification.

use crate::error::RequestError;
use crate::request::{CertificationRequest, SignedData};
use der::asn1::{BitString, ContextSpecific, UintRef};
use der::{Decode, Header, Reader, SliceReader, Tag, TagNumber};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::Attributes;
use x509_cert::name::Name;

pub(crate) fn decode(input: &[u8]) -> Result<CertificationRequest, RequestError> {
    let mut outer = SliceReader::new(input).map_err(|e| RequestError::malformed("certification request", e))?;
    let header = Header::decode(&mut outer).map_err(|e| RequestError::malformed("certification request", e))?;
    if header.tag != Tag::Sequence {
        return Err(RequestError::MalformedStructure {
            element: "certification request",
            context: format!("expected SEQUENCE, got {}", header.tag),
        });
    }

    let body_start = position(&outer)?;
    let body_len = length(header.length, "certification request")?;
    // Trailing bytes past the outer element are tolerated; everything inside
    // it is accounted for strictly.
    let body = input
        .get(body_start..body_start + body_len)
        .ok_or_else(|| truncated("certification request"))?;
    let encoded = input[..body_start + body_len].to_vec();

    let mut reader = SliceReader::new(body).map_err(|e| RequestError::malformed("certification request", e))?;

    let info_header = Header::decode(&mut reader).map_err(|e| RequestError::malformed("certification request info", e))?;
    if info_header.tag != Tag::Sequence {
        return Err(RequestError::MalformedStructure {
            element: "certification request info",
            context: format!("expected SEQUENCE, got {}", info_header.tag),
        });
    }
    let info_body = reader
        .read_slice(info_header.length)
        .map_err(|e| RequestError::malformed("certification request info", e))?;
    let info_end = position(&reader)?;
    let info_der = body[..info_end].to_vec();

    let (version, subject, subject_public_key_info, attributes) = decode_info(info_body)?;

    let algorithm =
        AlgorithmIdentifierOwned::decode(&mut reader).map_err(|e| RequestError::malformed("signature algorithm", e))?;
    let signature = BitString::decode(&mut reader).map_err(|e| RequestError::malformed("signature", e))?;

    if !reader.is_finished() {
        return Err(RequestError::MalformedStructure {
            element: "certification request",
            context: "trailing content after signature".to_owned(),
        });
    }

    Ok(CertificationRequest::from_parts(
        version,
        subject,
        subject_public_key_info,
        attributes,
        SignedData {
            info_der,
            algorithm,
            signature,
            encoded,
        },
    ))
}

fn decode_info(info_body: &[u8]) -> Result<(u64, Name, SubjectPublicKeyInfoOwned, Attributes), RequestError> {
    let mut reader = SliceReader::new(info_body).map_err(|e| RequestError::malformed("certification request info", e))?;

    let version = decode_version(&mut reader)?;
    let subject = Name::decode(&mut reader).map_err(|e| RequestError::malformed("subject", e))?;
    let subject_public_key_info =
        SubjectPublicKeyInfoOwned::decode(&mut reader).map_err(|e| RequestError::malformed("subject public key info", e))?;

    // The [0] IMPLICIT attributes element is mandatory per the standard, but
    // some producers omit it entirely. An absent element is read as an empty
    // attribute set.
    let attributes = if reader.is_finished() {
        Attributes::default()
    } else {
        ContextSpecific::<Attributes>::decode_implicit(&mut reader, TagNumber::N0)
            .map_err(|e| RequestError::malformed("attributes", e))?
            .ok_or_else(|| RequestError::MalformedStructure {
                element: "attributes",
                context: "unexpected element in place of [0] attributes".to_owned(),
            })?
            .value
    };

    if !reader.is_finished() {
        return Err(RequestError::MalformedStructure {
            element: "certification request info",
            context: "trailing content after attributes".to_owned(),
        });
    }

    Ok((version, subject, subject_public_key_info, attributes))
}

// The version INTEGER is read leniently: any unsigned value of up to eight
// content bytes is accepted and surfaced as-is, since producers have shipped
// values other than 0. Only a non-INTEGER element is a structural error.
fn decode_version(reader: &mut SliceReader<'_>) -> Result<u64, RequestError> {
    let raw = UintRef::decode(reader).map_err(|e| RequestError::malformed("version", e))?;
    let bytes = raw.as_bytes();
    if bytes.len() > 8 {
        return Err(RequestError::MalformedStructure {
            element: "version",
            context: "INTEGER wider than 64 bits".to_owned(),
        });
    }
    Ok(bytes.iter().fold(0u64, |value, byte| value << 8 | u64::from(*byte)))
}

fn position(reader: &SliceReader<'_>) -> Result<usize, RequestError> {
    usize::try_from(reader.position()).map_err(|e| RequestError::malformed("certification request", e))
}

fn length(length: der::Length, element: &'static str) -> Result<usize, RequestError> {
    usize::try_from(length).map_err(|e| RequestError::malformed(element, e))
}

fn truncated(element: &'static str) -> RequestError {
    RequestError::MalformedStructure {
        element,
        context: "content shorter than declared length".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use pretty_assertions::assert_eq;

    fn csr_bytes() -> Vec<u8> {
        BASE64
            .decode(
                "MIICYjCCAUoCAQAwHTEbMBkGA1UEAxMSdGVzdC5jb250b3NvLmxvY2FsMIIBIjAN\
                 BgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAym0At2TvEqP0mYVLJzGVpNXjugu/\
                 kBpuKvXt/Vax4Bxnj3YzHTCpwkyZPytUC6zJ+q+uGh0e7gYQsYHJKjgoKEsS6gQ4\
                 ZM3D/AQy0zqPUT0ruSKDWKK4f2d/2ijDs5R2LHj7DtNZBanCXU16Qp1O28su0QZK\
                 OYbXzsJSpHp80dhqD6JUxXlSZzlVBp28CC9ryrE6w+kOQ38TZ1/mBJPsfmDeKBpm\
                 3FRrfHtWt43eok/T6FhCLIzsqyCZ0UCQqkcLr+TfoftJe2nOHQ1sfk4keJ9iwA/f\
                 hYv5rqUB3RUztSIhExwtYDwd+YovenhsL4sW/kjR29RTLUFPPXAelG9XPwIDAQAB\
                 oAAwDQYJKoZIhvcNAQELBQADggEBAKrCf4sFDBFZQ6CPYdaxe3InMp7KFaueMIB8\
                 /YK73rJ+JGB6fQfltCCkToTE1y0Q3UqTlqHmaqdoh0KMWue6jCFvBat4/TUqUG7W\
                 tRLDP67eMulolcIzLqwTjR38DVJvnwrd2pey43q3UHBjlStxT/gI4ysQHn4qrzHB\
                 6OK9O6ypqTtwXxnm3TJF9dctLwvbh7NZSaamSlxI0/ajKZOP9k1KZEOPtaiiMPe2\
                 yr+QvwY2ov66MRG5PPRZELQWBaPZOuFwmCsFOLXJMpvhoAgklBCFZmiQMgApGIC1\
                 FIDgjm2ZhQQIRMnTsAV6f7BclRTaUkc0sPl17YB9GfNfOm1oL7o=",
            )
            .expect("invalid base64")
    }

    #[test]
    fn decodes_external_csr() {
        let encoded = csr_bytes();
        let request = decode(&encoded).expect("decode");

        assert_eq!(request.version(), 0);
        assert_eq!(
            request.subject_name().expect("subject").to_string(),
            "CN=test.contoso.local"
        );
        assert!(request.attributes().is_empty());
        assert!(request.is_signed());
        assert_eq!(
            crate::algorithm::resolve(request.signature_algorithm().unwrap()),
            "SHA256withRSA"
        );
    }

    #[test]
    fn captures_exact_info_and_signature_spans() {
        let encoded = csr_bytes();
        let request = decode(&encoded).expect("decode");

        assert_eq!(request.info_bytes().unwrap(), &encoded[4..338]);
        assert_eq!(request.signature().unwrap(), &encoded[358..614]);
        assert_eq!(request.signed_bytes().unwrap(), &encoded[..]);
    }

    #[test]
    fn trailing_bytes_after_outer_element_are_ignored() {
        let mut encoded = csr_bytes();
        let original_len = encoded.len();
        encoded.extend_from_slice(&[0xde, 0xad]);

        let request = decode(&encoded).expect("decode");
        assert_eq!(request.signed_bytes().unwrap().len(), original_len);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let encoded = csr_bytes();
        let err = decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, RequestError::MalformedStructure { .. }));
    }

    #[test]
    fn non_sequence_outer_tag_is_rejected() {
        let err = decode(&[0x04, 0x02, 0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            RequestError::MalformedStructure {
                element: "certification request",
                ..
            }
        ));
    }
}
