//! CSR attribute helpers.
//!
//! [RFC 2986 #4](https://tools.ietf.org/html/rfc2986#section-4)
//!
//! ```not_rust
//! Attributes { ATTRIBUTE:IOSet } ::= SET OF Attribute{{ IOSet }}
//! ```
//!
//! Attributes are represented with [`x509_cert::attr::Attribute`], a
//! `(type, value-set)` pair. Attribute types are expected to be unique within
//! one request; a request carrying duplicate types is a structural anomaly
//! that is accepted on decode, and the lookup helpers here deliberately
//! resolve it as first-match.

use crate::error::RequestError;
use crate::oids;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, SetOfVec, Utf8StringRef};
use der::{EncodeValue, Tagged};
use x509_cert::attr::{Attribute, Attributes};
use x509_cert::ext::Extensions;

/// Build an attribute holding a single DER-encodable value.
pub fn new_attribute<T>(oid: ObjectIdentifier, value: &T) -> Result<Attribute, RequestError>
where
    T: EncodeValue + Tagged,
{
    let any = Any::encode_from(value).map_err(|e| RequestError::encoding("attribute value", e))?;
    let mut values = SetOfVec::new();
    values
        .insert(any)
        .map_err(|e| RequestError::encoding("attribute value set", e))?;
    Ok(Attribute { oid, values })
}

/// `challengePassword` attribute ([RFC 2985 #5.4.1](https://tools.ietf.org/html/rfc2985#page-16)).
pub fn challenge_password(password: &str) -> Result<Attribute, RequestError> {
    let value = Utf8StringRef::new(password).map_err(|e| RequestError::encoding("challenge password", e))?;
    new_attribute(oids::CHALLENGE_PASSWORD, &value)
}

/// `extensionRequest` attribute ([RFC 2985 #5.4.2](https://tools.ietf.org/html/rfc2985#page-17)).
pub fn extension_request(extensions: &Extensions) -> Result<Attribute, RequestError> {
    new_attribute(oids::EXTENSION_REQUEST, extensions)
}

/// Find the first attribute with the given type.
pub fn find_attribute<'a>(attributes: &'a Attributes, oid: ObjectIdentifier) -> Option<&'a Attribute> {
    attributes.iter().find(|attribute| attribute.oid == oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::asn1::PrintableStringRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn challenge_password_shape() {
        let attribute = challenge_password("hunter2").unwrap();
        assert_eq!(attribute.oid, oids::CHALLENGE_PASSWORD);
        assert_eq!(attribute.values.len(), 1);

        let value = attribute.values.iter().next().unwrap();
        let decoded: Utf8StringRef<'_> = value.decode_as().unwrap();
        assert_eq!(decoded.as_str(), "hunter2");
    }

    #[test]
    fn find_attribute_is_first_match() {
        let first = challenge_password("first").unwrap();
        let second = challenge_password("second").unwrap();

        let mut attributes = Attributes::new();
        attributes.insert(first.clone()).unwrap();
        attributes.insert(second).unwrap();

        // SET OF ordering is canonical DER order; "first" sorts before
        // "second" so the lookup is deterministic here.
        let found = find_attribute(&attributes, oids::CHALLENGE_PASSWORD).unwrap();
        assert_eq!(found, &first);

        assert!(find_attribute(&attributes, oids::EXTENSION_REQUEST).is_none());
    }

    #[test]
    fn custom_attribute_round_trip() {
        let value = PrintableStringRef::new("unstructured").unwrap();
        let oid = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.2");
        let attribute = new_attribute(oid, &value).unwrap();
        assert_eq!(attribute.oid, oid);

        let stored = attribute.values.iter().next().unwrap();
        let decoded: PrintableStringRef<'_> = stored.decode_as().unwrap();
        assert_eq!(decoded.as_str(), "unstructured");
    }
}
