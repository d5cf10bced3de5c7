//! Signature-algorithm resolution.
//!
//! Maps a signature [`AlgorithmIdentifierOwned`] to the name of the concrete
//! sign/verify primitive an engine should use. Resolution happens in two
//! stages, both driven by immutable lookup tables:
//!
//! 1. the object identifier is mapped to its canonical identifier name
//!    (`SHA256withRSA`, `SHA1withEC`, ...);
//! 2. the canonical name is normalized through a compatibility alias table
//!    covering historical naming differences between identifier names and the
//!    names verification engines expect. Names without an alias pass through
//!    unchanged; whether the engine recognizes them is the engine's business.

use crate::oids;
use const_oid::ObjectIdentifier;
use spki::AlgorithmIdentifierOwned;

/// Canonical identifier names for the signature algorithm OIDs this codec
/// knows about.
const CANONICAL_NAMES: &[(ObjectIdentifier, &str)] = &[
    (oids::MD2_WITH_RSA_ENCRYPTION, "MD2withRSA"),
    (oids::MD5_WITH_RSA_ENCRYPTION, "MD5withRSA"),
    (oids::SHA1_WITH_RSA_ENCRYPTION, "SHA1withRSA"),
    (oids::SHA256_WITH_RSA_ENCRYPTION, "SHA256withRSA"),
    (oids::SHA384_WITH_RSA_ENCRYPTION, "SHA384withRSA"),
    (oids::SHA512_WITH_RSA_ENCRYPTION, "SHA512withRSA"),
    (oids::DSA_WITH_SHA1, "SHA1withDSA"),
    (oids::ECDSA_WITH_SHA1, "SHA1withEC"),
    (oids::ECDSA_WITH_SHA256, "SHA256withEC"),
    (oids::ECDSA_WITH_SHA384, "SHA384withEC"),
    (oids::ECDSA_WITH_SHA512, "SHA512withEC"),
];

/// Compatibility aliases between canonical identifier names and engine
/// primitive names. Engines dispatch on the right-hand names; changing an
/// entry changes which engines can verify the affected algorithm.
const ENGINE_ALIASES: &[(&str, &str)] = &[
    ("MD5withRSA", "MD5/RSA"),
    ("MD2withRSA", "MD2/RSA"),
    ("SHA1withRSA", "SHA1/RSA"),
    ("SHA1withDSA", "SHA1/DSA"),
    ("SHA1withEC", "SHA1/EC"),
    ("SHA256withEC", "SHA256/EC"),
    ("SHA384withEC", "SHA384/EC"),
    ("SHA512withEC", "SHA512/EC"),
];

/// Canonical identifier name for a known signature algorithm OID.
pub fn canonical_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    CANONICAL_NAMES
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| *name)
}

/// Normalize an identifier name to the primitive name expected by
/// verification engines. Names not present in the alias table are returned
/// unchanged.
pub fn engine_name(name: &str) -> &str {
    ENGINE_ALIASES
        .iter()
        .find(|(identifier, _)| *identifier == name)
        .map(|(_, primitive)| *primitive)
        .unwrap_or(name)
}

/// Resolve an algorithm identifier to an engine primitive name.
///
/// Resolution is total: an OID unknown to both the canonical table and the
/// `const-oid` database resolves to its dotted-decimal string, which the
/// engine will subsequently reject as unsupported.
pub fn resolve(algorithm: &AlgorithmIdentifierOwned) -> String {
    let name = canonical_name(&algorithm.oid)
        .or_else(|| const_oid::db::DB.by_oid(&algorithm.oid))
        .map(str::to_owned)
        .unwrap_or_else(|| algorithm.oid.to_string());
    engine_name(&name).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("MD5withRSA", "MD5/RSA")]
    #[case("MD2withRSA", "MD2/RSA")]
    #[case("SHA1withRSA", "SHA1/RSA")]
    #[case("SHA1withDSA", "SHA1/DSA")]
    #[case("SHA1withEC", "SHA1/EC")]
    #[case("SHA256withEC", "SHA256/EC")]
    #[case("SHA384withEC", "SHA384/EC")]
    #[case("SHA512withEC", "SHA512/EC")]
    fn known_aliases(#[case] identifier: &str, #[case] primitive: &str) {
        assert_eq!(engine_name(identifier), primitive);
    }

    #[rstest]
    #[case("SHA256withRSA")]
    #[case("SHA384withRSA")]
    #[case("SHA512withRSA")]
    #[case("Ed25519")]
    #[case("1.3.9999.1")]
    fn unknown_names_pass_through(#[case] identifier: &str) {
        assert_eq!(engine_name(identifier), identifier);
    }

    #[test]
    fn resolve_known_oid() {
        let algorithm = AlgorithmIdentifierOwned {
            oid: oids::ECDSA_WITH_SHA256,
            parameters: None,
        };
        assert_eq!(resolve(&algorithm), "SHA256/EC");
    }

    #[test]
    fn resolve_unknown_oid_falls_back_to_dotted_string() {
        let algorithm = AlgorithmIdentifierOwned {
            oid: ObjectIdentifier::new_unwrap("1.3.9999.42.1"),
            parameters: None,
        };
        assert_eq!(resolve(&algorithm), "1.3.9999.42.1");
    }
}
