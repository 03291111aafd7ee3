//! Reference digesting: ordered transform application followed by hashing.

use crate::crypto::HashAlg;
use crate::dsig::{Error, Result, algorithms, c14n, utils};

/// Apply a transform chain strictly in declared order; the output of each
/// transform is the input of the next.
///
/// Operates on a borrowed view of the document and never mutates the
/// caller's tree, so digesting is repeatable. Unknown transform identifiers
/// fail with [`Error::Transform`].
pub fn apply_transforms(xml: impl AsRef<str>, transforms: &[&str]) -> Result<String> {
    let mut current = xml.as_ref().to_string();
    for uri in transforms {
        current = match *uri {
            algorithms::ENVELOPED_SIGNATURE => utils::strip_signatures(&current)?,
            algorithms::EXCLUSIVE_C14N => c14n::canonicalize(&current, None)?,
            other => return Err(Error::Transform(other.to_string())),
        };
    }
    Ok(current)
}

/// Digest a node-set: run the transform chain, then hash the resulting
/// canonical bytes with the declared digest algorithm. Returns raw digest
/// bytes; base64 encoding happens at serialization time.
pub fn reference_digest(
    xml: impl AsRef<str>,
    transforms: &[&str],
    digest_algorithm: &str,
) -> Result<Vec<u8>> {
    let canonical = apply_transforms(xml, transforms)?;
    let hash_alg = digest_alg(digest_algorithm)?;
    Ok(hash_alg.hash(canonical.as_bytes())?)
}

/// Resolve a digest algorithm URI, failing with [`Error::Digest`] when it is
/// not supported.
pub(crate) fn digest_alg(uri: &str) -> Result<HashAlg> {
    match uri {
        algorithms::SHA256 => Ok(HashAlg::Sha256),
        other => Err(Error::Digest(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &[&str] = &[algorithms::ENVELOPED_SIGNATURE, algorithms::EXCLUSIVE_C14N];

    #[test]
    fn chain_strips_then_canonicalizes() {
        let xml = r#"<root b="2" a="1"><Signature>old</Signature><child/></root>"#;
        let result = apply_transforms(xml, CHAIN).unwrap();
        assert_eq!(result, r#"<root a="1" b="2"><child></child></root>"#);
    }

    #[test]
    fn unsupported_transform_rejected() {
        let err = apply_transforms("<root/>", &["urn:bogus-transform"]).unwrap_err();
        assert!(matches!(err, Error::Transform(_)));
    }

    #[test]
    fn unsupported_digest_rejected() {
        let err = reference_digest("<root/>", CHAIN, "urn:bogus-digest").unwrap_err();
        assert!(matches!(err, Error::Digest(_)));
    }

    #[test]
    fn digest_is_repeatable() {
        let xml = r#"<root xmlns="urn:t"><child>hi</child></root>"#;
        let a = reference_digest(xml, CHAIN, algorithms::SHA256).unwrap();
        let b = reference_digest(xml, CHAIN, algorithms::SHA256).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn digest_ignores_stale_signatures() {
        let clean = r#"<root xmlns="urn:t"><child>hi</child></root>"#;
        let stale = r#"<root xmlns="urn:t"><child>hi</child><Signature>old</Signature></root>"#;
        assert_eq!(
            reference_digest(clean, CHAIN, algorithms::SHA256).unwrap(),
            reference_digest(stale, CHAIN, algorithms::SHA256).unwrap()
        );
    }

    #[test]
    fn digest_detects_content_changes() {
        let a = reference_digest(
            r#"<root xmlns="urn:t"><child>hi</child></root>"#,
            CHAIN,
            algorithms::SHA256,
        )
        .unwrap();
        let b = reference_digest(
            r#"<root xmlns="urn:t"><child>ho</child></root>"#,
            CHAIN,
            algorithms::SHA256,
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
