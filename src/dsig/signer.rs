//! The enveloped signing pipeline.
//!
//! Stage order is fixed: reference digest over the stripped document, then
//! SignedInfo canonicalization, then the RSA signature, then assembly and
//! insertion. Assembly is the last step, so any earlier failure leaves the
//! caller's document untouched.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::se::to_string;
use tracing::{debug, info};

use crate::crypto::{HashAlg, rsa, rsa::RsaKeyPair};
use crate::dsig::{
    Error, KeyInfo, KeyValue, Reference, Result, RsaKeyValue, Signature, SignatureValue,
    SignedInfo, Transform, Transforms, algorithms, c14n, ns, transforms, types::AlgorithmElement,
    utils,
};

/// Signs XML documents with an enveloped XMLDSig signature.
///
/// Borrows the key pair for its lifetime; nothing is retained beyond the
/// signing call. All state is read-only after construction, so independent
/// documents may be signed concurrently with separate invocations.
pub struct EnvelopedSigner<'k> {
    key_pair: &'k RsaKeyPair,
    digest_algorithm: &'static str,
    signature_algorithm: &'static str,
    c14n_algorithm: &'static str,
}

impl<'k> EnvelopedSigner<'k> {
    /// Create a signer with the default algorithm suite: SHA-256 digest,
    /// RSA-SHA256 signature, exclusive C14N.
    pub fn new(key_pair: &'k RsaKeyPair) -> Self {
        Self {
            key_pair,
            digest_algorithm: algorithms::SHA256,
            signature_algorithm: algorithms::RSA_SHA256,
            c14n_algorithm: algorithms::EXCLUSIVE_C14N,
        }
    }

    /// Create a signer with explicit digest and signature algorithm URIs.
    ///
    /// Fails with [`Error::Digest`] or [`Error::Signing`] when an identifier
    /// is not supported.
    pub fn with_algorithms(
        key_pair: &'k RsaKeyPair,
        digest_algorithm: &str,
        signature_algorithm: &str,
    ) -> Result<Self> {
        let digest_algorithm = match digest_algorithm {
            algorithms::SHA256 => algorithms::SHA256,
            other => return Err(Error::Digest(other.to_string())),
        };
        let signature_algorithm = match signature_algorithm {
            algorithms::RSA_SHA256 => algorithms::RSA_SHA256,
            other => return Err(Error::Signing(format!("Unsupported signature method: {other}"))),
        };
        Ok(Self {
            key_pair,
            digest_algorithm,
            signature_algorithm,
            c14n_algorithm: algorithms::EXCLUSIVE_C14N,
        })
    }

    /// Sign a document with an enveloped signature.
    ///
    /// Every pre-existing `Signature` element is removed; the returned
    /// document contains exactly one, inserted as the last child of the
    /// root. The whole-document reference uses `URI=""` with the
    /// enveloped-signature and exclusive-C14N transforms in that order.
    pub fn sign_enveloped(&self, xml: &str) -> Result<String> {
        // Stale signatures go first so the reference digest can never cover
        // a signature element, old or new.
        let stripped = utils::strip_signatures(xml)?;

        let transform_chain = [algorithms::ENVELOPED_SIGNATURE, self.c14n_algorithm];
        let digest =
            transforms::reference_digest(&stripped, &transform_chain, self.digest_algorithm)?;
        debug!(digest = %hex::encode(&digest), "Computed reference digest");

        let signed_info = self.build_signed_info(BASE64.encode(&digest));

        // The canonicalization method declared inside SignedInfo is the same
        // algorithm applied to SignedInfo itself and to the reference.
        let canonical_signed_info = self.canonical_signed_info(&signed_info)?;

        let signature_value = rsa::sign(
            self.key_pair.private_key(),
            canonical_signed_info.as_bytes(),
            self.signature_hash()?,
        )?;

        let signature = Signature {
            xmlns: ns::DS.to_string(),
            signed_info: SignedInfo {
                // The parent Signature element declares the namespace
                xmlns: None,
                ..signed_info
            },
            signature_value: SignatureValue {
                value: BASE64.encode(signature_value.as_bytes()),
            },
            key_info: self.build_key_info()?,
        };
        let signature_xml = to_string(&signature)?;

        let signed = utils::insert_into_root(&stripped, &signature_xml)?;
        info!("Enveloped signature attached to document root");
        Ok(signed)
    }

    /// Assemble the SignedInfo block for the whole-document reference,
    /// carrying the dsig namespace for standalone canonicalization.
    fn build_signed_info(&self, digest_value: String) -> SignedInfo {
        SignedInfo {
            xmlns: Some(ns::DS.to_string()),
            canonicalization_method: AlgorithmElement::new(self.c14n_algorithm),
            signature_method: AlgorithmElement::new(self.signature_algorithm),
            references: vec![Reference {
                uri: String::new(),
                transforms: Transforms {
                    transform: vec![
                        Transform::new(algorithms::ENVELOPED_SIGNATURE),
                        Transform::new(self.c14n_algorithm),
                    ],
                },
                digest_method: AlgorithmElement::new(self.digest_algorithm),
                digest_value,
            }],
        }
    }

    /// Serialize SignedInfo standalone and canonicalize it; these bytes are
    /// what the signature mathematically covers.
    fn canonical_signed_info(&self, signed_info: &SignedInfo) -> Result<String> {
        let signed_info_xml = to_string(signed_info)?;
        c14n::canonicalize(&signed_info_xml, None)
    }

    fn signature_hash(&self) -> Result<HashAlg> {
        match self.signature_algorithm {
            algorithms::RSA_SHA256 => Ok(HashAlg::Sha256),
            other => Err(Error::Signing(format!("Unsupported signature method: {other}"))),
        }
    }

    /// KeyValue with the RSA public key so verifiers need no out-of-band
    /// key distribution.
    fn build_key_info(&self) -> Result<KeyInfo> {
        let public = self.key_pair.public_key();
        Ok(KeyInfo {
            key_value: KeyValue {
                rsa_key_value: RsaKeyValue {
                    modulus: BASE64.encode(public.modulus()?),
                    exponent: BASE64.encode(public.public_exponent()?),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rsa::RsaKeySize;

    const DOC: &str = r#"<root xmlns="urn:t"><child>hi</child></root>"#;

    fn test_key_pair() -> RsaKeyPair {
        RsaKeyPair::generate(RsaKeySize::Rsa2048).unwrap()
    }

    fn extract(haystack: &str, tag: &str) -> String {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        let start = haystack.find(&open).unwrap() + open.len();
        let end = haystack.find(&close).unwrap();
        haystack[start..end].to_string()
    }

    #[test]
    fn signed_document_structure() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);
        let signed = signer.sign_enveloped(DOC).unwrap();

        assert!(signed.starts_with(r#"<root xmlns="urn:t"><child>hi</child>"#));
        assert!(signed.contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(signed.contains(r#"URI="""#));
        assert!(!extract(&signed, "DigestValue").is_empty());
        assert!(!extract(&signed, "SignatureValue").is_empty());
        assert!(!extract(&signed, "Modulus").is_empty());

        // Transform order: enveloped-signature first, then exclusive C14N
        let enveloped_pos = signed.find(algorithms::ENVELOPED_SIGNATURE).unwrap();
        let c14n_transform_pos = signed
            .match_indices(algorithms::EXCLUSIVE_C14N)
            .map(|(i, _)| i)
            .find(|&i| i > enveloped_pos)
            .unwrap();
        assert!(enveloped_pos < c14n_transform_pos);
    }

    #[test]
    fn digest_matches_recomputation_over_unsigned_form() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);
        let signed = signer.sign_enveloped(DOC).unwrap();

        let stored = extract(&signed, "DigestValue");
        let recomputed = transforms::reference_digest(
            DOC,
            &[algorithms::ENVELOPED_SIGNATURE, algorithms::EXCLUSIVE_C14N],
            algorithms::SHA256,
        )
        .unwrap();
        assert_eq!(stored, BASE64.encode(recomputed));
    }

    #[test]
    fn signature_value_verifies_against_public_key() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);
        let signed = signer.sign_enveloped(DOC).unwrap();

        // Rebuild the exact canonical SignedInfo bytes that were signed
        let digest_value = extract(&signed, "DigestValue");
        let signed_info = signer.build_signed_info(digest_value);
        let canonical = signer.canonical_signed_info(&signed_info).unwrap();

        let sig_bytes = BASE64.decode(extract(&signed, "SignatureValue")).unwrap();
        let signature = rsa::RsaSignature::new(key_pair.key_size(), sig_bytes);
        assert!(
            rsa::verify(
                key_pair.public_key(),
                canonical.as_bytes(),
                &signature,
                HashAlg::Sha256
            )
            .unwrap()
        );
    }

    #[test]
    fn resigning_replaces_stale_signature() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);

        let once = signer.sign_enveloped(DOC).unwrap();
        let twice = signer.sign_enveloped(&once).unwrap();

        assert_eq!(twice.matches("<Signature xmlns").count(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn signing_is_deterministic() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);
        assert_eq!(
            signer.sign_enveloped(DOC).unwrap(),
            signer.sign_enveloped(DOC).unwrap()
        );
    }

    #[test]
    fn unsupported_algorithms_rejected() {
        let key_pair = test_key_pair();
        assert!(matches!(
            EnvelopedSigner::with_algorithms(&key_pair, "urn:bogus", algorithms::RSA_SHA256),
            Err(Error::Digest(_))
        ));
        assert!(matches!(
            EnvelopedSigner::with_algorithms(&key_pair, algorithms::SHA256, "urn:bogus"),
            Err(Error::Signing(_))
        ));
    }

    #[test]
    fn empty_document_leaves_no_partial_state() {
        let key_pair = test_key_pair();
        let signer = EnvelopedSigner::new(&key_pair);
        assert!(matches!(
            signer.sign_enveloped(""),
            Err(Error::Insertion(_))
        ));
    }
}
