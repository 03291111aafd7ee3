//! Data model for the `Signature` element tree.
//!
//! Serialized with `quick_xml::se`; element names follow the XML-signature
//! schema. The structs are transient, scoped to one signing invocation.

use serde::{Deserialize, Serialize};

/// Generic element carrying only an `Algorithm` attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmElement {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

impl AlgorithmElement {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            algorithm: uri.into(),
        }
    }
}

pub type CanonicalizationMethod = AlgorithmElement;
pub type SignatureMethod = AlgorithmElement;
pub type DigestMethod = AlgorithmElement;
pub type Transform = AlgorithmElement;

/// Ordered transform chain of a reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transforms {
    #[serde(rename = "Transform", default)]
    pub transform: Vec<Transform>,
}

/// Descriptor of a signed node-set: URI, transforms, digest method and the
/// computed digest. Immutable once digested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Empty URI means "the whole document minus the enveloped signature"
    #[serde(rename = "@URI")]
    pub uri: String,

    #[serde(rename = "Transforms")]
    pub transforms: Transforms,

    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,

    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

/// The structured block whose canonical form is the input to the signature
/// algorithm.
///
/// `xmlns` is set when SignedInfo is serialized standalone for digesting and
/// left out when nested under `Signature`, which already declares the
/// namespace. Exclusive C14N renders the declaration identically either way.
#[derive(Debug, Clone, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "@xmlns", skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,

    #[serde(rename = "CanonicalizationMethod")]
    pub canonicalization_method: CanonicalizationMethod,

    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,

    #[serde(rename = "Reference")]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureValue {
    #[serde(rename = "$text")]
    pub value: String,
}

/// RSA public key components, base64-encoded big-endian magnitudes
#[derive(Debug, Clone, Serialize)]
pub struct RsaKeyValue {
    #[serde(rename = "Modulus")]
    pub modulus: String,
    #[serde(rename = "Exponent")]
    pub exponent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyValue {
    #[serde(rename = "RSAKeyValue")]
    pub rsa_key_value: RsaKeyValue,
}

/// Embedded key material so a verifier needs no out-of-band key distribution
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "KeyValue")]
    pub key_value: KeyValue,
}

/// Complete `Signature` element
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,

    #[serde(rename = "SignatureValue")]
    pub signature_value: SignatureValue,

    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}
