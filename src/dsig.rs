//! Enveloped XML digital signature generation.
//!
//! The pipeline canonicalizes the document (exclusive C14N), digests it over
//! the declared transform chain, canonicalizes and signs the `SignedInfo`
//! block, and finally inserts the assembled `Signature` element into the
//! document root.

mod c14n;
mod error;
mod signer;
mod transforms;
mod types;
mod utils;

pub use c14n::canonicalize;
pub use error::Error;
pub use signer::EnvelopedSigner;
pub use transforms::{apply_transforms, reference_digest};
pub use types::*;
pub use utils::{insert_into_root, strip_signatures};

pub type Result<T> = std::result::Result<T, Error>;

/// Algorithm identifier URIs used in signature descriptors
pub mod algorithms {
    // Digest algorithms
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    // Signature algorithms
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    // Canonicalization algorithms
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    // Transform algorithms
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// XML namespaces
pub mod ns {
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}
