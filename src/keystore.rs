//! Key provider: loads the signing key pair from a credential store.
//!
//! Two store formats are supported, selected by file extension:
//! PKCS#12 (`.p12`/`.pfx` — store password unlocks the bundle, the alias is
//! checked against the bundled certificate's friendly name when one is set)
//! and PEM private keys (`.pem`/`.key`, optionally encrypted with the key
//! password). Any failure here surfaces before the signing pipeline starts.

use std::fs;
use std::path::Path;

use openssl::pkcs12::Pkcs12;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use crate::config::KeystoreConfig;
use crate::crypto::rsa::{RsaKeyPair, RsaPrivateKey};

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Failed to read keystore {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid PEM content: {0}")]
    Pem(#[from] pem::PemError),

    #[error("Unexpected PEM tag '{0}', expected a private key")]
    UnexpectedPemTag(String),

    #[error("Keystore could not be opened (bad credential or corrupt store): {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("Keystore contains no private key")]
    MissingKey,

    #[error("Key alias mismatch: store holds '{found}', requested '{requested}'")]
    AliasMismatch { requested: String, found: String },

    #[error("Unsupported keystore format: {0}")]
    UnsupportedFormat(String),

    #[error("Key material unusable for signing: {0}")]
    Key(#[from] crate::crypto::Error),
}

/// PEM tags accepted for private key material
const PRIVATE_KEY_TAGS: &[&str] = &[
    "PRIVATE KEY",
    "RSA PRIVATE KEY",
    "EC PRIVATE KEY",
    "ENCRYPTED PRIVATE KEY",
];

/// Load the signing key pair described by the keystore configuration.
pub fn load_key_pair(config: &KeystoreConfig) -> Result<RsaKeyPair, KeyStoreError> {
    let path = Path::new(&config.path);
    let data = fs::read(path).map_err(|source| KeyStoreError::Io {
        path: config.path.clone(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let private_key = match extension.as_str() {
        "p12" | "pfx" => load_pkcs12(&data, config)?,
        "pem" | "key" => load_pem(&data, config)?,
        other => return Err(KeyStoreError::UnsupportedFormat(other.to_string())),
    };

    info!(path = %config.path, alias = %config.alias, "Loaded signing key pair");
    Ok(RsaKeyPair::from_private_key(private_key)?)
}

fn load_pkcs12(data: &[u8], config: &KeystoreConfig) -> Result<RsaPrivateKey, KeyStoreError> {
    let parsed = Pkcs12::from_der(data)?.parse2(config.password.expose_secret())?;

    // PKCS#12 friendly names map to the keystore alias; stores written
    // without one are accepted as single-identity bundles.
    if let Some(cert) = &parsed.cert
        && let Some(alias) = cert.alias()
        && alias != config.alias.as_bytes()
    {
        return Err(KeyStoreError::AliasMismatch {
            requested: config.alias.clone(),
            found: String::from_utf8_lossy(alias).into_owned(),
        });
    }

    let pkey = parsed.pkey.ok_or(KeyStoreError::MissingKey)?;
    Ok(RsaPrivateKey::from_pkey(pkey)?)
}

fn load_pem(data: &[u8], config: &KeystoreConfig) -> Result<RsaPrivateKey, KeyStoreError> {
    let parsed = pem::parse(data)?;
    if !PRIVATE_KEY_TAGS.contains(&parsed.tag()) {
        return Err(KeyStoreError::UnexpectedPemTag(parsed.tag().to_string()));
    }

    let key_password = config
        .key_password
        .as_ref()
        .unwrap_or(&config.password);

    let key = if parsed.tag() == "ENCRYPTED PRIVATE KEY" {
        RsaPrivateKey::from_pem_passphrase(data, key_password.expose_secret().as_bytes())?
    } else {
        RsaPrivateKey::from_pem(data)?
    };
    Ok(key)
}
