use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub keystore: KeystoreConfig,
}

/// Parameters for the credential store holding the signing key pair.
///
/// `path` may point at a PKCS#12 store (`.p12`/`.pfx`, unlocked with
/// `password`) or a PEM private key (optionally encrypted, unlocked with
/// `key_password`). When `key_password` is unset the store password is reused.
#[derive(Debug, Clone, Deserialize)]
pub struct KeystoreConfig {
    pub path: String,
    pub password: SecretString,
    pub alias: String,
    #[serde(default)]
    pub key_password: Option<SecretString>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("keystore.path", "config/keystore.p12")?
            .set_default("keystore.password", "changeit")?
            .set_default("keystore.alias", "envelope")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // to avoid variable pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Variables in the format XMLDSIG_KEYSTORE__PATH etc.
            builder = builder.add_source(
                Environment::with_prefix("XMLDSIG")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
