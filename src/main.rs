use std::fs;
use std::io::Write as _;

use color_eyre::eyre::eyre;
use xmldsig_signer::{config::Config, dsig::EnvelopedSigner, keystore, telemetry};

//
// Synopsis: xmldsig-signer <document> [output]
//
// "document" is the XML file to be signed; "output" is where the signed
// document is written. Without an output argument the result goes to
// standard output. Keystore parameters come from config/settings and
// XMLDSIG_-prefixed environment variables.
//
fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or_else(|| eyre!("Usage: xmldsig-signer <document> [output]"))?;
    let output = args.next();

    let config = Config::load()?;
    let key_pair = keystore::load_key_pair(&config.keystore)?;

    let document = fs::read_to_string(&input)?;
    tracing::info!(input = %input, "Signing document");

    let signer = EnvelopedSigner::new(&key_pair);
    let signed = signer.sign_enveloped(&document)?;

    match output {
        Some(path) => {
            fs::write(&path, &signed)?;
            tracing::info!(output = %path, "Wrote signed document");
        }
        None => std::io::stdout().write_all(signed.as_bytes())?,
    }
    Ok(())
}
