//! Operator tooling for the sales service.
//!
//! ```text
//! admin keygen --bits 2048
//! admin tokengen --subject 12345 --roles ADMIN,USER
//! ```
//!
//! `keygen` writes a PKCS#1 private key and the matching SPKI public key,
//! the two files the service reads at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use garrison::auth::{Auth, Claims, KeyRing, ROLE_ADMIN};
use garrison::config::parse_duration;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

const ISSUER: &str = "service project";

#[derive(Parser, Debug)]
#[command(author, version, about = "Sales admin tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an RSA key pair for signing tokens.
    Keygen {
        #[arg(long, default_value = "./private.pem")]
        private_key_file: PathBuf,

        #[arg(long, default_value = "./public.pem")]
        public_key_file: PathBuf,

        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },

    /// Issue a signed token.
    Tokengen {
        #[arg(long, env = "SALES_AUTH_PRIVATE_KEY_FILE", default_value = "./private.pem")]
        private_key_file: PathBuf,

        #[arg(long, env = "SALES_AUTH_KEY_ID", default_value = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1")]
        key_id: String,

        #[arg(long, env = "SALES_AUTH_ALGORITHM", default_value = "RS256")]
        algorithm: String,

        /// Who the token is for.
        #[arg(long, default_value = "123456789")]
        subject: String,

        #[arg(long, value_delimiter = ',', default_value = ROLE_ADMIN)]
        roles: Vec<String>,

        #[arg(long, default_value = "8760h", value_parser = parse_duration)]
        ttl: Duration,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Keygen { private_key_file, public_key_file, bits } => {
            keygen(&private_key_file, &public_key_file, bits)?;
            println!(
                "wrote {} and {}",
                private_key_file.display(),
                public_key_file.display()
            );
        }
        Command::Tokengen { private_key_file, key_id, algorithm, subject, roles, ttl } => {
            let pem = std::fs::read(&private_key_file)
                .with_context(|| format!("reading private key {}", private_key_file.display()))?;
            let key = EncodingKey::from_rsa_pem(&pem).context("parsing private key")?;

            let auth = Auth::new(&algorithm, KeyRing::new())
                .context("constructing auth")?
                .with_signing_key(key_id.clone(), key);

            let claims = Claims::new(ISSUER, &subject, roles, ttl);
            let token = auth.generate_token(&key_id, &claims).context("generating token")?;

            println!("----BEGIN TOKEN----\n{token}\n----END TOKEN----");
        }
    }
    Ok(())
}

fn keygen(private_key_file: &Path, public_key_file: &Path, bits: usize) -> Result<()> {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| anyhow!("generating {bits}-bit key: {e}"))?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| anyhow!("encoding private key: {e}"))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| anyhow!("encoding public key: {e}"))?;

    std::fs::write(private_key_file, private_pem.as_bytes())
        .with_context(|| format!("writing {}", private_key_file.display()))?;
    std::fs::write(public_key_file, public_pem.as_bytes())
        .with_context(|| format!("writing {}", public_key_file.display()))?;
    Ok(())
}
