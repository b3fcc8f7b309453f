//! ML-DSA-65 key and envelope tool for appointment providers.
//!
//! Usage:
//!   provider-keygen generate [output-dir]
//!   provider-keygen sign --key-dir DIR --encrypted-data HEX [--code HEX]
//!   provider-keygen submit --key-dir DIR --addr HOST:PORT --tls-cert ... --encrypted-data HEX

use appointments_node::client::SubmissionClient;
use appointments_node::config::TlsSettings;
use appointments_node::provider::signature::generate_keypair;
use appointments_node::provider::{ProviderId, SignedSubmission, SubmissionData};
use appointments_node::tls::TlsClient;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const SECRET_KEY_FILE: &str = "provider-signing-key.secret";
const PUBLIC_KEY_FILE: &str = "provider-signing-key.pub";

/// Provider key management and signed submissions.
#[derive(Parser, Debug)]
#[command(name = "provider-keygen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new provider key pair.
    Generate {
        /// Directory to write the key files to.
        output_dir: Option<PathBuf>,
    },
    /// Print a signed submission envelope as JSON.
    Sign(Payload),
    /// Sign a submission and send it to a node.
    Submit {
        #[command(flatten)]
        payload: Payload,

        /// Node submission address.
        #[arg(long, env = "APPOINTMENTS_NODE_ADDR")]
        addr: SocketAddr,

        /// Name the node certificate must carry.
        #[arg(long, default_value = "localhost")]
        server_name: String,

        /// Client certificate chain (PEM).
        #[arg(long, env = "APPOINTMENTS_TLS_CERT")]
        tls_cert: PathBuf,

        /// Client private key (PEM).
        #[arg(long, env = "APPOINTMENTS_TLS_KEY")]
        tls_key: PathBuf,

        /// CA bundle for the node certificate (PEM).
        #[arg(long, env = "APPOINTMENTS_TLS_CA")]
        tls_ca: PathBuf,
    },
}

#[derive(Args, Debug)]
struct Payload {
    /// Directory holding the key files.
    #[arg(long, default_value = ".")]
    key_dir: PathBuf,

    /// Provider data ciphertext (hex).
    #[arg(long)]
    encrypted_data: String,

    /// Invitation code (hex).
    #[arg(long)]
    code: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    match Cli::parse().command {
        Command::Generate { output_dir } => {
            let output_dir = match output_dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            generate(&output_dir)
        }
        Command::Sign(payload) => {
            let submission = payload.sign()?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
            Ok(())
        }
        Command::Submit {
            payload,
            addr,
            server_name,
            tls_cert,
            tls_key,
            tls_ca,
        } => {
            let submission = payload.sign()?;
            let tls = TlsClient::new(
                &TlsSettings {
                    certificate_file: tls_cert,
                    key_file: tls_key,
                    ca_certificate_file: tls_ca,
                },
                &server_name,
            )?;

            let mut client = SubmissionClient::connect(&tls, addr).await?;
            let response = client.submit(&submission).await?;
            println!("{} {}", response.status, response.message);
            if response.is_ok() {
                Ok(())
            } else {
                Err(eyre!("submission rejected with status {}", response.status))
            }
        }
    }
}

fn generate(output_dir: &Path) -> color_eyre::Result<()> {
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create {}", output_dir.display()))?;

    println!("Generating ML-DSA-65 keypair...");
    let (public_key, secret_key) = generate_keypair()?;

    println!("  Public key size: {} bytes", public_key.len());
    println!("  Secret key size: {} bytes", secret_key.len());

    let sk_path = output_dir.join(SECRET_KEY_FILE);
    fs::write(&sk_path, &secret_key)?;
    println!("\nSecret key saved to: {}", sk_path.display());
    println!("  WARNING: Keep this file secure! It signs all of your provider data.");

    let pk_path = output_dir.join(PUBLIC_KEY_FILE);
    fs::write(&pk_path, &public_key)?;
    println!("Public key saved to: {}", pk_path.display());

    println!(
        "\nProvider identity: {}",
        ProviderId::from_public_key(&public_key)
    );
    Ok(())
}

impl Payload {
    fn sign(&self) -> color_eyre::Result<SignedSubmission> {
        let public_key = fs::read(self.key_dir.join(PUBLIC_KEY_FILE))
            .wrap_err("Failed to read public key")?;
        let secret_key = fs::read(self.key_dir.join(SECRET_KEY_FILE))
            .wrap_err("Failed to read secret key")?;

        let data = SubmissionData {
            timestamp: chrono::Utc::now().timestamp(),
            code: self
                .code
                .as_deref()
                .map(hex::decode)
                .transpose()
                .wrap_err("Invalid code")?,
            encrypted_data: hex::decode(&self.encrypted_data).wrap_err("Invalid encrypted data")?,
        };

        Ok(SignedSubmission::sign(&data, &public_key, &secret_key)?)
    }
}
