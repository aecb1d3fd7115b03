//! VPN PKI command-line tool
//!
//! Runs the setup phase and hands out PKI material from a store directory:
//!
//! ```bash
//! vpn-pki setup                          # CA, server cert, ta.key, dh.pem
//! vpn-pki ca-cert                        # print ca.crt
//! vpn-pki server-files --out /etc/openvpn/server
//! vpn-pki client alice_laptop --out clients
//! vpn-pki inspect clients/alice_laptop.crt
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (e.g. `RUST_LOG=vpn_pki=debug`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;
use vpn_pki::{Artifact, CertificateInfo, PkiConfig, PkiManager};

#[derive(Parser)]
#[command(name = "vpn-pki", version, about = "Private CA and OpenVPN PKI material manager")]
struct Cli {
    /// Configuration file; built-in defaults are used if it does not exist
    #[arg(long, global = true, env = "VPN_PKI_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Store directory, overriding `[store] directory`
    #[arg(long, global = true, env = "VPN_PKI_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create all missing material, including DH parameters
    Setup,
    /// Print the CA certificate
    CaCert,
    /// Print the OpenVPN static key
    TaKey,
    /// Print the server bundle as JSON, or write it into a directory
    ServerFiles {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Issue a client certificate
    Client {
        /// Becomes the certificate's common name
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize a PEM certificate
    Inspect { pem: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let open_manager = || -> Result<PkiManager> {
        let config = load_config(&cli.config, cli.store.as_deref())?;
        PkiManager::from_config(config).context("Failed to open PKI store")
    };

    match &cli.command {
        Command::Setup => {
            let manager = open_manager()?;
            manager.setup().context("PKI setup failed")?;
            let store = manager.store();
            for artifact in Artifact::ALL {
                if store.exists(artifact) {
                    println!("✓ {}", artifact);
                } else {
                    println!("✗ {}", artifact);
                }
            }
            println!(
                "✓ PKI ready in '{}'",
                manager.config().store.directory.display()
            );
        }
        Command::CaCert => {
            let pem = open_manager()?
                .get_ca_certificate()
                .context("Failed to get CA certificate")?;
            print!("{}", pem);
        }
        Command::TaKey => {
            let armored = open_manager()?
                .get_ta_key()
                .context("Failed to get static key")?;
            print!("{}", armored);
        }
        Command::ServerFiles { out } => {
            let files = open_manager()?
                .get_server_files()
                .context("Failed to collect server files")?;
            match out {
                Some(dir) => {
                    fs::create_dir_all(dir)?;
                    for (artifact, contents) in files.entries() {
                        let path = dir.join(artifact.file_name());
                        write_file(&path, contents, artifact.is_secret())?;
                        println!("✓ {} written", artifact);
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&files)?),
            }
        }
        Command::Client { id, out } => {
            if out.is_some() {
                client_file_stem(id)?;
            }
            let (cert_pem, key_pem) = open_manager()?
                .generate_client_certificate(id)
                .with_context(|| format!("Failed to issue client certificate for '{}'", id))?;
            match out {
                Some(dir) => {
                    fs::create_dir_all(dir)?;
                    let cert_path = dir.join(format!("{}.crt", id));
                    let key_path = dir.join(format!("{}.key", id));
                    write_file(&cert_path, &cert_pem, false)?;
                    write_file(&key_path, key_pem.expose_secret(), true)?;
                    println!("✓ Client certificate written to '{}'", cert_path.display());
                    println!("✓ Client key written to '{}'", key_path.display());
                }
                None => {
                    print!("{}", cert_pem);
                    print!("{}", key_pem.expose_secret());
                }
            }
        }
        Command::Inspect { pem } => {
            let bytes =
                fs::read(pem).with_context(|| format!("Failed to read '{}'", pem.display()))?;
            let info =
                CertificateInfo::from_pem(&bytes).context("Failed to inspect certificate")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

fn load_config(path: &Path, store_override: Option<&Path>) -> Result<PkiConfig> {
    let config = if path.exists() {
        PkiConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        PkiConfig::default()
    };
    Ok(match store_override {
        Some(dir) => config.with_store_directory(dir),
        None => config,
    })
}

/// A client identifier used as a file name must stay inside the output directory.
fn client_file_stem(id: &str) -> Result<&str> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None)
            if name == id && !id.contains(['/', '\\']) =>
        {
            Ok(id)
        }
        _ => bail!(
            "client identifier '{}' cannot be used as a file name with --out",
            id
        ),
    }
}

/// Replace `path` atomically, forcing the mode even when the file already exists.
fn write_file(path: &Path, contents: &str, secret: bool) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in '{}'", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if secret { 0o600 } else { 0o644 };
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = secret;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace '{}'", path.display()))?;
    Ok(())
}
