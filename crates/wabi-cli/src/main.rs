// wabi-pair: link a WhatsApp account from the terminal.
//
//   wabi-pair pair --qr-out qr.png   request a code, save it, wait for the scan
//   wabi-pair status                 one-shot link check

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wabi_pairing::engine::pairing::{default_config_path, load_config};
use wabi_pairing::{monitor_from_config, PairingConfig, PairingError, PairingImage, PairingOutcome};

#[derive(Parser)]
#[command(name = "wabi-pair", version, about = "Link a WhatsApp account to Wabi by QR code")]
struct Cli {
    /// Config file (default: <config dir>/wabi/pairing.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true, env = "WABI_API_URL")]
    api_url: Option<String>,

    /// Bearer credential from the sign-in flow
    #[arg(long, global = true, env = "WABI_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a pairing code and wait until the phone has scanned it
    Pair {
        /// Where to write the decoded QR image
        #[arg(long, default_value = "wabi-qr.png")]
        qr_out: PathBuf,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Check once whether the account is linked
    Status {
        /// Print the shared link state as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Pair { qr_out, timeout_secs } => pair(&config, qr_out, Duration::from_secs(timeout_secs)).await,
        Command::Status { json } => status(&config, json).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<PairingConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_config(&path).with_context(|| format!("loading {}", path.display()))?,
        None => PairingConfig::default(),
    };
    // clap already folded WABI_API_URL / WABI_TOKEN into the flags.
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn pair(config: &PairingConfig, qr_out: PathBuf, timeout: Duration) -> Result<()> {
    let monitor = monitor_from_config(config)?;

    let session = match monitor.request_pairing_code().await {
        Ok(PairingOutcome::AlreadyConnected { instance_key }) => {
            println!("Already connected{}", instance_key.map(|k| format!(" (instance {})", k)).unwrap_or_default());
            return Ok(());
        }
        Ok(PairingOutcome::AwaitingScan(session)) => session,
        Err(PairingError::CredentialMissing) => bail!("not signed in: pass --token or set WABI_TOKEN"),
        Err(e) => return Err(e.into()),
    };

    match &session.pairing_image {
        Some(PairingImage::Url(url)) => println!("Open this QR code and scan it: {}", url),
        Some(image) => match image.decode() {
            Ok(bytes) => {
                let path = qr_path(&qr_out, image);
                std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
                println!("QR code written to {}", path.display());
            }
            Err(e) => {
                warn!("[cli] Could not decode pairing image: {}", e);
                println!("Pairing code: {}", image.as_str());
            }
        },
        None => bail!("backend returned no pairing image"),
    }
    println!("Open WhatsApp on your phone → Linked Devices → Link a Device");

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    monitor.start_polling(move |s| {
        let _ = done_tx.send(s.instance_key.clone());
    });

    let result = tokio::time::timeout(timeout, done_rx).await;
    monitor.close();
    match result {
        Ok(Ok(instance_key)) => {
            info!("[cli] Linked instance '{}'", instance_key);
            println!("WhatsApp connected");
            Ok(())
        }
        Ok(Err(_)) => bail!("pairing monitor closed before the account was linked"),
        Err(_) => bail!("timed out after {}s waiting for the scan", timeout.as_secs()),
    }
}

/// `--qr-out` with its extension matched to the image type the backend declared.
fn qr_path(qr_out: &Path, image: &PairingImage) -> PathBuf {
    match image.file_extension() {
        Some(ext) if qr_out.extension().and_then(|e| e.to_str()) != Some(ext) => qr_out.with_extension(ext),
        _ => qr_out.to_path_buf(),
    }
}

async fn status(config: &PairingConfig, json: bool) -> Result<()> {
    let monitor = monitor_from_config(config)?;
    if monitor.app_session().credential().is_none() {
        bail!("not signed in: pass --token or set WABI_TOKEN");
    }
    let connected = monitor.check_status().await;
    monitor.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&monitor.app_session().link_state())?);
    } else if connected {
        println!("connected");
    } else {
        println!("not connected");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("pairing.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn file_values_apply_without_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "api_url = \"http://file:1\"\ntoken = \"file-token\"\npoll_interval_secs = 12\n");
        let mut cli = parse(&["wabi-pair", "--config", path.to_str().unwrap(), "status"]);
        cli.api_url = None;
        cli.token = None;

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.api_url, "http://file:1");
        assert_eq!(config.token.as_deref(), Some("file-token"));
        assert_eq!(config.poll_interval_secs, 12);
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "api_url = \"http://file:1\"\ntoken = \"file-token\"\npoll_interval_secs = 12\n");
        let cli = parse(&[
            "wabi-pair",
            "--config",
            path.to_str().unwrap(),
            "--api-url",
            "http://flag:2",
            "--token",
            "flag-token",
            "pair",
        ]);

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.api_url, "http://flag:2");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.poll_interval_secs, 12);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        let cli = parse(&["wabi-pair", "--config", path.to_str().unwrap(), "--api-url", "ftp://x", "status"]);
        assert!(resolve_config(&cli).is_err());
    }

    #[test]
    fn pair_defaults() {
        let cli = parse(&["wabi-pair", "pair"]);
        match cli.command {
            Command::Pair { qr_out, timeout_secs } => {
                assert_eq!(qr_out, PathBuf::from("wabi-qr.png"));
                assert_eq!(timeout_secs, 300);
            }
            Command::Status { .. } => panic!("expected pair"),
        }
    }

    #[test]
    fn qr_path_follows_image_type() {
        let out = Path::new("wabi-qr.png");
        let jpeg = PairingImage::from_backend("data:image/jpeg;base64,AAAA");
        assert_eq!(qr_path(out, &jpeg), PathBuf::from("wabi-qr.jpg"));
        let png = PairingImage::from_backend("data:image/png;base64,AAAA");
        assert_eq!(qr_path(out, &png), PathBuf::from("wabi-qr.png"));
        let unknown = PairingImage::from_backend("data:application/octet-stream;base64,AAAA");
        assert_eq!(qr_path(out, &unknown), PathBuf::from("wabi-qr.png"));
    }
}
