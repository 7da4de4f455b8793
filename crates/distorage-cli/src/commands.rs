use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use distorage_server::{FileServer, NodeConfig};
use distorage_store::{ContentStore, DiskStore, StoreConfig};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Put(args) => cmd_put(args).await,
        Command::Get(args) => cmd_get(args).await,
        Command::Has(args) => cmd_has(args).await,
        Command::Rm(args) => cmd_rm(args).await,
        Command::Path(args) => cmd_path(args),
        Command::Purge(args) => cmd_purge(args).await,
    }
}

fn open_store(args: &StoreArgs) -> DiskStore {
    DiskStore::new(StoreConfig::new(args.root.clone(), args.transform))
}

/// Config file first, then flag overrides.
fn node_config(args: &ServeArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.transport.listen_addr = listen.clone();
    }
    if let Some(root) = &args.root {
        config.storage.root = root.clone();
    }
    if let Some(transform) = args.transform {
        config.storage.transform = transform;
    }
    if let Some(decoder) = args.decoder {
        config.transport.decoder = decoder;
    }
    if let Some(handshake) = args.handshake {
        config.transport.handshake = handshake;
    }
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = node_config(&args)?;
    let server = Arc::new(FileServer::from_config(&config));
    println!(
        "{} distorage node on {} (root: {}, decoder: {:?}, handshake: {:?})",
        "✓".green().bold(),
        config.transport.listen_addr.bold(),
        config.storage.root.display(),
        config.transport.decoder,
        config.transport.handshake,
    );

    let stopper = Arc::clone(&server);
    let stop_after = args.stop_after.map(Duration::from_secs);
    tokio::spawn(async move {
        shutdown_signal(stop_after).await;
        info!("shutdown requested");
        stopper.stop();
    });

    server
        .start()
        .await
        .with_context(|| format!("node on {} failed", config.transport.listen_addr))?;
    println!("{} node stopped, {} messages received", "✓".green(), server.messages_received());
    Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or once `stop_after` elapses.
async fn shutdown_signal(stop_after: Option<Duration>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let timer = async {
        match stop_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = timer => {}
    }
}

async fn cmd_put(args: PutArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store);
    let written = match &args.file {
        Some(path) => {
            let mut file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            store.write(&args.key, &mut file).await?
        }
        None => {
            let mut stdin = tokio::io::stdin();
            store.write(&args.key, &mut stdin).await?
        }
    };
    println!("{} wrote {} bytes to {}", "✓".green().bold(), written, args.key.yellow());
    Ok(())
}

async fn cmd_get(args: KeyArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store);
    let data = store.read_bytes(&args.key).await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&data).await?;
    stdout.flush().await?;
    Ok(())
}

async fn cmd_has(args: KeyArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store);
    if store.exists(&args.key).await? {
        println!("{} {}", args.key.yellow(), "present".green());
    } else {
        println!("{} {}", args.key.yellow(), "absent".red());
    }
    Ok(())
}

async fn cmd_rm(args: KeyArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store);
    let shard = store
        .resolve(&args.key)
        .shard()
        .unwrap_or_default()
        .to_string();
    store.delete(&args.key).await?;
    println!(
        "{} deleted {} (shard {})",
        "✓".green().bold(),
        args.key.yellow(),
        shard.dimmed()
    );
    Ok(())
}

fn cmd_path(args: KeyArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store);
    println!("{}", store.object_path(&args.key)?.display());
    Ok(())
}

async fn cmd_purge(args: StoreArgs) -> anyhow::Result<()> {
    let store = open_store(&args);
    store.clear().await?;
    println!("{} removed {}", "✓".green().bold(), store.root().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use distorage_p2p::{DecoderKind, HandshakeKind};
    use distorage_store::PathTransform;
    use std::path::PathBuf;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let mut full = vec!["distorage", "serve"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Serve(args) => args,
            _ => panic!("wrong command"),
        }
    }

    fn store_args(root: &std::path::Path) -> StoreArgs {
        StoreArgs {
            root: root.to_path_buf(),
            transform: PathTransform::Cas,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            "[storage]\nroot = \"from_file\"\n[transport]\nlisten_addr = \"127.0.0.1:4000\"\ndecoder = \"structured\"\n",
        )
        .unwrap();

        let args = serve_args(&[
            "--config",
            path.to_str().unwrap(),
            "--listen",
            "127.0.0.1:5000",
            "--handshake",
            "hello",
        ]);
        let config = node_config(&args).unwrap();
        assert_eq!(config.transport.listen_addr, "127.0.0.1:5000");
        assert_eq!(config.storage.root, PathBuf::from("from_file"));
        assert_eq!(config.transport.decoder, DecoderKind::Structured);
        assert_eq!(config.transport.handshake, HandshakeKind::Hello);
    }

    #[test]
    fn no_config_means_defaults() {
        let config = node_config(&serve_args(&[])).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = serve_args(&["--config", "/nonexistent/node.toml"]);
        assert!(node_config(&args).is_err());
    }

    #[tokio::test]
    async fn serve_stops_after_timer() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("net");
        let args = serve_args(&[
            "--listen",
            "127.0.0.1:0",
            "--root",
            root.to_str().unwrap(),
            "--stop-after",
            "0",
        ]);
        tokio::time::timeout(Duration::from_secs(5), cmd_serve(args))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn rm_then_has_then_purge() {
        let dir = tempfile::tempdir().unwrap();
        let args = store_args(&dir.path().join("objects"));
        let store = open_store(&args);
        store.write_bytes("bestpicture", b"oscar").await.unwrap();

        cmd_rm(KeyArgs {
            key: "bestpicture".into(),
            store: args.clone(),
        })
        .await
        .unwrap();
        assert!(!store.exists("bestpicture").await.unwrap());

        let err = cmd_rm(KeyArgs {
            key: "bestpicture".into(),
            store: args.clone(),
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<distorage_store::StoreError>(),
            Some(distorage_store::StoreError::NotFound { .. })
        ));

        store.write_bytes("again", b"x").await.unwrap();
        cmd_purge(args.clone()).await.unwrap();
        assert!(!dir.path().join("objects").exists());
    }

    #[tokio::test]
    async fn put_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("picture.jpg");
        std::fs::write(&input, b"some jpg bytes").unwrap();
        let args = store_args(&dir.path().join("objects"));

        cmd_put(PutArgs {
            key: "my special picture".into(),
            file: Some(input),
            store: args.clone(),
        })
        .await
        .unwrap();
        assert_eq!(
            open_store(&args).read_bytes("my special picture").await.unwrap(),
            b"some jpg bytes"
        );
    }
}
