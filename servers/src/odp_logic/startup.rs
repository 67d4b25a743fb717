use std::sync::Arc;

use anyhow::{Context, Result};
use lib_odp::loggers::setup_logging;
use lib_odp::relay::{show_devices, DockerSocket, ProcessRunner, Trigger};
use lib_odp::{OdpConfig, PushbulletClient, RelayService};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use super::cli::CommonArgs;

/// Everything a relay binary needs once startup is done.
pub struct Relay {
    pub config: OdpConfig,
    pub service: RelayService,
}

/// Loads `.env`, logging and config, then resolves our device.
///
/// Returns `None` when `--show-devices` was handled and the process should exit.
pub async fn prepare(app_name: &str, args: &CommonArgs) -> Result<Option<Relay>> {
    dotenvy::dotenv().ok();

    if let Some(path) = setup_logging(app_name, args.debug, args.log_dir.as_deref())? {
        log::info!("Logging to {}", path.display());
    }

    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let source = args.config_source();
    let config = OdpConfig::load(&source).with_context(|| format!("Failed to load configuration from {}", source))?;
    log::info!(
        "Loaded {} commands and {} authorised source devices",
        config.commands.len(),
        config.authorised_src_idens.len()
    );

    let client = Arc::new(PushbulletClient::new(&config.api_key).context("Failed to build Pushbullet client")?);

    if args.show_devices {
        let count = show_devices(client.as_ref(), &mut std::io::stdout())
            .await
            .context("Failed to list devices")?;
        log::info!("{} devices listed.", count);
        return Ok(None);
    }

    let service = RelayService::bootstrap(
        &config,
        client,
        Arc::new(ProcessRunner),
        Arc::new(DockerSocket::default()),
    )
    .await
    .context("Failed to set up the ODP device")?;
    log::info!("Relaying as device '{}' ({})", service.device().name(), service.device().iden);

    Ok(Some(Relay { config, service }))
}

/// Drives `trigger` until Ctrl-C/SIGTERM or until it fails.
pub async fn run_until_shutdown(trigger: &mut dyn Trigger, service: &RelayService) -> Result<()> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    let name = trigger.name();
    log::info!("Starting {} trigger.", name);
    trigger
        .run(service, shutdown)
        .await
        .with_context(|| format!("{} trigger stopped", name))?;

    log::info!("Shutdown complete.");
    Ok(())
}

async fn wait_for_signal() {
    let terminate = async {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut term_signal) => {
                    term_signal.recv().await;
                    log::info!("SIGTERM received, initiating shutdown.");
                }
                Err(e) => {
                    log::warn!("Could not listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            // On non-unix platforms, just wait forever.
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = terminate => {}
    }
}
