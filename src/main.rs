use std::sync::Arc;

use kverso::config::{HooksConfig, Settings};
use kverso::conversion::{WebhookManager, WebhookServiceSettings};
use kverso::hook::{CommandExecutor, HookManager};
use kverso::server::{
    build_rustls_config, create_metrics, initialize_tls, run_server, run_server_tls, Converter,
    ReadinessState, ServerState,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env();
    info!(
        config = %settings.config_path.display(),
        port = settings.listen_port,
        tls = settings.tls_enabled,
        "Starting kverso conversion webhook"
    );

    let hooks_config = match HooksConfig::from_file(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load hooks configuration");
            return Err(e.into());
        }
    };

    let readiness = ReadinessState::new();
    let metrics = create_metrics()?;

    // Bindings register their webhooks while hooks are initialized.
    let webhook_manager = Arc::new(WebhookManager::new(WebhookServiceSettings {
        namespace: settings.namespace.clone(),
        service_name: settings.service_name.clone(),
    }));
    let hook_manager = HookManager::init(&hooks_config, webhook_manager.clone());
    info!(
        hooks = hook_manager.hook_names().len(),
        crds = ?webhook_manager.crd_names(),
        "Hooks initialized"
    );

    let executor = Arc::new(CommandExecutor::new(settings.hook_tmp_dir.clone()));
    let converter = Arc::new(Converter::new(hook_manager, executor));
    let state = ServerState::new(readiness.clone(), metrics, converter);

    let server = if settings.tls_enabled {
        let client = kube::Client::try_default().await?;
        info!("Connected to Kubernetes cluster");

        let bundle = initialize_tls(
            &client,
            &settings.service_name,
            &settings.namespace,
            &settings.tls_secret_name,
        )
        .await
        .map_err(|e| anyhow::anyhow!("TLS init error: {}", e))?;

        // A CRD that does not exist yet is not fatal: the webhook still serves the others.
        let ca_bundle = bundle.ca_bundle_base64()?;
        if let Err(e) = webhook_manager.update_crds(&client, &ca_bundle).await {
            warn!(error = %e, "Failed to configure conversion on some CRDs");
        }

        let tls_config = build_rustls_config(&bundle)?;
        let port = settings.listen_port;
        tokio::spawn(async move { run_server_tls(port, state, tls_config).await })
    } else {
        info!("Webhook TLS disabled - running HTTP only");
        let port = settings.listen_port;
        tokio::spawn(async move { run_server(port, state).await })
    };

    readiness.set_ready();
    info!("Conversion webhook ready");

    match server.await {
        Ok(Ok(())) => {
            info!("kverso shut down gracefully");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Server failed");
            Err(e.into())
        }
        Err(e) => Err(anyhow::anyhow!("Server task failed: {}", e)),
    }
}
