//! One elktail run: settings, tunnel, client, tail.

use std::io;
use std::path::Path;
use std::sync::Arc;

use elk_config::{ConfigStore, Configuration};
use elk_search::{Credentials, ElasticClient, SearchError, Tail, normalize_url};
use elk_tunnel::{SshTunnel, split_local_port};
use tracing::{debug, error, info, trace};
use url::Url;

use crate::cli::Invocation;
use crate::error::CliError;
use crate::prompt;

/// Runs elktail until the listing is done, or forever when following.
///
/// # Errors
///
/// Returns the first fatal error; saved-settings problems are only logged.
pub async fn run(invocation: Invocation) -> Result<(), CliError> {
    let Invocation {
        cli,
        config_flags_given,
    } = invocation;
    let store = settings_store(cli.config_dir.as_deref());
    let mut config = cli.to_configuration();

    if !config_flags_given {
        if let Some(store) = &store {
            load_saved(store, &mut config);
        }
    }

    if config.fetch_all && !config.query_definition.is_date_time_filtered() {
        return Err(CliError::InvalidArgument(
            "--all requires --after and/or --before".to_string(),
        ));
    }

    if config.user.is_some() {
        config.password = Some(prompt::basic_auth_password()?);
    }

    config.search_target.tunnel_url = None;
    if let Some(spec) = config.ssh_tunnel_params.clone() {
        let local_url = start_tunnel(&spec, &config.search_target.url).await?;
        config.search_target.tunnel_url = Some(local_url);
    }

    let to_save = config.apply_query_terms(&cli.query);
    debug!(terms = ?config.query_definition.terms, save = config.save_query, "query terms");

    let url = normalize_url(config.search_target.effective_url());
    let credentials = config.user.clone().map(|user| Credentials {
        user,
        password: config.password.clone(),
    });
    let client = ElasticClient::connect(&url, credentials, config.trace_requests).await?;

    let mut tail = Tail::new(
        client,
        &config.search_target,
        config.query_definition.clone(),
        io::stdout(),
    )
    .await?;

    if let Some(store) = &store {
        save(store, &to_save);
    }

    if config.is_range_extraction() {
        let count = tail.extract_range(config.initial_entries).await?;
        info!(count, "extracted date range");
        return Ok(());
    }
    tail.run(!config.is_list_only(), config.initial_entries)
        .await
        .map_err(CliError::from)
}

fn settings_store(dir: Option<&Path>) -> Option<ConfigStore> {
    match dir {
        Some(dir) => Some(ConfigStore::new(dir)),
        None => match ConfigStore::in_home() {
            Ok(store) => Some(store),
            Err(e) => {
                info!(error = %e, "saved settings unavailable");
                None
            }
        },
    }
}

fn load_saved(store: &ConfigStore, config: &mut Configuration) {
    match store.load_default() {
        Ok(saved) => {
            info!(url = %saved.search_target.url, "loaded previous settings");
            saved.copy_config_relevant_settings_to(config);
            trace!(config = ?config, "merged settings");
        }
        Err(e) => info!(error = %e, "failed to find or open previous default settings"),
    }
}

fn save(store: &ConfigStore, config: &Configuration) {
    if let Err(e) = store.save_default(config) {
        error!(error = %e, path = %store.default_path().display(), "failed to save settings");
    }
}

/// Starts the tunnel in the background and returns the URL that reaches the
/// backend through it.
async fn start_tunnel(spec: &str, url: &str) -> Result<String, CliError> {
    let (local_port, ssh_host) = split_local_port(spec);
    let remote = tunnel_target(url)?;
    let forward = match local_port {
        Some(port) => format!("{port}:{remote}"),
        None => remote,
    };
    trace!(ssh_host, forward = %forward, "tunnel spec");

    let tunnel = Arc::new(SshTunnel::from_host_strings(
        ssh_host,
        &forward,
        prompt::ssh_password,
    )?);
    let listener = tunnel.bind().await?;
    let local_url = tunnel.local_url();
    info!(
        local = %tunnel.local(),
        user = tunnel.user(),
        server = %tunnel.server(),
        remote = %tunnel.remote(),
        "starting ssh tunnel"
    );

    tokio::spawn(async move {
        if let Err(e) = tunnel.serve(listener).await {
            error!(error = %e, "ssh tunnel stopped");
        }
    });
    Ok(local_url)
}

/// Host and port of `url`, as the forward target seen from the SSH server.
fn tunnel_target(url: &str) -> Result<String, CliError> {
    let normalized = normalize_url(url);
    let invalid = |reason: String| SearchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("no host".to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
