//! Command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use authrelay_core::{
    BareClient, Credential, HttpRenewer, RelayClient, RelayConfig, Response, SessionState,
    SessionStore,
};
use clap::ValueEnum;
use reqwest::Method;
use serde::Serialize;

/// Output format for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Authenticated client plus the session it reads from.
pub struct Session {
    pub client: RelayClient,
    pub store: Arc<SessionStore<HttpRenewer>>,
}

/// Build an authenticated client from the credential in the environment.
pub fn connect(config: &RelayConfig) -> Result<Session> {
    let credential = Credential::from_env(&config.env_prefix).with_context(|| {
        format!(
            "no credential found; set {}_ACCESS_TOKEN (and {}_REFRESH_TOKEN)",
            config.env_prefix, config.env_prefix
        )
    })?;

    let renewer = HttpRenewer::from_config(config)
        .with_context(|| format!("invalid refresh_url {:?}", config.refresh_url))?;

    let store = Arc::new(SessionStore::with_credential(credential, renewer));
    let client = RelayClient::new(config.clone(), Arc::clone(&store));

    Ok(Session { client, store })
}

/// Send one request, authenticated unless `bare` is set.
pub async fn send_request(
    config: &RelayConfig,
    method: Method,
    path: &str,
    data: Option<&str>,
    bare: bool,
) -> Result<Response> {
    let body = data
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("request body is not valid JSON")?;

    if bare {
        let client = BareClient::new(config.clone());
        let mut descriptor = client.request(method, path)?;
        if let Some(body) = &body {
            descriptor = descriptor.with_json(body)?;
        }
        return Ok(client.execute(descriptor).await?);
    }

    let session = connect(config)?;
    let mut descriptor = session.client.request(method, path)?;
    if let Some(body) = &body {
        descriptor = descriptor.with_json(body)?;
    }
    Ok(session.client.execute(descriptor).await?)
}

/// Summary of a burst of concurrent requests.
#[derive(Debug, Serialize)]
pub struct BurstReport {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<String>,
    pub session: String,
}

/// Fire `count` concurrent GETs at `path` through one client.
///
/// Useful for checking that a round of expired credentials causes a single
/// renewal on the server side.
pub async fn burst(config: &RelayConfig, path: &str, count: usize) -> Result<BurstReport> {
    let session = connect(config)?;

    let requests = (0..count).map(|_| session.client.get(path));
    let results = futures::future::join_all(requests).await;

    let mut report = BurstReport {
        succeeded: 0,
        failed: 0,
        outcomes: Vec::with_capacity(count),
        session: String::new(),
    };
    for result in results {
        match result {
            Ok(response) => {
                report.succeeded += 1;
                report.outcomes.push(response.status().to_string());
            }
            Err(e) => {
                report.failed += 1;
                report.outcomes.push(e.to_string());
            }
        }
    }
    report.session = session_label(session.store.state()).to_string();

    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "burst finished"
    );
    Ok(report)
}

fn session_label(state: SessionState) -> &'static str {
    match state {
        SessionState::SignedOut => "signed-out",
        SessionState::Active => "active",
        SessionState::Invalidated => "invalidated",
    }
}

/// Render a response for the terminal.
pub fn render_response(response: &Response, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{}\n{}", response.status(), response.text())),
        OutputFormat::Json => {
            let body = response
                .json::<serde_json::Value>()
                .unwrap_or_else(|_| serde_json::Value::String(response.text()));
            let rendered = serde_json::json!({
                "status": response.status().as_u16(),
                "url": response.url().as_str(),
                "body": body,
            });
            Ok(serde_json::to_string_pretty(&rendered)?)
        }
    }
}

/// Render the effective configuration as TOML.
pub fn render_config(config: &RelayConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to serialize configuration")
}
