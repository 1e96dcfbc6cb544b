//! Webhook listener: one POST route at the configured endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::post,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bot::Enqueue;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::normalizer::EventHandler;
use crate::webhook::{self, SIGNATURE_HEADER};

#[derive(Clone)]
pub struct ListenerState {
    pub config: Arc<Config>,
    pub handler: Arc<dyn EventHandler>,
    pub enqueue: Arc<dyn Enqueue>,
    pub cancel: CancellationToken,
}

/// Check that `path` can be mounted as a literal route.
pub fn validate_callback_path(path: &str) -> Result<()> {
    let reason = if !path.starts_with('/') {
        Some("must start with '/'")
    } else if path.contains(['{', '}']) {
        Some("must not contain route captures")
    } else if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        Some("segments must not start with ':' or '*'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidCallbackPath {
            path: path.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn router(state: ListenerState) -> Router {
    let endpoint = state.config.endpoint.clone();
    Router::new()
        .route(&endpoint, post(handle_callback))
        .with_state(state)
}

async fn handle_callback(
    State(state): State<ListenerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match webhook::parse_request(&state.config.channel_secret, &body, signature) {
        Ok(events) => {
            state
                .handler
                .handle(&state.cancel, &state.config, events, state.enqueue.as_ref());
            StatusCode::OK
        }
        Err(e) => {
            error!(
                "Error on request parsing and/or signature validation. error: {}. request: {}",
                e,
                dump_request(&method, &uri, &headers, &body)
            );
            match e {
                Error::InvalidSignature => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }
}

fn dump_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> String {
    let mut dump = format!("{} {}\n", method, uri);
    for (name, value) in headers {
        dump.push_str(&format!(
            "{}: {}\n",
            name,
            value.to_str().unwrap_or("<binary>")
        ));
    }
    dump.push('\n');
    dump.push_str(&String::from_utf8_lossy(body));
    dump
}

/// Serve the webhook endpoint until `state.cancel` fires.
///
/// Uses HTTPS when TLS material is configured, plain HTTP otherwise.
pub async fn listen(state: ListenerState) -> Result<()> {
    let config = Arc::clone(&state.config);
    let cancel = state.cancel.clone();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(state);

    match &config.tls {
        None => {
            let listener = TcpListener::bind(addr).await.map_err(Error::Listen)?;
            info!("Listening on http://{}{}", addr, config.endpoint);
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
                .map_err(Error::Listen)
        }
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                .await
                .map_err(Error::Tls)?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
            });

            info!("Listening on https://{}{}", addr, config.endpoint);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(Error::Listen)
        }
    }
}
