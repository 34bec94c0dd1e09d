//! HTTP server for receiving webhook deliveries.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use warp::http::StatusCode;
use warp::Filter;

use crate::error::{Result, WebhookError};
use crate::router::{WebhookPayload, WebhookRouter};

pub const HOUSEHOLD_HEADER: &str = "x-sonos-household-id";
pub const TARGET_HEADER: &str = "x-sonos-target-value";
pub const NAMESPACE_HEADER: &str = "x-sonos-namespace";
pub const TYPE_HEADER: &str = "x-sonos-type";

/// HTTP webhook receiver.
///
/// Binds the first free port of a range and accepts `POST` on any path.
/// Each port is bound once; the bound listener is the one that serves.
/// Deliveries must carry the household and target headers and a JSON body;
/// accepted deliveries are handed to the [`WebhookRouter`].
///
/// | condition                          | status |
/// |------------------------------------|--------|
/// | household or target header missing | 400   |
/// | body is not JSON                    | 400   |
/// | household not registered            | 404   |
/// | routed                              | 200   |
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, WebhookPayload};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<WebhookPayload>();
///     let server = CallbackServer::new((3400, 3500), tx).await.unwrap();
///     server.router().register("Sonos_abc").await;
///
///     while let Some(delivery) = rx.recv().await {
///         println!("{} -> {}", delivery.household_id, delivery.target_value);
///     }
/// }
/// ```
pub struct CallbackServer {
    port: u16,
    base_url: String,
    router: Arc<WebhookRouter>,
    shutdown: Arc<Notify>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

/// Request failed header or body validation
#[derive(Debug)]
struct BadDelivery(&'static str);

impl warp::reject::Reject for BadDelivery {}

/// Household not registered with the router
#[derive(Debug)]
struct UnknownHousehold;

impl warp::reject::Reject for UnknownHousehold {}

impl CallbackServer {
    /// Create and start the server.
    ///
    /// The base URL uses the local IP address that outbound traffic leaves
    /// from; use [`CallbackServer::with_host`] when the receiver sits behind
    /// a proxy or port forward.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<WebhookPayload>,
    ) -> Result<Self> {
        let local_ip = Self::detect_local_ip().ok_or(WebhookError::LocalIpUnavailable)?;
        Self::with_host(port_range, &local_ip.to_string(), event_sender).await
    }

    /// Create and start the server, advertising `host` in the base URL.
    pub async fn with_host(
        port_range: (u16, u16),
        host: &str,
        event_sender: mpsc::UnboundedSender<WebhookPayload>,
    ) -> Result<Self> {
        let router = Arc::new(WebhookRouter::new(event_sender));
        let shutdown = Arc::new(Notify::new());
        let (port, server_handle) = Self::start_server(port_range, router.clone(), shutdown.clone())?;

        Ok(Self {
            port,
            base_url: format!("http://{host}:{port}"),
            router,
            shutdown,
            server_handle: Some(server_handle),
        })
    }

    /// URL to register with the cloud as the webhook target
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Router controlling which households are accepted
    pub fn router(&self) -> &Arc<WebhookRouter> {
        &self.router
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        // Stored as a permit if the server has not started waiting yet
        self.shutdown.notify_one();

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Local IP used for outbound connections. No data is sent.
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }

    /// Bind the first free port of the range and spawn the server on it
    fn start_server(
        (start, end): (u16, u16),
        router: Arc<WebhookRouter>,
        shutdown: Arc<Notify>,
    ) -> Result<(u16, tokio::task::JoinHandle<()>)> {
        let routes = Self::routes(router);

        for port in start..=end {
            let signal = {
                let shutdown = shutdown.clone();
                async move { shutdown.notified().await }
            };

            match warp::serve(routes.clone()).try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port),
                signal,
            ) {
                Ok((addr, server)) => {
                    tracing::info!("Webhook receiver listening on {addr}");
                    return Ok((addr.port(), tokio::spawn(server)));
                }
                Err(e) => tracing::trace!("Port {} unavailable: {}", port, e),
            }
        }

        Err(WebhookError::NoAvailablePort { start, end })
    }

    fn routes(
        router: Arc<WebhookRouter>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone + Send + Sync + 'static
    {
        warp::post()
            .and(warp::path::full())
            .and(warp::header::optional::<String>(HOUSEHOLD_HEADER))
            .and(warp::header::optional::<String>(TARGET_HEADER))
            .and(warp::header::optional::<String>(NAMESPACE_HEADER))
            .and(warp::header::optional::<String>(TYPE_HEADER))
            .and(warp::body::bytes())
            .and_then(
                move |path: warp::path::FullPath,
                      household_id: Option<String>,
                      target_value: Option<String>,
                      namespace: Option<String>,
                      event_type: Option<String>,
                      body: bytes::Bytes| {
                    let router = router.clone();
                    async move {
                        tracing::trace!("webhook delivery on {} ({} bytes)", path.as_str(), body.len());

                        let household_id = household_id
                            .ok_or_else(|| warp::reject::custom(BadDelivery("missing household header")))?;
                        let target_value = target_value
                            .ok_or_else(|| warp::reject::custom(BadDelivery("missing target header")))?;
                        let body = Self::parse_body(&body)
                            .ok_or_else(|| warp::reject::custom(BadDelivery("invalid JSON body")))?;

                        let payload = WebhookPayload {
                            household_id,
                            target_value,
                            namespace,
                            event_type,
                            body,
                        };

                        if router.route_event(payload).await {
                            Ok::<_, warp::Rejection>(warp::reply::with_status("", StatusCode::OK))
                        } else {
                            Err(warp::reject::custom(UnknownHousehold))
                        }
                    }
                },
            )
            .recover(handle_rejection)
    }

    /// Empty bodies are accepted as an empty object.
    fn parse_body(body: &[u8]) -> Option<Value> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Some(Value::Object(Default::default()));
        }
        serde_json::from_slice(body).ok()
    }
}

async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if let Some(BadDelivery(reason)) = err.find::<BadDelivery>() {
        tracing::debug!("Rejected webhook delivery: {}", reason);
        (StatusCode::BAD_REQUEST, *reason)
    } else if err.find::<UnknownHousehold>().is_some() {
        tracing::debug!("Dropped webhook delivery for unregistered household");
        (StatusCode::NOT_FOUND, "household not registered")
    } else if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::NOT_FOUND, "not found")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };

    Ok(warp::reply::with_status(message, code))
}
