//! HTTP(S) listeners for the admin and mock surfaces.
//!
//! Each accepted connection is served on its own task, so a rule delay only
//! ever suspends the request it belongs to.

mod tls;

pub use tls::create_tls_acceptor;

use crate::admin_api::{handle_health, route_request};
use crate::config::{Protocol, ServerConfig};
use crate::dispatch::{is_admin_path, RequestDescriptor};
use crate::state::AppState;
use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Which routes a listener serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Admin API only
    Admin,
    /// `/health` plus the dispatcher
    Mock,
    /// Admin API, falling through to the dispatcher for everything else
    Combined,
}

impl Surface {
    fn name(&self) -> &'static str {
        match self {
            Surface::Admin => "admin",
            Surface::Mock => "mock",
            Surface::Combined => "combined",
        }
    }
}

pub struct Listener {
    surface: Surface,
    addr: SocketAddr,
    protocol: Protocol,
    tls_paths: Option<(String, String)>,
    state: AppState,
}

struct ConnectionContext {
    surface: Surface,
    scheme: Protocol,
    state: AppState,
}

impl Listener {
    pub fn new(surface: Surface, addr: SocketAddr, protocol: Protocol, state: AppState) -> Self {
        Self {
            surface,
            addr,
            protocol,
            tls_paths: None,
            state,
        }
    }

    pub fn with_tls(mut self, cert_path: &str, key_path: &str) -> Self {
        self.tls_paths = Some((cert_path.to_string(), key_path.to_string()));
        self
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {} listener on {}", self.surface.name(), self.addr))?;
        self.serve(listener).await
    }

    /// An https listener without a usable certificate serves plain http
    fn tls_acceptor(&self) -> Option<TlsAcceptor> {
        if self.protocol != Protocol::Https {
            return None;
        }
        let Some((cert, key)) = &self.tls_paths else {
            warn!(
                "{} listener configured for https without ssl_cert/ssl_key, falling back to http",
                self.surface.name()
            );
            return None;
        };
        match create_tls_acceptor(cert, key) {
            Ok(acceptor) => Some(acceptor),
            Err(e) => {
                warn!(
                    "{} listener could not load TLS material, falling back to http: {}",
                    self.surface.name(),
                    e
                );
                None
            }
        }
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let tls_acceptor = self.tls_acceptor();
        let scheme = if tls_acceptor.is_some() {
            Protocol::Https
        } else {
            Protocol::Http
        };
        let local_addr = listener.local_addr()?;
        info!(
            "{} listener on {}://{}",
            self.surface.name(),
            scheme,
            local_addr
        );

        let ctx = Arc::new(ConnectionContext {
            surface: self.surface,
            scheme,
            state: self.state,
        });

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let ctx = Arc::clone(&ctx);
            let tls_acceptor = tls_acceptor.clone();

            tokio::spawn(async move {
                match tls_acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_connection(tls_stream, ctx, remote_addr).await,
                        Err(err) => debug!("TLS handshake failed from {}: {}", remote_addr, err),
                    },
                    None => serve_connection(stream, ctx, remote_addr).await,
                }
            });
        }
    }
}

async fn serve_connection<I>(io: I, ctx: Arc<ConnectionContext>, remote_addr: SocketAddr)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);
    let service = service_fn(move |req| {
        let ctx = Arc::clone(&ctx);
        async move { Ok::<_, Infallible>(ctx.route(req, remote_addr).await) }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        debug!("Error serving connection from {}: {}", remote_addr, err);
    }
}

impl ConnectionContext {
    async fn route(&self, req: Request<Incoming>, remote_addr: SocketAddr) -> Response<Full<Bytes>> {
        let path = req.uri().path();
        let admin_owned = path == "/health" || path == "/metrics" || is_admin_path(path);

        match self.surface {
            Surface::Admin => route_request(req, &self.state, self.scheme).await,
            Surface::Combined if admin_owned => route_request(req, &self.state, self.scheme).await,
            Surface::Mock if req.method() == Method::GET && path == "/health" => handle_health(),
            Surface::Mock | Surface::Combined => {
                let descriptor =
                    RequestDescriptor::from_request(req, self.scheme, Some(remote_addr)).await;
                self.state
                    .dispatcher
                    .handle(descriptor)
                    .await
                    .into_response()
            }
        }
    }
}

/// Start the listeners described by `config` and run until one fails
pub async fn run(config: &ServerConfig, state: AppState, combined: bool) -> Result<(), anyhow::Error> {
    let listener = |surface, port, protocol| {
        let listener = Listener::new(
            surface,
            SocketAddr::from(([0, 0, 0, 0], port)),
            protocol,
            state.clone(),
        );
        match config.tls_paths() {
            Some((cert, key)) => listener.with_tls(cert, key),
            None => listener,
        }
    };

    if combined {
        return listener(Surface::Combined, config.admin_port, config.admin_protocol)
            .run()
            .await;
    }

    let admin = listener(Surface::Admin, config.admin_port, config.admin_protocol);
    let mock = listener(Surface::Mock, config.mock_port, config.mock_protocol);
    tokio::try_join!(admin.run(), mock.run())?;
    Ok(())
}
