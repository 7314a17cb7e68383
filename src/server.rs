//! Service: route table, middleware chains, accept loops and shutdown.
//!
//! A [`Service`] is configured with `&mut self` (handlers, middleware),
//! then shared behind an [`Arc`] to serve. The split means the route table
//! and middleware lists are immutable once listening starts, so the hot
//! path takes no locks. Only the keepalive configuration, which may be
//! toggled while serving, sits behind a mutex.
//!
//! Each accepted connection carries exactly one call and runs in its own
//! task. A panicking handler is caught and logged; it closes its own
//! connection and nothing else. Transient accept errors are logged and the
//! loop continues.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::cancel::CancelToken;
use crate::content::Content;
use crate::error::{Result, RpcError};
use crate::handler::Handler;

#[derive(Debug, Clone, Copy, Default)]
struct KeepaliveConfig {
    enabled: bool,
    period: Option<Duration>,
}

/// RPC server: method routing, middleware, accept loop.
pub struct Service {
    handlers: HashMap<String, Box<dyn Handler>>,
    pre_mw: Vec<Box<dyn Handler>>,
    post_mw: Vec<Box<dyn Handler>>,
    cancel: CancelToken,
    drained: watch::Sender<bool>,
    keepalive: Mutex<KeepaliveConfig>,
}

impl Service {
    /// Create an empty service.
    pub fn new() -> Self {
        let (drained, _) = watch::channel(true);
        Self {
            handlers: HashMap::new(),
            pre_mw: Vec::new(),
            post_mw: Vec::new(),
            cancel: CancelToken::new(),
            drained,
            keepalive: Mutex::new(KeepaliveConfig::default()),
        }
    }

    /// Register a handler for `method`. Registration is only possible
    /// before the service is shared for serving.
    pub fn handle<H: Handler>(&mut self, method: &str, handler: H) {
        self.handlers.insert(method.to_string(), Box::new(handler));
    }

    /// Append a pre-middleware. Pre-middleware runs after method decode and
    /// before routing; an error aborts the chain and the call.
    pub fn pre_middleware<H: Handler>(&mut self, mw: H) {
        self.pre_mw.push(Box::new(mw));
    }

    /// Append a post-middleware. Post-middleware runs after a successful
    /// handler; its errors are logged, never re-sent.
    pub fn post_middleware<H: Handler>(&mut self, mw: H) {
        self.post_mw.push(Box::new(mw));
    }

    /// Enable or disable TCP keepalive on accepted connections.
    pub fn set_keepalive(&self, enabled: bool) {
        self.keepalive.lock().unwrap().enabled = enabled;
    }

    /// Set the keepalive idle period applied when keepalive is enabled.
    pub fn set_keepalive_period(&self, period: Duration) {
        self.keepalive.lock().unwrap().period = Some(period);
    }

    /// A clone of the service's shutdown token. Handlers can carry it into
    /// blob copies so in-flight transfers abort on [`Service::stop`].
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Bind a TCP listener on `address` and serve until stopped.
    pub async fn listen(self: Arc<Self>, address: &str) -> Result<()> {
        tracing::info!(%address, "server listen");
        let listener = TcpListener::bind(address)
            .await
            .map_err(|err| RpcError::Config(format!("unable to start listener: {err}")))?;
        self.serve(listener).await
    }

    /// Serve connections from a caller-bound listener until stopped.
    ///
    /// Returns after the accept loop exits and every in-flight connection
    /// has drained.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.drained.send_replace(false);
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(err) = self.apply_keepalive(&stream) {
                            tracing::error!(error = %err, "unable to set keepalive");
                        }
                        tasks.spawn(self.clone().conn_task(stream, peer.ip().to_string()));
                    }
                    Err(err) => tracing::error!(error = %err, "conn accept error"),
                },
            }
        }
        self.drain(tasks).await;
        Ok(())
    }

    /// Bind a TCP listener on `address` and serve TLS connections until
    /// stopped. Keepalive is not applied: it is a TCP-socket option.
    pub async fn listen_tls(self: Arc<Self>, address: &str, tls_config: Arc<ServerConfig>) -> Result<()> {
        tracing::info!(%address, "server listen (tls)");
        let listener = TcpListener::bind(address)
            .await
            .map_err(|err| RpcError::Config(format!("unable to start listener: {err}")))?;
        let acceptor = TlsAcceptor::from(tls_config);

        self.drained.send_replace(false);
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let svc = self.clone();
                        let acceptor = acceptor.clone();
                        tasks.spawn(async move {
                            match acceptor.accept(stream).await {
                                Ok(tls_stream) => {
                                    svc.conn_task(tls_stream, peer.ip().to_string()).await;
                                }
                                Err(err) => tracing::error!(error = %err, "tls handshake error"),
                            }
                        });
                    }
                    Err(err) => tracing::error!(error = %err, "conn accept error"),
                },
            }
        }
        self.drain(tasks).await;
        Ok(())
    }

    /// Stop accepting and wait for in-flight connections to drain.
    pub async fn stop(&self) {
        tracing::info!("cancel rpc accept loop");
        self.cancel.cancel();
        tracing::info!("wait rpc handlers");
        let mut rx = self.drained.subscribe();
        loop {
            if *rx.borrow_and_update() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    tracing::error!("connection task panicked");
                }
            }
        }
        self.drained.send_replace(true);
    }

    fn apply_keepalive(&self, stream: &TcpStream) -> std::io::Result<()> {
        let config = *self.keepalive.lock().unwrap();
        if !config.enabled {
            return Ok(());
        }
        let sock = socket2::SockRef::from(stream);
        sock.set_keepalive(true)?;
        if let Some(period) = config.period {
            sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(period))?;
        }
        Ok(())
    }

    async fn conn_task<S>(self: Arc<Self>, stream: S, remote_host: String)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut content = Content::from_stream(stream);
        content.set_remote_host(remote_host);

        // One bad handler must not take down the accept loop.
        let outcome = AssertUnwindSafe(self.dispatch(&mut content))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "conn handler error"),
            Err(panic) => {
                tracing::error!(cause = panic_message(panic.as_ref()), "handler panic")
            }
        }
    }

    async fn dispatch(&self, content: &mut Content) -> Result<()> {
        content.read_request().await?;
        content.bind_method()?;
        for mw in &self.pre_mw {
            mw.call(content).await?;
        }
        self.route(content).await?;
        for mw in &self.post_mw {
            if let Err(err) = mw.call(content).await {
                tracing::error!(error = %err, "post middleware error");
            }
        }
        Ok(())
    }

    async fn route(&self, content: &mut Content) -> Result<()> {
        match self.handlers.get(content.method()) {
            Some(handler) => handler.call(content).await,
            None => not_found(content).await,
        }
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in responder for unknown methods.
async fn not_found(content: &mut Content) -> Result<()> {
    content.send_error("method not found").await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
