//! Single-client TCP echo service.
//!
//! The service runs one worker thread that:
//! - Waits (yielding) until the link is up
//! - Binds a listener on all interfaces
//! - Polls accept/receive without blocking, echoing every receive back
//!   with the response prefix
//!
//! At most one client is held. Further connection attempts stay in the
//! listen backlog until the current client goes away.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use echolink_core::config::ConfigError;
use echolink_core::echo::{frame_response, EchoBuffer};
use echolink_core::{LinkService, LinkStateCell, Liveness, ServiceConfig};

use crate::stats::ServiceStats;
use crate::tuning::SocketTuning;

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "tcp-echo-server";

/// Errors that end a service instance.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid service configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("Failed to enter listening state: {0}")]
    Listen(io::Error),

    #[error("Failed to configure listening socket: {0}")]
    Configure(io::Error),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(io::Error),
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Result<(), ServiceError>>,
}

/// Link-gated echo service. See the module docs.
pub struct ConnectionService {
    config: ServiceConfig,
    link: Arc<LinkStateCell>,
    tuning: Arc<dyn SocketTuning>,
    liveness: Arc<dyn Liveness>,
    stats: Arc<ServiceStats>,
    worker: Option<Worker>,
}

impl ConnectionService {
    /// Create a stopped service. Fails if `config` does not validate.
    pub fn new(
        config: ServiceConfig,
        link: Arc<LinkStateCell>,
        tuning: Arc<dyn SocketTuning>,
        liveness: Arc<dyn Liveness>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        Ok(Self {
            config,
            link,
            tuning,
            liveness,
            stats: Arc::new(ServiceStats::default()),
            worker: None,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<ServiceStats> {
        self.stats.clone()
    }

    /// True while a worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the worker. A no-op while one is already running.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.is_running() {
            warn!("Connection service already running, ignoring start");
            return Ok(());
        }
        // A previous worker may have exited on its own (bind failure).
        self.reap();

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = WorkerContext {
            config: self.config.clone(),
            link: self.link.clone(),
            tuning: self.tuning.clone(),
            liveness: self.liveness.clone(),
            stats: self.stats.clone(),
            stop: stop.clone(),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .stack_size(self.config.worker_stack_size)
            .spawn(move || {
                let result = run_worker(&ctx);
                if let Err(e) = &result {
                    error!(error = %e, "Connection service terminated");
                }
                result
            })
            .map_err(ServiceError::Spawn)?;

        info!(port = self.config.port, "Connection service started");
        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Release the listener and any client, then end the worker.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!("Connection service not running");
            return;
        };
        worker.stop.store(true, Ordering::Release);
        match worker.handle.join() {
            Ok(Ok(())) => info!("Connection service stopped"),
            Ok(Err(e)) => debug!(error = %e, "Connection service had already failed"),
            Err(_) => error!("Connection service worker panicked"),
        }
    }

    fn reap(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                error!("Connection service worker panicked");
            }
        }
    }
}

impl LinkService for ConnectionService {
    type Error = ServiceError;

    fn start(&mut self) -> Result<(), ServiceError> {
        ConnectionService::start(self)
    }

    fn stop(&mut self) {
        ConnectionService::stop(self)
    }
}

impl Drop for ConnectionService {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerContext {
    config: ServiceConfig,
    link: Arc<LinkStateCell>,
    tuning: Arc<dyn SocketTuning>,
    liveness: Arc<dyn Liveness>,
    stats: Arc<ServiceStats>,
    stop: Arc<AtomicBool>,
}

impl WorkerContext {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Listening socket; clears the `listening` flag when released.
struct BoundListener {
    listener: TcpListener,
    stats: Arc<ServiceStats>,
}

impl Drop for BoundListener {
    fn drop(&mut self) {
        self.stats.listener_released();
        debug!("Listening socket released");
    }
}

/// The one connected client; clears `client_connected` when released.
struct Client {
    stream: TcpStream,
    peer: SocketAddr,
    stats: Arc<ServiceStats>,
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stats.client_released();
    }
}

/// Watchdog registration of the worker thread; unregisters on every exit
/// path, including early returns and unwinding.
struct LivenessGuard<'a> {
    liveness: &'a dyn Liveness,
}

impl<'a> LivenessGuard<'a> {
    fn enter(liveness: &'a dyn Liveness) -> Self {
        liveness.enter();
        Self { liveness }
    }
}

impl Drop for LivenessGuard<'_> {
    fn drop(&mut self) {
        self.liveness.leave();
    }
}

fn run_worker(ctx: &WorkerContext) -> Result<(), ServiceError> {
    let _liveness = LivenessGuard::enter(ctx.liveness.as_ref());

    if !wait_for_link(ctx) {
        debug!("Stopped before link came up");
        return Ok(());
    }

    let bound = bind_listener(ctx)?;
    let mut buffer = EchoBuffer::new(ctx.config.recv_buffer_size);
    let mut client: Option<Client> = None;

    while !ctx.stopping() {
        ctx.liveness.ping();

        client = match client.take() {
            None => try_accept(ctx, &bound),
            Some(current) => serve_client(ctx, current, &mut buffer),
        };

        thread::sleep(ctx.config.poll_interval());
    }

    if let Some(current) = client {
        info!(peer = %current.peer, "Closing client connection");
    }
    drop(bound);
    Ok(())
}

/// Yield until the link is up. Returns false if stopped first.
fn wait_for_link(ctx: &WorkerContext) -> bool {
    loop {
        if ctx.stopping() {
            return false;
        }
        if ctx.link.is_up() {
            return true;
        }
        ctx.liveness.ping();
        thread::sleep(ctx.config.link_poll_interval());
    }
}

fn bind_listener(ctx: &WorkerContext) -> Result<BoundListener, ServiceError> {
    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), ctx.config.port);

    // std sets SO_REUSEADDR on Unix before binding.
    let listener =
        TcpListener::bind(addr).map_err(|source| ServiceError::Bind { addr, source })?;
    ctx.tuning
        .set_backlog(&listener, ctx.config.backlog)
        .map_err(ServiceError::Listen)?;
    listener
        .set_nonblocking(true)
        .map_err(ServiceError::Configure)?;

    ctx.stats.listener_bound();
    info!(%addr, backlog = ctx.config.backlog, "TCP echo server listening");
    Ok(BoundListener {
        listener,
        stats: ctx.stats.clone(),
    })
}

fn try_accept(ctx: &WorkerContext, bound: &BoundListener) -> Option<Client> {
    let (stream, peer) = match bound.listener.accept() {
        Ok(accepted) => accepted,
        Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
        Err(e) => {
            debug!(error = %e, "Accept failed");
            return None;
        }
    };

    if let Err(e) = stream.set_nonblocking(true) {
        warn!(%peer, error = %e, "Failed to make client socket non-blocking, dropping it");
        return None;
    }
    if let Err(e) = ctx.tuning.apply_keepalive(&stream, &ctx.config.keepalive) {
        warn!(%peer, error = %e, "Failed to enable keep-alive");
    }

    ctx.stats.client_accepted();
    info!(%peer, "TCP client connected");
    Some(Client {
        stream,
        peer,
        stats: ctx.stats.clone(),
    })
}

/// One receive/echo step. Returns the client if it is still usable.
fn serve_client(ctx: &WorkerContext, mut client: Client, buffer: &mut EchoBuffer) -> Option<Client> {
    let received = match client.stream.read(buffer.read_slot()) {
        Ok(0) => {
            info!(peer = %client.peer, "TCP client disconnected");
            return None;
        }
        Ok(n) => n,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
            return Some(client);
        }
        Err(e) => {
            warn!(peer = %client.peer, error = %e, "Receive failed, dropping client");
            return None;
        }
    };

    let response = frame_response(buffer.filled(received));
    match client.stream.write(&response) {
        Ok(written) if written == response.len() => {
            ctx.stats.record_echo();
            info!(
                peer = %client.peer,
                bytes = received,
                "Bytes received from TCP client, echoing them back"
            );
        }
        Ok(written) => {
            ctx.stats.record_send_failure();
            warn!(
                peer = %client.peer,
                written,
                expected = response.len(),
                "Short send to TCP client"
            );
        }
        Err(e) => {
            ctx.stats.record_send_failure();
            warn!(peer = %client.peer, error = %e, "Send to TCP client failed");
        }
    }
    Some(client)
}
