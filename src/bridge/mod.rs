//! Single-client TCP bridge tying the gadget to a remote input source.
//!
//! `Bridge::start` binds the listener on an ephemeral port, brings the
//! gadget up, publishes `"<pid>:<port>"` to the discovery file, and runs two
//! background tasks: the connection acceptor and the 10 ms output sampler
//! that mirrors host-written output state to the client at ~100 Hz.

pub mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::controller::Ds3Controller;
use crate::error::{BridgeError, Result};
use crate::function::Ds3Function;
use crate::otg::{Ds3Gadget, DEFAULT_CONFIGURED_TIMEOUT};
use crate::staging;

pub use session::{decode_chunk, ClientOp, Session};

const OUTPUT_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running bridge. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    controller: Arc<Ds3Controller>,
    function: Ds3Function,
    gadget: tokio::sync::Mutex<Option<Ds3Gadget>>,
    session: parking_lot::Mutex<Option<Arc<Session>>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    process_file: PathBuf,
    port: u16,
    released: AtomicBool,
    done_tx: watch::Sender<bool>,
}

impl Bridge {
    /// Bind the listener and the gadget, publish the discovery file, and
    /// start the background tasks.
    ///
    /// Any failure along the way tears down what was already acquired before
    /// the error propagates.
    pub async fn start(config: &BridgeConfig) -> Result<Bridge> {
        let controller = Arc::new(Ds3Controller::new());

        let listener = TcpListener::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| BridgeError::BindFailure(format!("listener bind failed: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| BridgeError::BindFailure(format!("listener address: {}", e)))?
            .port();

        // the gadget guard tears the ConfigFS tree down again if anything
        // after this point fails
        let mut gadget = Ds3Gadget::new();
        gadget.setup()?;
        gadget.bind()?;
        gadget.await_configured(DEFAULT_CONFIGURED_TIMEOUT).await?;

        let process_file = config.process_file_path();
        staging::write_process_file(&process_file, port)?;

        let endpoints = gadget.endpoints();
        let function = Ds3Function::new(controller.clone(), endpoints);
        function.enable();

        let (done_tx, _) = watch::channel(false);
        let inner = Arc::new(BridgeInner {
            controller,
            function,
            gadget: tokio::sync::Mutex::new(Some(gadget)),
            session: parking_lot::Mutex::new(None),
            tasks: parking_lot::Mutex::new(Vec::new()),
            process_file,
            port,
            released: AtomicBool::new(false),
            done_tx,
        });

        let accept = tokio::spawn(accept_loop(inner.clone(), listener));
        let sampler = tokio::spawn(output_sampler(inner.clone()));
        inner.tasks.lock().extend([accept, sampler]);

        info!("Bridge listening on port {}", port);
        Ok(Bridge { inner })
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// The emulated pad behind this bridge.
    pub fn controller(&self) -> Arc<Ds3Controller> {
        self.inner.controller.clone()
    }

    /// Release everything: sampler, session, listener, gadget. Idempotent.
    pub async fn release(&self) {
        self.inner.release().await;
    }

    /// Wait until the bridge has been released.
    pub async fn wait_released(&self) {
        let mut rx = self.inner.done_tx.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl BridgeInner {
    /// Install a new session, or close the extra socket when one is open.
    fn handle_incoming(self: &Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        let mut slot = self.session.lock();
        if slot.as_ref().map(|s| s.is_open()).unwrap_or(false) {
            warn!("Rejecting extra connection from {}", remote);
            drop(stream);
            return;
        }

        info!("Client connected: {}", remote);
        let session = Arc::new(Session::new(stream, remote));
        *slot = Some(session.clone());
        drop(slot);

        let inner = self.clone();
        tokio::spawn(async move {
            let controller = inner.controller.clone();
            let result = session
                .run(|frame| {
                    if let Err(e) = controller.apply_input(frame) {
                        warn!("input frame rejected: {}", e);
                    }
                })
                .await;

            info!("Client disconnected: {}", session.remote());
            {
                let mut slot = inner.session.lock();
                if let Some(current) = slot.as_ref() {
                    if Arc::ptr_eq(current, &session) {
                        *slot = None;
                    }
                }
            }

            if result == Some(ClientOp::Shutdown) {
                info!("Shutdown requested by client");
                inner.release().await;
            }
        });
    }

    async fn release(self: &Arc<Self>) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Releasing bridge");

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(session) = self.session.lock().take() {
            session.release();
        }

        self.function.release();

        if let Some(mut gadget) = self.gadget.lock().await.take() {
            if let Err(e) = gadget.unbind() {
                warn!("Gadget unbind failed: {}", e);
            }
            if let Err(e) = gadget.cleanup() {
                warn!("Gadget cleanup failed: {}", e);
            }
        }

        if let Err(e) = std::fs::remove_file(&self.process_file) {
            debug!("discovery file not removed: {}", e);
        }

        let _ = self.done_tx.send(true);
        info!("Bridge released");
    }
}

/// Accept connections until the task is cancelled; the listener closes with
/// the task.
async fn accept_loop(inner: Arc<BridgeInner>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => inner.handle_incoming(stream, remote),
            Err(e) => {
                warn!("accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

/// Mirror the current output report to the client on a fixed cadence, with
/// no change-suppression.
async fn output_sampler(inner: Arc<BridgeInner>) {
    let mut tick = tokio::time::interval(OUTPUT_SAMPLE_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tick.tick().await;
        let session = inner.session.lock().clone();
        if let Some(session) = session {
            if session.is_open() {
                session.send_output(&inner.controller.read_output());
            }
        }
    }
}
