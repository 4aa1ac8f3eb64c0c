use std::cell::Cell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, instrument};

use super::MAX_UDP_PACKET_SIZE;
use super::config::MulticastConfig;
use super::events::event_handling::{EventListeners, EventType, ListenerId};
use super::multicast_socket;
use crate::error::{IpMidiError, Result};
use crate::packets::raw_packet::RawPacket;

thread_local! {
    /// Set while this thread is running a receive loop's listeners.
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

struct DispatchScope;

impl DispatchScope {
    fn enter() -> Self {
        IN_DISPATCH.with(|flag| flag.set(true));
        DispatchScope
    }

    fn is_active() -> bool {
        IN_DISPATCH.with(Cell::get)
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        IN_DISPATCH.with(|flag| flag.set(false));
    }
}

/// State that exists only while a receive loop is running.
struct ListenContext {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    cancel_token: CancellationToken,
    /// Held by the loop for as long as it is running listeners.
    dispatch_gate: Arc<std::sync::Mutex<()>>,
    /// Cancelled by the loop itself when it exits, for whatever reason.
    terminated: CancellationToken,
}

/// Listens on an ipMIDI group and raises one notification per decoded message.
///
/// Nothing touches the network until [`Receiver::start`]. Listeners run on the receive loop's
/// task, in the order messages appear in each datagram, so slow listeners delay everything
/// behind them. Dropping the receiver stops it.
pub struct Receiver {
    config: MulticastConfig,
    listeners: Arc<Mutex<EventListeners>>,
    listen_ctx: std::sync::Mutex<Option<ListenContext>>,
    disposed: AtomicBool,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new(MulticastConfig::default())
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.config)
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl Receiver {
    pub fn new(config: MulticastConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(Mutex::new(EventListeners::new())),
            listen_ctx: std::sync::Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MulticastConfig {
        &self.config
    }

    fn lock_ctx(&self) -> MutexGuard<'_, Option<ListenContext>> {
        self.listen_ctx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn add_listener<E, F>(&self, event: E, callback: F) -> ListenerId
    where
        E: EventType,
        F: for<'a> Fn(E::Data<'a>) + Send + Sync + 'static,
    {
        self.listeners.lock().await.add(event, callback)
    }

    /// Takes effect from the next datagram on. Returns `false` for an unknown id.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().await.remove(id)
    }

    /// `true` while a receive loop is running.
    pub fn is_listening(&self) -> bool {
        self.lock_ctx().as_ref().is_some_and(|ctx| !ctx.terminated.is_cancelled())
    }

    /// The bound socket address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_ctx().as_ref().map(|ctx| ctx.local_addr)
    }

    /// Binds, joins the group and spawns the receive loop on the current Tokio runtime.
    ///
    /// Returns as soon as the loop is spawned. A receiver whose loop has died on a transport
    /// error can be started again.
    #[instrument(skip_all, fields(group = %self.config.group, port = self.config.port))]
    pub async fn start(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(IpMidiError::Disposed);
        }

        let mut ctx_guard = self.lock_ctx();
        if let Some(ctx) = ctx_guard.as_ref() {
            if !ctx.terminated.is_cancelled() {
                return Err(IpMidiError::AlreadyListening);
            }
            event!(Level::DEBUG, "Previous receive loop has exited, replacing it");
            multicast_socket::leave_group(&ctx.socket, &self.config);
            ctx_guard.take();
        }

        let socket = Arc::new(multicast_socket::bind_receiver(&self.config)?);
        let local_addr = socket.local_addr()?;
        let cancel_token = CancellationToken::new();
        let dispatch_gate = Arc::new(std::sync::Mutex::new(()));
        let terminated = CancellationToken::new();

        tokio::spawn(Self::listen(
            socket.clone(),
            local_addr,
            self.listeners.clone(),
            cancel_token.clone(),
            dispatch_gate.clone(),
            terminated.clone(),
        ));

        *ctx_guard = Some(ListenContext {
            socket,
            local_addr,
            cancel_token,
            dispatch_gate,
            terminated,
        });
        event!(Level::INFO, addr = %local_addr, "ipMIDI receiver listening");
        Ok(())
    }

    /// Stops the receive loop and leaves the group. A no-op when not listening.
    ///
    /// Does not wait for the loop task to exit. It does wait for a listener running on another
    /// thread to return, so no listener is called once this returns. Called from inside a
    /// listener, it returns at once and the listeners after the current one are skipped.
    /// Await [`Receiver::terminated`], obtained before calling this, to know the loop is gone.
    #[instrument(skip_all, fields(group = %self.config.group, port = self.config.port))]
    pub fn stop(&self) {
        let Some(ctx) = self.lock_ctx().take() else {
            return;
        };
        ctx.cancel_token.cancel();
        if !DispatchScope::is_active() {
            drop(ctx.dispatch_gate.lock().unwrap_or_else(PoisonError::into_inner));
        }
        multicast_socket::leave_group(&ctx.socket, &self.config);
        event!(Level::INFO, "ipMIDI receiver stopped");
    }

    /// Returns a future that resolves once the loop running right now has exited, or immediately
    /// when none is running.
    ///
    /// The loop is looked up when this is called, not when the future is first polled, so the
    /// future can be taken before [`Receiver::stop`] and awaited afterwards.
    pub fn terminated(&self) -> impl Future<Output = ()> + Send + use<> {
        let terminated = self.lock_ctx().as_ref().map(|ctx| ctx.terminated.clone());
        async move {
            if let Some(terminated) = terminated {
                terminated.cancelled().await;
            }
        }
    }

    /// Stops the receiver for good. Later calls do nothing and `start` fails with `Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop();
    }

    #[instrument(name = "ipMIDI", skip_all, fields(addr = %local_addr))]
    async fn listen(
        socket: Arc<UdpSocket>,
        local_addr: SocketAddr,
        listeners: Arc<Mutex<EventListeners>>,
        cancel_token: CancellationToken,
        dispatch_gate: Arc<std::sync::Mutex<()>>,
        terminated: CancellationToken,
    ) {
        let _terminated = terminated.drop_guard();
        let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE];
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    event!(Level::DEBUG, "listen: cancellation requested");
                    break;
                },
                recv = socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((amt, src)) => {
                            event!(Level::TRACE, "Received {} bytes from {}", amt, src);
                            let packet = RawPacket::received(Bytes::copy_from_slice(&buf[..amt]), src);
                            let snapshot = listeners.lock().await.clone();
                            let _gate = dispatch_gate.lock().unwrap_or_else(PoisonError::into_inner);
                            let _scope = DispatchScope::enter();
                            snapshot.dispatch(&packet, &cancel_token);
                        }
                        Err(e) => {
                            event!(Level::ERROR, "Error receiving data: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        event!(Level::DEBUG, "Receive loop exited");
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.dispose();
    }
}
