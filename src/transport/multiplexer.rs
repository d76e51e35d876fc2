//! # Connection Multiplexer
//!
//! One control loop owns the listening socket, every connection slot, the
//! drum catalog and the dispatcher. Nothing else touches the catalog, so no
//! locking is needed.
//!
//! ```text
//!            ┌──────────── select! ────────────┐
//!  listener ─┤ accept → admit or refuse         │
//!  readers  ─┤ (slot, event) → dispatch → reply ├─→ per-slot reply queue → writer task
//!  interval ─┤ housekeeping every poll_interval │
//!  shutdown ─┤ tear down                        │
//!            └──────────────────────────────────┘
//! ```
//!
//! Each slot's read half sits in a `StreamMap` behind a `FramedRead`, whose
//! buffer holds the partially received packet. The loop only reacts to
//! readiness, so a silent client costs nothing. Replies go through a bounded
//! queue to a small writer task per slot, so a client that stops reading can
//! never stall the loop; once its queue is full, or a single write outlasts
//! `write_timeout`, it is disconnected.
//!
//! Slot lifecycle: `Empty → Accepted → Reading → {Dispatching → Reading | Closing} → Empty`.

use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use futures::{SinkExt, StreamExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixSocket, UnixStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamMap;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, instrument, warn};

use crate::config::DaemonConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{OdbError, Result};
use crate::protocol::dispatcher::{error_reply, Dispatcher};
use crate::storage::catalog::Catalog;
use crate::transport::slots::{SlotArena, SlotId};
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout;

/// Per-slot state machine; an unoccupied slot is `Empty`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Accepted,
    Reading,
    Dispatching,
    Closing,
}

impl SlotState {
    fn can_transition_to(self, next: SlotState) -> bool {
        use SlotState::*;
        matches!(
            (self, next),
            (Accepted, Reading)
                | (Reading, Dispatching)
                | (Dispatching, Reading)
                | (_, Closing)
        )
    }
}

enum SlotEvent {
    Packet(Packet),
    Failed(OdbError),
    Closed,
}

type SlotEvents = Pin<Box<dyn Stream<Item = SlotEvent> + Send>>;

fn slot_events(reader: FramedRead<OwnedReadHalf, PacketCodec>) -> SlotEvents {
    let events = reader.map(|item| match item {
        Ok(packet) => SlotEvent::Packet(packet),
        Err(err) => SlotEvent::Failed(err),
    });
    Box::pin(events.chain(stream::once(async { SlotEvent::Closed })))
}

/// An occupied connection slot
struct Connection {
    id: SlotId,
    state: SlotState,
    outbox: mpsc::Sender<Packet>,
    writer: JoinHandle<()>,
    packets: u64,
}

impl Connection {
    fn transition(&mut self, next: SlotState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal slot transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// Drains one slot's reply queue into its socket.
///
/// Exits quietly once the outbox is dropped. A failed or timed out write
/// reports the slot on `gone` so the loop can release it.
async fn write_replies(
    slot: SlotId,
    mut writer: FramedWrite<OwnedWriteHalf, PacketCodec>,
    mut inbox: mpsc::Receiver<Packet>,
    write_timeout: Duration,
    metrics: Arc<Metrics>,
    gone: mpsc::UnboundedSender<SlotId>,
) {
    while let Some(reply) = inbox.recv().await {
        let len = reply.encoded_len() as u64;
        match with_timeout(write_timeout, writer.send(reply)).await {
            Ok(()) => metrics.packet_sent(len),
            Err(e) => {
                debug!(slot = %slot, error = %e, "Failed to write reply");
                metrics.connection_error();
                // close the queue first so the loop sees this slot's outbox closed
                drop(inbox);
                let _ = gone.send(slot);
                return;
            }
        }
    }
}

/// The daemon context: everything the control loop owns
pub struct Daemon {
    config: DaemonConfig,
    socket_path: PathBuf,
    listener: UnixListener,
    catalog: Catalog,
    dispatcher: Dispatcher,
    slots: SlotArena<Connection>,
    readers: StreamMap<SlotId, SlotEvents>,
    writers_gone: (mpsc::UnboundedSender<SlotId>, mpsc::UnboundedReceiver<SlotId>),
    metrics: Arc<Metrics>,
}

impl Daemon {
    /// Scan the drum root, load snapshots if enabled, and bind the socket.
    pub fn open(config: DaemonConfig) -> Result<Self> {
        config.validate_strict()?;
        let root = &config.storage.drum_root;
        if !root.exists() {
            return Err(OdbError::ConfigError(format!(
                "could not access \"{}\"",
                root.display()
            )));
        }

        let mut catalog = Catalog::open(root)?;
        if config.storage.persist {
            let loaded = catalog.load_snapshots(&config.storage.snapshot_file)?;
            info!(buckets = loaded, "Loaded drum snapshots");
        }
        Self::bind(config, catalog)
    }

    /// Bind the IPC channel for an already built catalog.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: DaemonConfig, catalog: Catalog) -> Result<Self> {
        config.validate_strict()?;
        let socket_path = config.server.socket_path.clone();
        remove_stale_socket(&socket_path)?;

        let socket = UnixSocket::new_stream()?;
        socket.bind(&socket_path)?;
        let listener = socket.listen(config.server.backlog)?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o660))?;
        info!(
            path = %socket_path.display(),
            drums = catalog.len(),
            slots = config.server.max_connections,
            "Listening on unix socket"
        );

        Ok(Self {
            slots: SlotArena::with_capacity(config.server.max_connections),
            readers: StreamMap::new(),
            writers_gone: mpsc::unbounded_channel(),
            dispatcher: Dispatcher::new(),
            metrics: Arc::new(Metrics::new()),
            config,
            socket_path,
            listener,
            catalog,
        })
    }

    /// Replace the dispatcher, e.g. to install extra handlers
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Serve until `shutdown_rx` fires or its sender is dropped.
    #[instrument(skip_all, fields(socket_path = %self.socket_path.display()))]
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let mut housekeeping = tokio::time::interval(self.config.server.poll_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_activity = 0;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down daemon");
                    break;
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => self.admit(stream),
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                            self.metrics.connection_error();
                        }
                    }
                }

                Some((slot, event)) = self.readers.next(), if !self.readers.is_empty() => {
                    self.handle_event(slot, event);
                }

                Some(slot) = self.writers_gone.1.recv() => {
                    self.writer_gone(slot);
                }

                _ = housekeeping.tick() => {
                    let activity = self.metrics.snapshot().activity();
                    if activity != last_activity {
                        last_activity = activity;
                        self.metrics.log_metrics();
                    }
                }
            }
        }

        self.shutdown().await
    }

    fn admit(&mut self, stream: UnixStream) {
        match self.occupy(stream) {
            Ok(id) => {
                self.metrics.connection_accepted();
                debug!(slot = %id, active = self.slots.len(), "Accepted connection");
            }
            Err(e) => {
                self.metrics.connection_rejected();
                warn!(error = %e, "Refusing client");
            }
        }
    }

    /// Give `stream` a free slot, a reader in the map and a writer task
    fn occupy(&mut self, stream: UnixStream) -> Result<SlotId> {
        let codec = PacketCodec::new(self.config.storage.max_payload_size);
        let (read_half, write_half) = stream.into_split();
        let depth = self.config.server.backpressure_limit;
        let write_timeout = self.config.server.write_timeout;
        let metrics = self.metrics.clone();
        let gone = self.writers_gone.0.clone();

        let admitted = self.slots.insert_with(|id| {
            let (outbox, inbox) = mpsc::channel(depth);
            let writer = tokio::spawn(write_replies(
                id,
                FramedWrite::new(write_half, codec),
                inbox,
                write_timeout,
                metrics,
                gone,
            ));
            Connection {
                id,
                state: SlotState::Accepted,
                outbox,
                writer,
                packets: 0,
            }
        });

        let id = admitted.ok_or(OdbError::ResourceExhausted(self.slots.capacity()))?;

        self.readers
            .insert(id, slot_events(FramedRead::new(read_half, codec)));
        if let Some(conn) = self.slots.get_mut(id) {
            conn.transition(SlotState::Reading);
        }
        Ok(id)
    }

    /// A writer task gave up on its socket; release the slot it served.
    fn writer_gone(&mut self, id: SlotId) {
        // the slot may already have been released and handed to a new client
        let stale = self
            .slots
            .get(id)
            .is_some_and(|conn| conn.outbox.is_closed());
        if stale {
            warn!(slot = %id, "Reply write failed, dropping client");
            self.close(id);
        }
    }

    fn handle_event(&mut self, id: SlotId, event: SlotEvent) {
        match event {
            SlotEvent::Packet(packet) => {
                match self.serve(id, packet) {
                    Ok(()) => {}
                    // its writer already failed and counted the error
                    Err(OdbError::ConnectionClosed) => self.close(id),
                    Err(e) => {
                        warn!(slot = %id, error = %e, "Dropping client");
                        self.metrics.connection_error();
                        self.close(id);
                    }
                }
            }
            SlotEvent::Failed(err) => {
                if err.is_protocol_violation() {
                    warn!(slot = %id, error = %err, "Protocol violation, closing connection");
                    self.metrics.protocol_error();
                } else {
                    debug!(slot = %id, error = %err, "Read failed, closing connection");
                    self.metrics.connection_error();
                }
                self.close(id);
            }
            SlotEvent::Closed => {
                debug!(slot = %id, "Client closed connection");
                self.close(id);
            }
        }
    }

    fn serve(&mut self, id: SlotId, packet: Packet) -> Result<()> {
        self.metrics.packet_received(packet.encoded_len() as u64);
        let conn = self.slots.get_mut(id).ok_or(OdbError::ConnectionClosed)?;
        conn.transition(SlotState::Dispatching);
        conn.packets += 1;

        let reply = match self.dispatcher.try_dispatch(&mut self.catalog, &packet) {
            Ok(reply) => reply,
            Err(err) => {
                self.metrics.storage_error();
                error_reply(packet.op, &err)
            }
        };

        match conn.outbox.try_send(reply) {
            Ok(()) => {
                conn.transition(SlotState::Reading);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(OdbError::Backpressure(conn.outbox.max_capacity())),
            Err(TrySendError::Closed(_)) => Err(OdbError::ConnectionClosed),
        }
    }

    fn close(&mut self, id: SlotId) {
        self.readers.remove(&id);
        if let Some(mut conn) = self.slots.remove(id) {
            conn.transition(SlotState::Closing);
            self.metrics.connection_closed();
            debug!(slot = %conn.id, packets = conn.packets, "Released slot");
            // dropping the outbox lets the writer flush what is queued and exit
        }
    }

    async fn shutdown(mut self) -> Result<()> {
        let connections = self.slots.drain();
        let open = connections.len();
        self.readers = StreamMap::new();

        let writers: Vec<_> = connections
            .into_iter()
            .map(|mut conn| {
                conn.transition(SlotState::Closing);
                self.metrics.connection_closed();
                conn.writer
            })
            .collect();

        if tokio::time::timeout(
            self.config.server.shutdown_timeout,
            futures::future::join_all(writers),
        )
        .await
        .is_err()
        {
            warn!("Shutdown timeout reached, abandoning pending replies");
        }
        info!(connections = open, "Closed client connections");

        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => info!(path = %self.socket_path.display(), "Removed socket file"),
            Err(e) => {
                error!(error = %e, path = %self.socket_path.display(), "Failed to remove socket file")
            }
        }

        if self.config.storage.persist {
            let written = self
                .catalog
                .flush_snapshots(&self.config.storage.snapshot_file)?;
            info!(buckets = written, "Flushed drum snapshots");
        }

        self.metrics.log_metrics();
        Ok(())
    }
}

/// Remove a socket left behind by a previous run; refuse to touch anything else.
fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            debug!(path = %path.display(), "Removed stale socket");
            Ok(())
        }
        Ok(_) => Err(OdbError::ConfigError(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_transitions() {
        use SlotState::*;
        assert!(Accepted.can_transition_to(Reading));
        assert!(Reading.can_transition_to(Dispatching));
        assert!(Dispatching.can_transition_to(Reading));
        assert!(Dispatching.can_transition_to(Closing));
        assert!(!Accepted.can_transition_to(Dispatching));
        assert!(!Closing.can_transition_to(Reading));
    }

    #[test]
    fn regular_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odb.d");
        std::fs::write(&path, b"not a socket").unwrap();

        assert!(matches!(
            remove_stale_socket(&path),
            Err(OdbError::ConfigError(_))
        ));
        assert!(path.exists());
        assert!(remove_stale_socket(&dir.path().join("missing")).is_ok());
    }
}
