use crate::core::packet::{Datatype, Operation, Packet};
use crate::core::serialization::{decode_body, encode_body, QueryBody, Status, StoreBody};
use crate::error::StorageError;
use crate::storage::catalog::Catalog;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

pub type HandlerResult = std::result::Result<Packet, StorageError>;
pub type HandlerFn = dyn Fn(&mut Catalog, &Packet) -> HandlerResult + Send + Sync + 'static;

/// Routes decoded packets to per-operation handlers.
///
/// Every dispatch produces exactly one reply packet; storage failures become
/// `status` replies carrying the error code.
pub struct Dispatcher {
    handlers: HashMap<Operation, Box<HandlerFn>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher with the built-in handlers for every operation
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(Operation::Nop, handle_nop);
        dispatcher.register(Operation::Store, handle_store);
        dispatcher.register(Operation::Query, handle_query);
        dispatcher.register(Operation::Create, handle_create);
        dispatcher
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Install or replace the handler for `op`
    pub fn register<F>(&mut self, op: Operation, handler: F)
    where
        F: Fn(&mut Catalog, &Packet) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.insert(op, Box::new(handler));
    }

    /// Run the handler for `packet`, returning the storage failure unmapped
    pub fn try_dispatch(&self, catalog: &mut Catalog, packet: &Packet) -> HandlerResult {
        match self.handlers.get(&packet.op) {
            Some(handler) => handler(catalog, packet),
            None => Err(StorageError::invalid(format!(
                "no handler for {}",
                packet.op.name()
            ))),
        }
    }

    /// Run the handler for `packet`; failures become a `status` reply
    #[instrument(skip_all, fields(op = packet.op.name()))]
    pub fn dispatch(&self, catalog: &mut Catalog, packet: &Packet) -> Packet {
        self.try_dispatch(catalog, packet)
            .unwrap_or_else(|err| error_reply(packet.op, &err))
    }
}

/// The `status` reply sent back for a failed request
pub fn error_reply(op: Operation, err: &StorageError) -> Packet {
    debug!(op = op.name(), error = %err, "Request failed");
    status_reply(op, &Status::from_error(err))
}

/// Build a `status` reply for `op`
pub fn status_reply(op: Operation, status: &Status) -> Packet {
    let payload = match encode_body(status) {
        Ok(body) => Bytes::from(body),
        Err(e) => {
            error!(op = op.name(), error = %e, "Failed to encode status body");
            Bytes::new()
        }
    };
    Packet {
        op,
        datatype: Datatype::Status,
        payload,
    }
}

fn handle_nop(_: &mut Catalog, _: &Packet) -> HandlerResult {
    Ok(Packet::empty(Operation::Nop, Datatype::None))
}

fn handle_store(catalog: &mut Catalog, packet: &Packet) -> HandlerResult {
    let body: StoreBody = decode_body(&packet.payload)?;
    let drum = catalog.get_mut(&body.drum)?;
    let outcome = drum
        .store_mut()
        .put(&body.key, packet.datatype, &body.value)?;
    debug!(drum = %body.drum, bytes = body.value.len(), ?outcome, "Stored bucket");
    Ok(status_reply(Operation::Store, &Status::Ok))
}

fn handle_create(catalog: &mut Catalog, packet: &Packet) -> HandlerResult {
    let body: StoreBody = decode_body(&packet.payload)?;
    let drum = catalog.get_mut(&body.drum)?;
    drum.store_mut()
        .create(&body.key, packet.datatype, &body.value)?;
    debug!(drum = %body.drum, bytes = body.value.len(), "Created bucket");
    Ok(status_reply(Operation::Create, &Status::Ok))
}

fn handle_query(catalog: &mut Catalog, packet: &Packet) -> HandlerResult {
    let body: QueryBody = decode_body(&packet.payload)?;
    let bucket = catalog.get(&body.drum)?.store().get(&body.key)?;
    Ok(Packet {
        op: Operation::Query,
        datatype: bucket.datatype(),
        payload: bucket.payload().clone(),
    })
}
