use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::core::codec::PacketCodec;
use crate::core::packet::{Datatype, Operation, Packet};
use crate::core::serialization::{decode_body, encode_body, QueryBody, Status, StoreBody};
use crate::error::{constants, OdbError, Result};
use crate::transport::local::connect;
use crate::utils::timeout::{with_timeout, DEFAULT_TIMEOUT};

/// Typed client for a running daemon
///
/// Requests are answered strictly in order, so every call sends one packet
/// and waits for exactly one reply.
pub struct Client {
    framed: Framed<UnixStream, PacketCodec>,
    response_timeout: Duration,
}

impl Client {
    /// Connect to the daemon at `path`
    #[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_framed(connect(path).await?))
    }

    /// Wrap an already connected stream
    pub fn from_framed(framed: Framed<UnixStream, PacketCodec>) -> Self {
        Self {
            framed,
            response_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// How long to wait for each reply
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Send a raw packet without waiting
    pub async fn send(&mut self, packet: Packet) -> Result<()> {
        self.framed.send(packet).await
    }

    /// Receive the next reply
    pub async fn receive(&mut self) -> Result<Packet> {
        let next = with_timeout(self.response_timeout, async {
            Ok(self.framed.next().await)
        })
        .await?;

        match next {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => Err(e),
            None => Err(OdbError::ConnectionClosed),
        }
    }

    /// Send a packet and wait for its reply
    pub async fn request(&mut self, packet: Packet) -> Result<Packet> {
        let op = packet.op;
        self.send(packet).await?;
        let reply = self.receive().await?;
        if reply.op != op {
            return Err(OdbError::UnexpectedResponse(format!(
                "{}: expected {}, got {}",
                constants::ERR_UNEXPECTED_RESPONSE,
                op.name(),
                reply.op.name()
            )));
        }
        Ok(reply)
    }

    /// Round-trip a `nop`
    pub async fn nop(&mut self) -> Result<()> {
        self.request(Packet::empty(Operation::Nop, Datatype::None))
            .await
            .map(|_| ())
    }

    /// Store `value` under `key`, replacing any previous value
    pub async fn store(
        &mut self,
        drum: &str,
        key: &[u8],
        datatype: Datatype,
        value: &[u8],
    ) -> Result<()> {
        self.write(Operation::Store, drum, key, datatype, value).await
    }

    /// Store `value` under `key`, failing with `AlreadyExists` if it is taken
    pub async fn create(
        &mut self,
        drum: &str,
        key: &[u8],
        datatype: Datatype,
        value: &[u8],
    ) -> Result<()> {
        self.write(Operation::Create, drum, key, datatype, value).await
    }

    /// Fetch the value stored under `key`, with the datatype it was stored as
    pub async fn query(&mut self, drum: &str, key: &[u8]) -> Result<(Datatype, Bytes)> {
        let body = QueryBody {
            drum: drum.to_string(),
            key: key.to_vec(),
        };
        let packet = Packet::new(Operation::Query, Datatype::None, encode_body(&body)?)?;
        let reply = self.request(packet).await?;

        if reply.datatype == Datatype::Status {
            return Err(match expect_status(&reply)?.into_result() {
                Ok(()) => OdbError::UnexpectedResponse("query answered without a value".into()),
                Err(err) => err.into(),
            });
        }
        debug!(bytes = reply.payload.len(), "Query hit");
        Ok((reply.datatype, reply.payload))
    }

    async fn write(
        &mut self,
        op: Operation,
        drum: &str,
        key: &[u8],
        datatype: Datatype,
        value: &[u8],
    ) -> Result<()> {
        let body = StoreBody {
            drum: drum.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        };
        let packet = Packet::new(op, datatype, encode_body(&body)?)?;
        let reply = self.request(packet).await?;
        Ok(expect_status(&reply)?.into_result()?)
    }
}

fn expect_status(reply: &Packet) -> Result<Status> {
    if reply.datatype != Datatype::Status {
        return Err(OdbError::UnexpectedResponse(format!(
            "{}: expected status, got {:?}",
            constants::ERR_UNEXPECTED_RESPONSE,
            reply.datatype
        )));
    }
    decode_body(&reply.payload)
        .map_err(|e| OdbError::UnexpectedResponse(format!("bad status body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_replies_are_recognised() {
        let reply = crate::protocol::status_reply(Operation::Store, &Status::Ok);
        assert_eq!(expect_status(&reply).unwrap(), Status::Ok);

        let raw = Packet::new(Operation::Query, Datatype::Text, b"hi".to_vec()).unwrap();
        assert!(matches!(
            expect_status(&raw),
            Err(OdbError::UnexpectedResponse(_))
        ));
    }
}
