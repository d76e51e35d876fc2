//! Tokio codec that frames [`Packet`]s over a byte stream.
//!
//! The codec keeps no state of its own: the residual bytes of a partially
//! received packet live in the `BytesMut` owned by `FramedRead`, so packets
//! coalesced or fragmented by the transport come out one at a time, in order.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::packet::{Header, Packet, HEADER_LEN};
use crate::error::{OdbError, Result};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_payload: usize,
}

impl PacketCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = OdbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        let header = match Header::parse(&src[..], self.max_payload)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let frame_len = header.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len);
        let payload = frame.split_off(HEADER_LEN).freeze();

        Ok(Some(Packet {
            op: header.op,
            datatype: header.datatype,
            payload,
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = OdbError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.payload.len() > self.max_payload {
            return Err(OdbError::OversizedPacket(packet.payload.len() as u64));
        }

        dst.reserve(packet.encoded_len());
        packet.header().write_to(dst);
        dst.extend_from_slice(&packet.payload);
        Ok(())
    }
}
