use crate::protocol::binary::network;
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

const HEADER_LEN: usize = 24;

/// A response frame split into its three body sections.
#[derive(Debug)]
pub struct ResponseFrame {
    pub header: network::ResponseHeader,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

/// Decoder for server response frames. Layout violations are fatal,
/// the stream cannot be resynchronized past them.
#[derive(Default)]
pub struct ResponseDecoder {
    header: Option<network::ResponseHeader>,
}

impl ResponseDecoder {
    pub fn new() -> ResponseDecoder {
        ResponseDecoder { header: None }
    }

    fn parse_header(&mut self, src: &mut BytesMut) -> Result<(), io::Error> {
        let header = network::ResponseHeader {
            magic: src.get_u8(),
            opcode: src.get_u8(),
            key_length: src.get_u16(),
            extras_length: src.get_u8(),
            data_type: src.get_u8(),
            status: src.get_u16(),
            body_length: src.get_u32(),
            opaque: src.get_u32(),
            cas: src.get_u64(),
        };

        if header.magic != network::Magic::Response as u8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid magic value: {:?}", header.magic),
            ));
        }
        let sections = header.extras_length as u32 + header.key_length as u32;
        if sections > header.body_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Response body shorter than extras and key",
            ));
        }
        self.header = Some(header);
        Ok(())
    }
}

impl Decoder for ResponseDecoder {
    type Item = ResponseFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ResponseFrame>, io::Error> {
        if self.header.is_none() {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            self.parse_header(src)?;
        }

        let header = match self.header {
            Some(header) => header,
            None => return Ok(None),
        };
        if src.len() < header.body_length as usize {
            return Ok(None);
        }
        self.header = None;

        let extras = src.split_to(header.extras_length as usize).freeze();
        let key = src.split_to(header.key_length as usize).freeze();
        let value_length =
            header.body_length as usize - header.extras_length as usize - header.key_length as usize;
        let value = src.split_to(value_length).freeze();

        Ok(Some(ResponseFrame {
            header,
            extras,
            key,
            value,
        }))
    }
}
