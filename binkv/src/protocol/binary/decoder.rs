use crate::protocol::binary::network;
use bytes::{Buf, BytesMut};
use num_traits::FromPrimitive;
use std::io;
use std::io::{Error, ErrorKind};
use tokio_util::codec::Decoder;

/// Client request
#[derive(Debug)]
pub enum BinaryRequest {
    Delete(network::DeleteRequest),
    Get(network::GetRequest),
    GetQuietly(network::GetQuietRequest),
    Set(network::SetRequest),
    Add(network::AddRequest),
    Replace(network::ReplaceRequest),
    Append(network::AppendRequest),
    Prepend(network::PrependRequest),
    Increment(network::IncrementRequest),
    Decrement(network::DecrementRequest),
    Noop(network::NoopRequest),
    Flush(network::FlushRequest),
    Version(network::VersionRequest),
    Quit(network::QuitRequest),
    Stats(network::StatsRequest),
    ItemTooLarge(network::SetRequest),
    /// Opcode outside the command table; body already consumed.
    Unknown(network::Request),
}

impl BinaryRequest {
    pub fn get_header(&'_ self) -> &'_ network::RequestHeader {
        match self {
            BinaryRequest::Delete(request) => &request.header,

            BinaryRequest::Get(request) | BinaryRequest::GetQuietly(request) => &request.header,

            BinaryRequest::Set(request)
            | BinaryRequest::Add(request)
            | BinaryRequest::Replace(request)
            | BinaryRequest::ItemTooLarge(request) => &request.header,

            BinaryRequest::Append(request) | BinaryRequest::Prepend(request) => &request.header,

            BinaryRequest::Increment(request) | BinaryRequest::Decrement(request) => {
                &request.header
            }

            BinaryRequest::Noop(request)
            | BinaryRequest::Version(request)
            | BinaryRequest::Quit(request)
            | BinaryRequest::Stats(request)
            | BinaryRequest::Unknown(request) => &request.header,

            BinaryRequest::Flush(request) => &request.header,
        }
    }
}

#[derive(PartialEq, Debug)]
enum RequestParserState {
    None,
    HeaderParsed,
}

pub struct MemcacheBinaryDecoder {
    header: network::RequestHeader,
    state: RequestParserState,
    item_size_limit: u32,
}

impl MemcacheBinaryDecoder {
    pub fn new(item_size_limit: u32) -> MemcacheBinaryDecoder {
        MemcacheBinaryDecoder {
            header: Default::default(),
            state: RequestParserState::None,
            item_size_limit,
        }
    }

    fn init_parser(&mut self) {
        self.header = Default::default();
        self.state = RequestParserState::None;
    }

    fn parse_header(&mut self, src: &mut BytesMut) -> Result<(), io::Error> {
        if src.len() < MemcacheBinaryDecoder::HEADER_LEN {
            error!("Buffer len is less than MemcacheBinaryDecoder::HEADER_LEN");
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Buffer too small cannot parse header",
            ));
        }

        self.header = network::RequestHeader {
            magic: src.get_u8(),
            opcode: src.get_u8(),
            key_length: src.get_u16(),
            extras_length: src.get_u8(),
            data_type: src.get_u8(),
            reserved: src.get_u16(),
            body_length: src.get_u32(),
            opaque: src.get_u32(),
            cas: src.get_u64(),
        };

        self.state = RequestParserState::HeaderParsed;
        if !self.header_valid() {
            return Err(Error::new(ErrorKind::InvalidData, "Incorrect header"));
        }

        if self.header.body_length > self.item_size_limit {
            return Ok(());
        }

        src.reserve(self.header.body_length as usize);
        Ok(())
    }

    // Only the magic delimits the stream; an unknown opcode is answered
    // with a status response instead of closing the connection.
    fn header_valid(&self) -> bool {
        if self.header.magic != network::Magic::Request as u8 {
            error!("Invalid header: magic != network::Magic::Request");
            return false;
        }
        true
    }

    fn parse_request(&mut self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        if self.state != RequestParserState::HeaderParsed {
            error!("Incorrect parser state ({:?})", self.state);
            return Err(std::io::Error::other(
                "Incorrect parser state, header not parsed".to_string(),
            ));
        }

        if self.header.body_length as usize > src.len() {
            error!(
                "Header body length({:?}) larger than src buffer length({:?})",
                self.header.body_length,
                src.len()
            );
            return Err(std::io::Error::other(
                "Header body length too large".to_string(),
            ));
        }

        let command: Option<network::Command> = FromPrimitive::from_u8(self.header.opcode);
        let result = match command {
            Some(command) => {
                if !self.request_valid(&command) {
                    self.init_parser();
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        "Incorrect request layout",
                    ));
                }
                match command {
                    network::Command::Get | network::Command::GetQuiet => {
                        self.parse_get_request(src)
                    }
                    network::Command::Set | network::Command::Add | network::Command::Replace => {
                        self.parse_set_request(src)
                    }
                    network::Command::Append | network::Command::Prepend => {
                        self.parse_append_prepend_request(src)
                    }
                    network::Command::Delete => self.parse_delete_request(src),
                    network::Command::Increment | network::Command::Decrement => {
                        self.parse_inc_dec_request(src)
                    }
                    network::Command::Flush => self.parse_flush_request(src),
                    network::Command::Noop
                    | network::Command::Quit
                    | network::Command::Version
                    | network::Command::Stat => self.parse_header_only_request(src),
                }
            }
            None => {
                error!("Unknown command opcode: {:?}", self.header.opcode);
                src.advance(self.header.body_length as usize);
                Ok(Some(BinaryRequest::Unknown(network::Request {
                    header: self.header,
                })))
            }
        };
        self.init_parser();
        result
    }

    fn get_value_len(&self) -> usize {
        (self.header.body_length as usize)
            - ((self.header.key_length + self.header.extras_length as u16) as usize)
    }

    fn parse_get_request(&self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        let key = src.split_to(self.header.key_length as usize).freeze();
        if self.header.opcode == network::Command::Get as u8 {
            Ok(Some(BinaryRequest::Get(network::GetRequest {
                header: self.header,
                key,
            })))
        } else {
            Ok(Some(BinaryRequest::GetQuietly(network::GetQuietRequest {
                header: self.header,
                key,
            })))
        }
    }

    fn parse_delete_request(&self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        let hold_seconds = src.get_u32();
        let key = src.split_to(self.header.key_length as usize).freeze();
        Ok(Some(BinaryRequest::Delete(network::DeleteRequest {
            header: self.header,
            hold_seconds,
            key,
        })))
    }

    fn parse_header_only_request(
        &self,
        src: &mut BytesMut,
    ) -> Result<Option<BinaryRequest>, io::Error> {
        // a stat subkey is the only body these commands may carry, it is
        // not interpreted
        src.advance(self.header.body_length as usize);
        let request = network::Request {
            header: self.header,
        };
        if self.header.opcode == network::Command::Noop as u8 {
            Ok(Some(BinaryRequest::Noop(request)))
        } else if self.header.opcode == network::Command::Quit as u8 {
            Ok(Some(BinaryRequest::Quit(request)))
        } else if self.header.opcode == network::Command::Stat as u8 {
            Ok(Some(BinaryRequest::Stats(request)))
        } else {
            Ok(Some(BinaryRequest::Version(request)))
        }
    }

    fn parse_flush_request(&self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        let delay = src.get_u32();
        Ok(Some(BinaryRequest::Flush(network::FlushRequest {
            header: self.header,
            delay,
        })))
    }

    fn parse_append_prepend_request(
        &self,
        src: &mut BytesMut,
    ) -> Result<Option<BinaryRequest>, io::Error> {
        let value_len = self.get_value_len();
        let append_request = network::AppendRequest {
            header: self.header,
            key: src.split_to(self.header.key_length as usize).freeze(),
            value: src.split_to(value_len).freeze(),
        };

        if self.header.opcode == network::Command::Append as u8 {
            Ok(Some(BinaryRequest::Append(append_request)))
        } else {
            Ok(Some(BinaryRequest::Prepend(append_request)))
        }
    }

    fn parse_inc_dec_request(
        &self,
        src: &mut BytesMut,
    ) -> Result<Option<BinaryRequest>, io::Error> {
        let request = network::IncrementRequest {
            header: self.header,
            delta: src.get_u64(),
            initial: src.get_u64(),
            expiration: src.get_u32(),
            key: src.split_to(self.header.key_length as usize).freeze(),
        };

        if self.header.opcode == network::Command::Increment as u8 {
            Ok(Some(BinaryRequest::Increment(request)))
        } else {
            Ok(Some(BinaryRequest::Decrement(request)))
        }
    }

    fn parse_item_too_large(
        &self,
        _src: &mut BytesMut,
    ) -> Result<Option<BinaryRequest>, io::Error> {
        let set_request = network::SetRequest {
            header: self.header,
            flags: 0,
            expiration: 0,
            key: BytesMut::new().freeze(),
            value: BytesMut::new().freeze(),
        };
        Ok(Some(BinaryRequest::ItemTooLarge(set_request)))
    }

    fn parse_set_request(&self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        let value_len = self.get_value_len();
        let set_request = network::SetRequest {
            header: self.header,
            flags: src.get_u32(),
            expiration: src.get_u32(),
            key: src.split_to(self.header.key_length as usize).freeze(),
            value: src.split_to(value_len).freeze(),
        };

        if self.header.opcode == network::Command::Set as u8 {
            Ok(Some(BinaryRequest::Set(set_request)))
        } else if self.header.opcode == network::Command::Add as u8 {
            Ok(Some(BinaryRequest::Add(set_request)))
        } else {
            Ok(Some(BinaryRequest::Replace(set_request)))
        }
    }

    /// Layout checks against the fixed shape of the command. A frame
    /// that fails here leaves the stream untrustworthy, the connection
    /// is closed.
    fn request_valid(&self, command: &network::Command) -> bool {
        if self.header.extras_length != command.extras_length() {
            error!(
                "Invalid extras length: {}, expected {} for opcode {:?}",
                self.header.extras_length,
                command.extras_length(),
                command
            );
            return false;
        }

        if self.header.key_length > 250 {
            return false;
        }

        if command.key_required() && self.header.key_length == 0 {
            return false;
        }

        if !command.key_required()
            && self.header.key_length != 0
            && *command != network::Command::Stat
        {
            return false;
        }

        if self.header.body_length
            < (self.header.key_length + self.header.extras_length as u16) as u32
        {
            return false;
        }

        true
    }
}

impl MemcacheBinaryDecoder {
    const HEADER_LEN: usize = 24;
}

impl Decoder for MemcacheBinaryDecoder {
    type Item = BinaryRequest;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BinaryRequest>, io::Error> {
        if self.state == RequestParserState::None {
            if src.len() < MemcacheBinaryDecoder::HEADER_LEN {
                return Ok(None);
            }
            self.parse_header(src)?
        }

        if self.header.body_length > self.item_size_limit {
            let result = self.parse_item_too_large(src);
            self.init_parser();
            return result;
        }

        if (self.header.body_length as usize) > src.len() {
            return Ok(None);
        }
        self.parse_request(src)
    }
}
