//! Minimal binary protocol client used by the integration tests and
//! available as a library API. One outstanding request at a time, plus
//! a pipelined multi-get built from quiet gets.

pub mod response_decoder;

use crate::cache::error::CacheError;
use crate::protocol::binary::network;

use bytes::{BufMut, Bytes, BytesMut};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use response_decoder::{ResponseDecoder, ResponseFrame};
use std::fmt;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Decoder;
use tracing::debug;

/// Terminal opaque of a pipelined multi-get.
const MULTI_GET_SENTINEL: u32 = 0xffff_ffff;

#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// The server answered with a non-zero status.
    Server { status: u16, message: String },
    /// The byte stream violated the framing rules.
    Protocol(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "io error: {}", err),
            ClientError::Server { status, message } => {
                write!(f, "server status {:#06x}: {}", status, message)
            }
            ClientError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Io(err)
    }
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(CacheError::NotFound as u16)
    }

    pub fn is_key_exists(&self) -> bool {
        self.status() == Some(CacheError::KeyExists as u16)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A value fetched from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct GetValue {
    pub value: Bytes,
    pub flags: u32,
    pub cas: u64,
}

pub struct CacheClient {
    stream: TcpStream,
    decoder: ResponseDecoder,
    buffer: BytesMut,
    rng: SmallRng,
}

impl CacheClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<CacheClient> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(CacheClient {
            stream,
            decoder: ResponseDecoder::new(),
            buffer: BytesMut::with_capacity(4096),
            rng: SmallRng::from_os_rng(),
        })
    }

    pub async fn get(&mut self, key: &[u8]) -> Result<GetValue> {
        let opaque = self.next_opaque();
        self.send_request(network::Command::Get, opaque, 0, &[], key, &[])
            .await?;
        let frame = self.expect_frame(network::Command::Get as u8, opaque).await?;
        Self::into_get_value(frame)
    }

    pub async fn set(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        expiration: u32,
        cas: u64,
    ) -> Result<u64> {
        self.store_command(network::Command::Set, key, value, flags, expiration, cas)
            .await
    }

    pub async fn add(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        expiration: u32,
    ) -> Result<u64> {
        self.store_command(network::Command::Add, key, value, flags, expiration, 0)
            .await
    }

    pub async fn replace(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        expiration: u32,
        cas: u64,
    ) -> Result<u64> {
        self.store_command(network::Command::Replace, key, value, flags, expiration, cas)
            .await
    }

    pub async fn append(&mut self, key: &[u8], value: &[u8], cas: u64) -> Result<u64> {
        self.concat_command(network::Command::Append, key, value, cas)
            .await
    }

    pub async fn prepend(&mut self, key: &[u8], value: &[u8], cas: u64) -> Result<u64> {
        self.concat_command(network::Command::Prepend, key, value, cas)
            .await
    }

    /// Deletes a key; `hold_seconds > 0` leaves a hold behind that
    /// blocks add/replace until it expires.
    pub async fn delete(&mut self, key: &[u8], hold_seconds: u32) -> Result<()> {
        let opaque = self.next_opaque();
        let mut extras = [0u8; 4];
        extras.copy_from_slice(&hold_seconds.to_be_bytes());
        self.send_request(network::Command::Delete, opaque, 0, &extras, key, &[])
            .await?;
        self.expect_frame(network::Command::Delete as u8, opaque)
            .await?;
        Ok(())
    }

    pub async fn increment(
        &mut self,
        key: &[u8],
        delta: u64,
        initial: u64,
        expiration: u32,
    ) -> Result<u64> {
        self.counter_command(network::Command::Increment, key, delta, initial, expiration)
            .await
    }

    pub async fn decrement(
        &mut self,
        key: &[u8],
        delta: u64,
        initial: u64,
        expiration: u32,
    ) -> Result<u64> {
        self.counter_command(network::Command::Decrement, key, delta, initial, expiration)
            .await
    }

    pub async fn flush(&mut self, delay: u32) -> Result<()> {
        let opaque = self.next_opaque();
        let mut extras = [0u8; 4];
        extras.copy_from_slice(&delay.to_be_bytes());
        self.send_request(network::Command::Flush, opaque, 0, &extras, &[], &[])
            .await?;
        self.expect_frame(network::Command::Flush as u8, opaque)
            .await?;
        Ok(())
    }

    pub async fn noop(&mut self) -> Result<()> {
        let opaque = self.next_opaque();
        self.send_request(network::Command::Noop, opaque, 0, &[], &[], &[])
            .await?;
        self.expect_frame(network::Command::Noop as u8, opaque).await?;
        Ok(())
    }

    pub async fn version(&mut self) -> Result<String> {
        let opaque = self.next_opaque();
        self.send_request(network::Command::Version, opaque, 0, &[], &[], &[])
            .await?;
        let frame = self
            .expect_frame(network::Command::Version as u8, opaque)
            .await?;
        String::from_utf8(frame.value.to_vec())
            .map_err(|_| ClientError::Protocol("version is not valid utf-8".to_string()))
    }

    /// Reads the stats stream up to its terminal empty-key marker.
    pub async fn stats(&mut self) -> Result<Vec<(String, String)>> {
        let opaque = self.next_opaque();
        self.send_request(network::Command::Stat, opaque, 0, &[], &[], &[])
            .await?;
        let mut stats = Vec::new();
        loop {
            let frame = self.expect_frame(network::Command::Stat as u8, opaque).await?;
            if frame.key.is_empty() {
                return Ok(stats);
            }
            let key = String::from_utf8(frame.key.to_vec())
                .map_err(|_| ClientError::Protocol("stat key is not valid utf-8".to_string()))?;
            let value = String::from_utf8(frame.value.to_vec())
                .map_err(|_| ClientError::Protocol("stat value is not valid utf-8".to_string()))?;
            stats.push((key, value));
        }
    }

    pub async fn quit(&mut self) -> Result<()> {
        let opaque = self.next_opaque();
        self.send_request(network::Command::Quit, opaque, 0, &[], &[], &[])
            .await?;
        self.expect_frame(network::Command::Quit as u8, opaque).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Fetches many keys in one round trip: a quiet get per key with the
    /// key index as opaque, terminated by a noop. Missing keys produce
    /// no frame at all, so the noop is what flushes the pipeline.
    pub async fn multi_get(&mut self, keys: &[&[u8]]) -> Result<Vec<Option<GetValue>>> {
        let mut pipeline = BytesMut::with_capacity(keys.len() * 32 + 24);
        for (index, key) in keys.iter().enumerate() {
            Self::write_request_to(
                &mut pipeline,
                network::Command::GetQuiet,
                index as u32,
                0,
                &[],
                key,
                &[],
            );
        }
        Self::write_request_to(
            &mut pipeline,
            network::Command::Noop,
            MULTI_GET_SENTINEL,
            0,
            &[],
            &[],
            &[],
        );
        self.stream.write_all(&pipeline).await?;

        let mut values: Vec<Option<GetValue>> = vec![None; keys.len()];
        loop {
            let frame = self.read_frame().await?;
            if frame.header.opcode == network::Command::Noop as u8 {
                if frame.header.opaque != MULTI_GET_SENTINEL {
                    return Err(ClientError::Protocol(
                        "unexpected noop in multi-get pipeline".to_string(),
                    ));
                }
                return Ok(values);
            }
            if frame.header.opcode != network::Command::GetQuiet as u8 {
                return Err(ClientError::Protocol(format!(
                    "unexpected opcode {:#04x} in multi-get pipeline",
                    frame.header.opcode
                )));
            }
            if frame.header.status != network::ResponseStatus::Success as u16 {
                // misses carry no frame at all, anything else is a real error
                return Err(ClientError::Server {
                    status: frame.header.status,
                    message: String::from_utf8_lossy(&frame.value).into_owned(),
                });
            }
            let index = frame.header.opaque as usize;
            if index >= keys.len() {
                return Err(ClientError::Protocol(
                    "multi-get opaque out of range".to_string(),
                ));
            }
            values[index] = Some(Self::into_get_value(frame)?);
        }
    }

    async fn store_command(
        &mut self,
        command: network::Command,
        key: &[u8],
        value: &[u8],
        flags: u32,
        expiration: u32,
        cas: u64,
    ) -> Result<u64> {
        let opaque = self.next_opaque();
        let mut extras = [0u8; 8];
        extras[0..4].copy_from_slice(&flags.to_be_bytes());
        extras[4..8].copy_from_slice(&expiration.to_be_bytes());
        self.send_request(command, opaque, cas, &extras, key, value)
            .await?;
        let frame = self.expect_frame(command as u8, opaque).await?;
        Ok(frame.header.cas)
    }

    async fn concat_command(
        &mut self,
        command: network::Command,
        key: &[u8],
        value: &[u8],
        cas: u64,
    ) -> Result<u64> {
        let opaque = self.next_opaque();
        self.send_request(command, opaque, cas, &[], key, value)
            .await?;
        let frame = self.expect_frame(command as u8, opaque).await?;
        Ok(frame.header.cas)
    }

    async fn counter_command(
        &mut self,
        command: network::Command,
        key: &[u8],
        delta: u64,
        initial: u64,
        expiration: u32,
    ) -> Result<u64> {
        let opaque = self.next_opaque();
        let mut extras = [0u8; 20];
        extras[0..8].copy_from_slice(&delta.to_be_bytes());
        extras[8..16].copy_from_slice(&initial.to_be_bytes());
        extras[16..20].copy_from_slice(&expiration.to_be_bytes());
        self.send_request(command, opaque, 0, &extras, key, &[])
            .await?;
        let frame = self.expect_frame(command as u8, opaque).await?;
        if frame.value.len() != 8 {
            return Err(ClientError::Protocol(format!(
                "counter response body has {} bytes, expected 8",
                frame.value.len()
            )));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&frame.value);
        Ok(u64::from_be_bytes(buf))
    }

    fn into_get_value(frame: ResponseFrame) -> Result<GetValue> {
        if frame.extras.len() != 4 {
            return Err(ClientError::Protocol(format!(
                "get response extras have {} bytes, expected 4",
                frame.extras.len()
            )));
        }
        let mut flags = [0u8; 4];
        flags.copy_from_slice(&frame.extras);
        Ok(GetValue {
            value: frame.value,
            flags: u32::from_be_bytes(flags),
            cas: frame.header.cas,
        })
    }

    async fn send_request(
        &mut self,
        command: network::Command,
        opaque: u32,
        cas: u64,
        extras: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let mut dst = BytesMut::with_capacity(24 + extras.len() + key.len() + value.len());
        Self::write_request_to(&mut dst, command, opaque, cas, extras, key, value);
        self.stream.write_all(&dst).await?;
        Ok(())
    }

    fn write_request_to(
        dst: &mut BytesMut,
        command: network::Command,
        opaque: u32,
        cas: u64,
        extras: &[u8],
        key: &[u8],
        value: &[u8],
    ) {
        let body_length = (extras.len() + key.len() + value.len()) as u32;
        dst.put_u8(network::Magic::Request as u8);
        dst.put_u8(command as u8);
        dst.put_u16(key.len() as u16);
        dst.put_u8(extras.len() as u8);
        dst.put_u8(network::DataTypes::RawBytes as u8);
        dst.put_u16(0);
        dst.put_u32(body_length);
        dst.put_u32(opaque);
        dst.put_u64(cas);
        dst.put_slice(extras);
        dst.put_slice(key);
        dst.put_slice(value);
    }

    /// Next response frame for the given opcode/opaque; a non-zero
    /// status becomes a ClientError::Server.
    async fn expect_frame(&mut self, opcode: u8, opaque: u32) -> Result<ResponseFrame> {
        let frame = self.read_frame().await?;
        if frame.header.opcode != opcode {
            return Err(ClientError::Protocol(format!(
                "response opcode {:#04x} does not match request {:#04x}",
                frame.header.opcode, opcode
            )));
        }
        if frame.header.opaque != opaque {
            return Err(ClientError::Protocol(
                "response opaque does not match request".to_string(),
            ));
        }
        if frame.header.status != network::ResponseStatus::Success as u16 {
            return Err(ClientError::Server {
                status: frame.header.status,
                message: String::from_utf8_lossy(&frame.value).into_owned(),
            });
        }
        Ok(frame)
    }

    async fn read_frame(&mut self) -> Result<ResponseFrame> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buffer)? {
                debug!("Got response {:?}", frame.header);
                return Ok(frame);
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return Err(ClientError::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "Connection reset by peer",
                )));
            }
        }
    }

    fn next_opaque(&mut self) -> u32 {
        // the sentinel is reserved for the multi-get terminator
        self.rng.random_range(0..MULTI_GET_SENTINEL)
    }
}
