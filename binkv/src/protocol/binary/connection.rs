use crate::protocol::binary::decoder::{BinaryRequest, MemcacheBinaryDecoder};
use crate::protocol::binary::encoder::{BinaryResponse, MemcacheBinaryEncoder, ResponseMessage};
use bytes::{Buf, BytesMut};
use std::cmp;
use std::io;
use std::io::{Error, ErrorKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;

pub struct MemcacheBinaryConnection {
    stream: TcpStream,
    decoder: MemcacheBinaryDecoder,
    encoder: MemcacheBinaryEncoder,
    buffer: BytesMut,
}

impl MemcacheBinaryConnection {
    pub fn new(socket: TcpStream, item_size_limit: u32) -> Self {
        MemcacheBinaryConnection {
            stream: socket,
            decoder: MemcacheBinaryDecoder::new(item_size_limit),
            encoder: MemcacheBinaryEncoder::new(),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub async fn read_frame(&mut self) -> Result<Option<BinaryRequest>, io::Error> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough data
            // has been buffered, the frame is returned.
            if let Some(frame) = self.decoder.decode(&mut self.buffer)? {
                match frame {
                    BinaryRequest::ItemTooLarge(request) => {
                        debug!(
                            "Body len {:?} buffer len {:?}",
                            request.header.body_length,
                            self.buffer.len()
                        );
                        // drain the oversized body so the stream stays
                        // aligned on the next header
                        let body_length = request.header.body_length as usize;
                        let buffered = cmp::min(body_length, self.buffer.len());
                        self.buffer.advance(buffered);
                        self.skip_bytes((body_length - buffered) as u32).await?;
                        return Ok(Some(BinaryRequest::ItemTooLarge(request)));
                    }
                    _ => {
                        return Ok(Some(frame));
                    }
                }
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket.
            //
            // On success, the number of bytes is returned. `0` indicates "end
            // of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer. If
                // there is, this means that the peer closed the socket while
                // sending a frame.
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(Error::new(
                        ErrorKind::ConnectionReset,
                        "Connection reset by peer",
                    ));
                }
            }
        }
    }

    async fn skip_bytes(&mut self, bytes: u32) -> io::Result<()> {
        const CHUNK_SIZE: usize = 64 * 1024;
        let mut remaining = bytes as usize;
        let mut buffer = BytesMut::with_capacity(cmp::min(remaining, CHUNK_SIZE));
        debug!("Skip bytes {:?}", bytes);

        while remaining > 0 {
            let bytes_read = self.stream.read_buf(&mut buffer).await?;
            if bytes_read == 0 {
                return Err(Error::new(
                    ErrorKind::ConnectionReset,
                    "Connection reset by peer",
                ));
            }

            if bytes_read > remaining {
                // the tail past the oversized body belongs to the next frame
                self.buffer
                    .extend_from_slice(&buffer[remaining..bytes_read]);
                return Ok(());
            }

            remaining -= bytes_read;
            buffer.clear();
        }
        Ok(())
    }

    pub async fn write(&mut self, msg: &BinaryResponse) -> io::Result<()> {
        let message = self.encoder.encode_message(msg);
        self.write_data_to_stream(message).await?;
        Ok(())
    }

    async fn write_data_to_stream(&mut self, msg: ResponseMessage) -> io::Result<()> {
        self.stream.write_all(&msg.data[..]).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
