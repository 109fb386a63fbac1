use crate::cache::error::CacheError;
use crate::memcache::store;
use crate::protocol::binary::encoder::storage_error_to_response;
use crate::protocol::binary::{decoder, encoder, network};
use crate::version::BINKV_VERSION;
use bytes::Bytes;
use std::sync::Arc;

const EXTRAS_LENGTH: u8 = 4;

fn into_record_meta(request_header: &network::RequestHeader, expiration: u32) -> store::Meta {
    store::Meta::new(request_header.cas, 0, expiration)
}

/// Quiet get suppresses the response on a plain miss; every other
/// outcome still goes out.
fn into_quiet_get(response: encoder::BinaryResponse) -> Option<encoder::BinaryResponse> {
    if let encoder::BinaryResponse::Error(response) = &response {
        if response.header.status == CacheError::NotFound as u16 {
            return None;
        }
    }
    Some(response)
}

/// Maps a decoded request onto the storage engine and builds the
/// response frame. Purely synchronous, one request in, at most one
/// response out.
pub struct BinaryHandler {
    storage: Arc<store::MemcStore>,
}

impl BinaryHandler {
    pub fn new(store: Arc<store::MemcStore>) -> BinaryHandler {
        BinaryHandler { storage: store }
    }

    pub fn handle_request(&self, req: decoder::BinaryRequest) -> Option<encoder::BinaryResponse> {
        let request_header = req.get_header();
        let mut response_header =
            network::ResponseHeader::new(request_header.opcode, request_header.opaque);

        match req {
            decoder::BinaryRequest::Delete(delete_request) => {
                Some(self.delete(delete_request, &mut response_header))
            }
            decoder::BinaryRequest::Flush(flush_request) => {
                Some(self.flush(flush_request, &mut response_header))
            }
            decoder::BinaryRequest::Get(get_request) => {
                Some(self.get(get_request, &mut response_header))
            }
            decoder::BinaryRequest::GetQuietly(get_quiet_req) => {
                into_quiet_get(self.get(get_quiet_req, &mut response_header))
            }
            decoder::BinaryRequest::Increment(inc_request) => {
                Some(self.increment(inc_request, &mut response_header))
            }
            decoder::BinaryRequest::Decrement(dec_request) => {
                Some(self.decrement(dec_request, &mut response_header))
            }
            decoder::BinaryRequest::Noop(_noop_request) => {
                Some(encoder::BinaryResponse::Noop(network::NoopResponse {
                    header: response_header,
                }))
            }
            decoder::BinaryRequest::Stats(_stat_request) => {
                // no stats are kept, the stream is just its terminal
                // empty-key marker
                Some(encoder::BinaryResponse::Stats(network::StatsResponse {
                    header: response_header,
                    key: Bytes::new(),
                    value: Bytes::new(),
                }))
            }
            decoder::BinaryRequest::Quit(_quit_req) => {
                Some(encoder::BinaryResponse::Quit(network::QuitResponse {
                    header: response_header,
                }))
            }
            decoder::BinaryRequest::Set(set_req) => {
                let response = self.set(set_req, &mut response_header);
                Some(response)
            }
            decoder::BinaryRequest::Add(req) | decoder::BinaryRequest::Replace(req) => {
                Some(self.add_replace(req, &mut response_header))
            }
            decoder::BinaryRequest::Append(append_req)
            | decoder::BinaryRequest::Prepend(append_req) => {
                let response = self.append_prepend(append_req, &mut response_header);
                Some(response)
            }
            decoder::BinaryRequest::Version(_version_request) => {
                response_header.body_length = BINKV_VERSION.len() as u32;
                Some(encoder::BinaryResponse::Version(network::VersionResponse {
                    header: response_header,
                    version: String::from(BINKV_VERSION),
                }))
            }
            decoder::BinaryRequest::ItemTooLarge(_set_request) => Some(storage_error_to_response(
                CacheError::ValueTooLarge,
                &mut response_header,
            )),
            decoder::BinaryRequest::Unknown(_request) => Some(storage_error_to_response(
                CacheError::UnknownCommand,
                &mut response_header,
            )),
        }
    }

    fn add_replace(
        &self,
        request: network::SetRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let record = store::Record::new(
            request.value,
            request.header.cas,
            request.flags,
            request.expiration,
        );
        let result = if self.is_add_command(request.header.opcode) {
            self.storage.add(request.key, record)
        } else {
            self.storage.replace(request.key, record)
        };

        match result {
            Ok(command_status) => {
                response_header.cas = command_status.cas;
                encoder::BinaryResponse::Set(network::SetResponse {
                    header: *response_header,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn is_add_command(&self, opcode: u8) -> bool {
        opcode == network::Command::Add as u8
    }

    fn append_prepend(
        &self,
        append_req: network::AppendRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let record = store::Record::new(append_req.value, append_req.header.cas, 0, 0);
        let result = if self.is_append(append_req.header.opcode) {
            self.storage.append(append_req.key, record)
        } else {
            self.storage.prepend(append_req.key, record)
        };

        match result {
            Ok(status) => {
                response_header.cas = status.cas;
                encoder::BinaryResponse::Append(network::AppendResponse {
                    header: *response_header,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn is_append(&self, opcode: u8) -> bool {
        opcode == network::Command::Append as u8
    }

    fn set(
        &self,
        set_req: network::SetRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let record = store::Record::new(
            set_req.value,
            set_req.header.cas,
            set_req.flags,
            set_req.expiration,
        );

        match self.storage.set(set_req.key, record) {
            Ok(status) => {
                response_header.cas = status.cas;
                encoder::BinaryResponse::Set(network::SetResponse {
                    header: *response_header,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn delete(
        &self,
        delete_request: network::DeleteRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let result = self.storage.delete(
            delete_request.key,
            into_record_meta(&delete_request.header, delete_request.hold_seconds),
        );
        match result {
            Ok(_record) => encoder::BinaryResponse::Delete(network::DeleteResponse {
                header: *response_header,
            }),
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn get(
        &self,
        get_request: network::GetRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let result = self.storage.get(&get_request.key);

        match result {
            Ok(record) => {
                response_header.body_length = record.value.len() as u32 + EXTRAS_LENGTH as u32;
                response_header.extras_length = EXTRAS_LENGTH;
                response_header.cas = record.header.cas;
                encoder::BinaryResponse::Get(network::GetResponse {
                    header: *response_header,
                    flags: record.header.flags,
                    value: record.value,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn flush(
        &self,
        flush_request: network::FlushRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let meta: store::Meta = store::Meta::new(0, 0, flush_request.delay);
        self.storage.flush(meta);
        encoder::BinaryResponse::Flush(network::FlushResponse {
            header: *response_header,
        })
    }

    fn increment(
        &self,
        inc_request: network::IncrementRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let delta = store::IncrementParam {
            delta: inc_request.delta,
            value: inc_request.initial,
        };

        let result = self.storage.increment(
            into_record_meta(&inc_request.header, inc_request.expiration),
            inc_request.key,
            delta,
        );
        match result {
            Ok(delta_result) => {
                response_header.body_length =
                    std::mem::size_of::<store::DeltaResultValueType>() as u32;
                response_header.cas = delta_result.cas;
                encoder::BinaryResponse::Increment(network::IncrementResponse {
                    header: *response_header,
                    value: delta_result.value,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }

    fn decrement(
        &self,
        dec_request: network::IncrementRequest,
        response_header: &mut network::ResponseHeader,
    ) -> encoder::BinaryResponse {
        let delta = store::IncrementParam {
            delta: dec_request.delta,
            value: dec_request.initial,
        };

        let result = self.storage.decrement(
            into_record_meta(&dec_request.header, dec_request.expiration),
            dec_request.key,
            delta,
        );
        match result {
            Ok(delta_result) => {
                response_header.body_length =
                    std::mem::size_of::<store::DeltaResultValueType>() as u32;
                response_header.cas = delta_result.cas;
                encoder::BinaryResponse::Decrement(network::DecrementResponse {
                    header: *response_header,
                    value: delta_result.value,
                })
            }
            Err(err) => storage_error_to_response(err, response_header),
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::mock::mock_server::{create_storage, MockSystemTimer, StoreWithMockTimer};
    use crate::protocol::binary::decoder::BinaryRequest;

    pub const OPAQUE_VALUE: u32 = 0xABAD_CAFE;

    pub struct HandlerWithTimer {
        pub handler: BinaryHandler,
        pub timer: Arc<MockSystemTimer>,
    }

    pub fn create_handler() -> HandlerWithTimer {
        let StoreWithMockTimer { timer, memc_store } = create_storage();
        HandlerWithTimer {
            handler: BinaryHandler::new(memc_store),
            timer,
        }
    }

    pub fn create_header(opcode: network::Command, key: &[u8]) -> network::RequestHeader {
        network::RequestHeader {
            magic: network::Magic::Request as u8,
            opcode: opcode as u8,
            key_length: key.len() as u16,
            extras_length: 0,
            data_type: 0,
            reserved: 0,
            body_length: 0,
            opaque: OPAQUE_VALUE,
            cas: 0,
        }
    }

    pub fn get_value(handler: &BinaryHandler, key: Bytes) -> Bytes {
        let header = create_header(network::Command::Get, &key);
        let request = decoder::BinaryRequest::Get(network::GetRequest { header, key });

        let result = handler.handle_request(request);
        match result {
            Some(resp) => {
                if let encoder::BinaryResponse::Get(response) = resp {
                    assert_ne!(response.header.cas, 0);
                    response.value
                } else {
                    unreachable!();
                }
            }
            None => unreachable!(),
        }
    }

    pub fn create_set_request(key: Bytes, value: Bytes) -> BinaryRequest {
        let header = create_header(network::Command::Set, &key);
        const FLAGS: u32 = 0xDEAD_BEEF;
        decoder::BinaryRequest::Set(network::SetRequest {
            header,
            key,
            flags: FLAGS,
            expiration: 0,
            value,
        })
    }

    pub fn insert_value(handler: &BinaryHandler, key: Bytes, value: Bytes) {
        let result = handler.handle_request(create_set_request(key, value));
        match result {
            Some(encoder::BinaryResponse::Set(response)) => {
                assert_ne!(response.header.cas, 0);
            }
            _ => unreachable!(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn check_header(
        response: &network::ResponseHeader,
        opcode: network::Command,
        key_length: u16,
        extras_length: u8,
        data_type: u8,
        status: u16,
        body_length: u32,
    ) {
        assert_eq!(response.magic, network::Magic::Response as u8);
        assert_eq!(response.opcode, opcode as u8);
        assert_eq!(response.key_length, key_length);
        assert_eq!(response.extras_length, extras_length);
        assert_eq!(response.data_type, data_type);
        assert_eq!(response.status, status);
        assert_eq!(response.body_length, body_length);
        assert_eq!(response.opaque, OPAQUE_VALUE);
    }
}
