#[macro_use]
extern crate log;

extern crate num_derive;
pub mod cache;
pub mod client;
pub mod memcache;
pub mod memory_store;
pub mod protocol;
pub mod server;
pub mod version;

#[cfg(test)]
mod mock;
