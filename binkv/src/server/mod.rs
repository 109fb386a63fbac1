pub mod client_handler;
pub mod handler;
pub mod memc_tcp;
pub mod timer;
