pub mod shared_store_state;
pub mod sharded_store;
