#![doc = include_str!("../README.md")]

//! # Xoroute
//! Rust implementation of a 64-bit XOR-metric peer discovery overlay.

// Public modules
mod common;
mod error;

pub mod config;
pub mod overlay;
pub mod rpc;

pub use crate::common::{
    bucket_capacity, Address, Id, KBucket, Message, Node, Opcode, RoutingTable, Status,
    ADDRESS_SIZE, BACKUP_SLOTS, BUCKET_COUNT, ID_BITS, MESSAGE_SIZE, TABLE_CAPACITY,
};
pub use config::Config;
pub use error::Error;
pub use overlay::Overlay;
pub use rpc::Rpc;

// Alias Result to be the crate Result.
pub type Result<T, E = error::Error> = core::result::Result<T, E>;
