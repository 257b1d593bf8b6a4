//! Bluetooth Mesh transport stack for a client that reaches the mesh through a GATT proxy node.
//! PDUs are encoded and decoded layer by layer (proxy, network, lower transport, upper transport,
//! access) and [`stack::MeshStack`] ties the layers together with per destination transactions,
//! segmentation and reassembly timers.
//Might re-enable clippy::restriction later.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    dead_code,
    clippy::cast_possible_truncation,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]

extern crate alloc;

pub mod bytes;
pub mod random;
pub mod scheduler;

// Timestamp depends on std or some other provided clock.
mod timestamp;

pub mod access;
pub mod address;
pub mod config;
pub mod control;
pub mod crypto;
pub mod device_state;
pub mod lower;
pub mod mesh;
pub mod models;
pub mod net;
pub mod proxy;
pub mod reassembler;
pub mod resolver;
pub mod segmenter;
pub mod upper;

pub mod stack;
