//! # Sample Services
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide gRPC server definitions
//! and a descriptor set for integration testing `rpcroute_core`.
//! It is not intended for production use.
//!
//! Both `helloworld.Greeter` and `routeguide.RouteGuide` are compiled into the same
//! [`FILE_DESCRIPTOR_SET`], so a single module load can bind more than one service group.

pub mod helloworld {
    include!(concat!(env!("OUT_DIR"), "/helloworld.rs"));
}

pub mod routeguide {
    include!(concat!(env!("OUT_DIR"), "/routeguide.rs"));
}

pub use helloworld::greeter_server::{Greeter, GreeterServer};
pub use routeguide::route_guide_server::{RouteGuide, RouteGuideServer};

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
