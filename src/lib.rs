//! Object-storage view of a hierarchical filesystem.
//!
//! [`gateway::FsGateway`] exposes the root of a [`adapters::Facade`] as a
//! single bucket and implements [`layer::ObjectLayer`] on top of it:
//! listings fold directories into common prefixes, walks enumerate leaf
//! objects through a channel, and reads, writes and deletes map onto the
//! facade's file operations.

pub mod adapters;
pub mod gateway;
pub mod layer;
pub mod model;
pub mod util;

pub use adapters::{local::LocalFs, Facade};
pub use gateway::{FsGateway, GatewayOptions, WalkErrorPolicy};
pub use layer::ObjectLayer;
pub use model::s3::GatewayError;
