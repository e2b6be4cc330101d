//! Identity provider adapters

pub mod backend;

pub use backend::BackendIdentityClient;
