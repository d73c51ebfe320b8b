//! Registry account API and token resolution

pub mod client;
pub mod tokens;

pub use client::RegistryClient;
pub use tokens::{TokenResolver, TokenSource, held_token};
