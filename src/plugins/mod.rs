pub mod npm_plugin;

pub use npm_plugin::{NpmCli, TOKEN_ENV};
