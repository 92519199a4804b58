//! Live access counter: an ephemeral session registry, a best-effort webhook
//! relay, and a reconciler that mirrors the active count onto a Discord channel.

pub mod config;
pub mod display;
pub mod error;
pub mod http_server;
pub mod reconciler;
pub mod relay;
pub mod state;
