//! `wl-bridge` Server
//!
//! Binds chat accounts to game accounts and keeps the game server's
//! allow-list in lockstep with the stored bindings.

pub mod binding;
pub mod bot;
pub mod config;
pub mod console;
pub mod db;
pub mod permissions;
pub mod resolver;
pub mod whitelist;
