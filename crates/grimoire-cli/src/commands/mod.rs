//! Command handlers

pub mod campaign;
pub mod config;
pub mod entity;
pub mod init;
pub mod search;
pub mod status;
pub mod tag;
pub mod world;
