// src/codecrew/mod.rs

pub mod agent;
pub mod auth;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod group_chat;
pub mod history;
pub mod participant;
pub mod sandbox;
pub mod selection;
pub mod termination;
pub mod tool_protocol;

// Explicitly export the orchestrator so callers reach it as
// codecrew::GroupChat instead of codecrew::group_chat::GroupChat.
pub use group_chat::GroupChat;
