// src/services/mod.rs

pub mod generation;
pub mod results;
pub mod scoring;
pub mod session;
pub mod session_manager;
