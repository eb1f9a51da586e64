// src/handlers/mod.rs

pub mod admin;
pub mod catalog;
pub mod results;
pub mod sessions;
