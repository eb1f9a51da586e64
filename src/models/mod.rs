// src/models/mod.rs

pub mod article;
pub mod attempt;
pub mod exam_category;
pub mod question;
pub mod setting;
