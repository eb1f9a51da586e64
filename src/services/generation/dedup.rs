// src/services/generation/dedup.rs

use crate::{config::DedupPolicyKind, utils::html::strip_tags};

/// Computes the key under which two article titles count as the same article.
pub trait TitleDedup: Send + Sync {
    fn key(&self, title: &str) -> String;
}

/// Titles match only when byte-for-byte equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTitle;

impl TitleDedup for ExactTitle {
    fn key(&self, title: &str) -> String {
        title.to_string()
    }
}

/// Titles match on their text content after trimming, lower-casing and
/// collapsing inner whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedTitle;

impl TitleDedup for NormalizedTitle {
    fn key(&self, title: &str) -> String {
        strip_tags(title)
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn policy(kind: DedupPolicyKind) -> Box<dyn TitleDedup> {
    match kind {
        DedupPolicyKind::Exact => Box::new(ExactTitle),
        DedupPolicyKind::Normalized => Box::new(NormalizedTitle),
    }
}
