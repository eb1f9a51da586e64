// src/models/exam_category.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'exam_categories' table in the database.
/// Groups papers and tests by the exam they target (UPSC, SSC, Banking...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamCategory {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
