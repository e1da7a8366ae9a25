// src/models/lesson.rs

use serde::{Deserialize, Serialize};

/// Represents the 'lessons' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub week_id: i64,
    pub title: String,

    /// User id of the student the lesson is assigned to.
    pub for_user: String,

    /// Storage path of the lesson body, fetched through a signed URL.
    #[serde(default)]
    pub content_path: Option<String>,
}

/// Query params for fetching stored content.
#[derive(Debug, Deserialize)]
pub struct ContentParams {
    pub path: String,
}
