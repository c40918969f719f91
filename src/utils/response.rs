//! Success-envelope wrapper for handlers, kept in the same shape as the teacher's
//! `utils/response.rs::ApiResponse<T>`. Errors go through `crate::error::AppError`'s
//! own `IntoResponse`, which carries the §7 error-kind taxonomy instead of this
//! envelope's generic `ApiError` — the two are deliberately different shapes, matching
//! how the teacher's codebase also only wraps the success path here.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
