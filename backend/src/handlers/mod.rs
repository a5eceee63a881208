//! HTTP handlers for the procurement API

mod health;
mod items;
mod procurement;
mod settings;

pub use health::*;
pub use items::*;
pub use procurement::*;
pub use settings::*;

use serde::Serialize;

/// Success envelope: `{"success": true, "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::new(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": [1, 2] }));
    }
}
