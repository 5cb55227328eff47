// Task request validation
// Field constraints checked before a task is allowed to parse its config

use crate::core::types::TaskRequest;

pub const MAX_USERNAME_CHARS: usize = 64;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// All errors on one line, for the task response.
    pub fn summary(&self) -> String {
        self.errors.join("; ")
    }
}

pub fn validate_task_request(request: &TaskRequest) -> ValidationResult {
    let mut result = ValidationResult::new();

    if request.user_telegram_id < 1 {
        result.add_error(format!(
            "user_telegram_id must be >= 1 (got {})",
            request.user_telegram_id
        ));
    }

    if request.tests.is_empty() {
        result.add_error("tests must contain at least 1 item".to_string());
    }

    if let Some(username) = &request.username {
        let chars = username.chars().count();
        if chars > MAX_USERNAME_CHARS {
            result.add_error(format!(
                "username must be at most {} characters (got {})",
                MAX_USERNAME_CHARS, chars
            ));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request() -> TaskRequest {
        TaskRequest {
            task_id: Uuid::new_v4(),
            user_telegram_id: 1001,
            username: Some("alice".to_string()),
            config_raw: "vless://x".to_string(),
            tests: vec!["performance".to_string()],
            consent_required: false,
            consent_granted: false,
        }
    }

    #[test]
    fn valid_request_passes() {
        let result = validate_task_request(&request());
        assert!(result.is_valid());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn every_violation_is_reported() {
        let mut bad = request();
        bad.user_telegram_id = 0;
        bad.tests.clear();
        bad.username = Some("x".repeat(65));

        let result = validate_task_request(&bad);
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 3);
        assert!(result.summary().contains("user_telegram_id"));
    }

    #[test]
    fn username_limit_counts_characters() {
        let mut req = request();
        req.username = Some("й".repeat(64));
        assert!(validate_task_request(&req).is_valid());
    }
}
