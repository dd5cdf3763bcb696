// Viewer context - who is making the current request

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerType {
    Anonymous,
    User { user_id: i64 },
    /// Internal or development access; skips access-list checks
    System,
}

#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer: ViewerType,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        Self {
            viewer: ViewerType::Anonymous,
            request_id,
        }
    }

    pub fn user(user_id: i64, request_id: String) -> Self {
        Self {
            viewer: ViewerType::User { user_id },
            request_id,
        }
    }

    pub fn system(request_id: String) -> Self {
        Self {
            viewer: ViewerType::System,
            request_id,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.viewer {
            ViewerType::User { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.viewer == ViewerType::System
    }

    pub fn is_authenticated(&self) -> bool {
        self.viewer != ViewerType::Anonymous
    }

    pub fn require_authenticated(&self) -> AppResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Authentication required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_kinds() {
        let anon = ViewerContext::anonymous("r1".to_string());
        assert!(!anon.is_authenticated());
        assert!(anon.require_authenticated().is_err());

        let user = ViewerContext::user(7, "r2".to_string());
        assert_eq!(user.user_id(), Some(7));
        assert!(!user.is_system());

        let system = ViewerContext::system("r3".to_string());
        assert!(system.is_system());
        assert_eq!(system.user_id(), None);
        assert!(system.require_authenticated().is_ok());
    }
}
