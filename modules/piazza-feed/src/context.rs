/// Who is looking at the page. Passed explicitly to every component that
/// needs it instead of living in a global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: Option<String>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}
