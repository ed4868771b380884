/// Outcome of one authorize-request validator.
///
/// On `Deny` the two strings become the OAuth2 `error` and
/// `error_description` parameters and are forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny {
        error_code: String,
        error_description: String,
    },
}

impl Verdict {
    pub fn deny(error_code: impl Into<String>, error_description: impl Into<String>) -> Self {
        Self::Deny {
            error_code: error_code.into(),
            error_description: error_description.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}
