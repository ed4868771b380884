use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}
