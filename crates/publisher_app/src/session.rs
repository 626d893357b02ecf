use std::env;
use std::fs;
use std::path::PathBuf;

use publisher_engine::Session;

pub(crate) const TOKEN_VAR: &str = "PUBLISHER_ACCESS_TOKEN";
pub(crate) const ENV_VAR: &str = "PUBLISHER_ENV";

/// Session backed by the process environment, falling back to a token file.
///
/// The file is read on every call, so writing a token into it while the
/// tool waits counts as logging in.
#[derive(Debug, Clone)]
pub(crate) struct EnvSession {
    token_file: PathBuf,
}

impl EnvSession {
    pub(crate) fn new(token_file: PathBuf) -> Self {
        Self { token_file }
    }
}

impl Session for EnvSession {
    fn access_token(&self) -> String {
        if let Some(token) = env::var(TOKEN_VAR).ok().filter(|token| !token.trim().is_empty()) {
            return token.trim().to_string();
        }
        fs::read_to_string(&self.token_file)
            .map(|content| content.trim().to_string())
            .unwrap_or_default()
    }

    fn environment(&self) -> String {
        env::var(ENV_VAR).unwrap_or_else(|_| "production".to_string())
    }
}
