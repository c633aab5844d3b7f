//! `ql token set|clear|show`.

use serde::Serialize;

use crate::commands::{Output, json_line};
use crate::config::{ConfigPaths, QuestlinkState, mask_token, resolve_token};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
pub struct TokenSet {
    pub masked: String,
    pub path: String,
}

impl Output for TokenSet {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        format!("Stored token {} in {}", self.masked, self.path)
    }
}

pub fn token_set(paths: &ConfigPaths, token: &str) -> Result<TokenSet> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::InvalidInput("token must not be empty".to_string()));
    }
    let mut state = paths.read_state()?;
    state.auth_token = Some(token.to_string());
    paths.write_state(&state)?;
    Ok(TokenSet {
        masked: mask_token(token),
        path: paths.state_file().display().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct TokenClear {
    /// False when no token was stored.
    pub cleared: bool,
}

impl Output for TokenClear {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        if self.cleared {
            "Stored token removed".to_string()
        } else {
            "No stored token".to_string()
        }
    }
}

pub fn token_clear(paths: &ConfigPaths) -> Result<TokenClear> {
    let cleared = paths.read_state()?.auth_token.is_some();
    if cleared {
        paths.write_state(&QuestlinkState { auth_token: None })?;
    }
    Ok(TokenClear { cleared })
}

#[derive(Debug, Serialize)]
pub struct TokenShow {
    pub present: bool,
    pub masked: Option<String>,
    pub source: Option<String>,
}

impl Output for TokenShow {
    fn to_json(&self) -> String {
        json_line(self)
    }

    fn to_human(&self) -> String {
        match (&self.masked, &self.source) {
            (Some(masked), Some(source)) => format!("Token: {} (from {})", masked, source),
            _ => "No token configured. Run `ql token set <TOKEN>` or set QL_TOKEN.".to_string(),
        }
    }
}

pub fn token_show(paths: &ConfigPaths, cli: Option<&str>) -> Result<TokenShow> {
    let token = resolve_token(paths, cli)?;
    Ok(TokenShow {
        present: token.is_some(),
        masked: token.as_ref().map(|t| t.masked()),
        source: token.as_ref().map(|t| t.source().to_string()),
    })
}
