//! Redirect hand-off payload.
//!
//! When a restored tab cannot be reconciled in place, the manager walks back
//! to index 0 and loads a small redirect document, passing it an ordered list
//! of instructions in the URL fragment. The redirect document replaces the
//! stale entries and then loads `path_hash` again.

use super::NavigationError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Step performed by the redirect document while replacing entries.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Back { length: u32 },
}

/// One instruction of the hand-off.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    Replace { commands: Vec<Command> },
    Redirect { path_hash: String },
}

/// Ordered instructions handed to the redirect document.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandOff {
    pub instructions: Vec<Instruction>,
}

impl HandOff {
    /// Return the hand-off that steps back over the redirect document and
    /// the entry it replaced, then loads `path_hash`.
    ///
    pub fn replace_back_then_redirect(path_hash: &str) -> Self {
        HandOff {
            instructions: vec![
                Instruction::Replace {
                    commands: vec![Command::Back { length: 2 }],
                },
                Instruction::Redirect {
                    path_hash: path_hash.to_owned(),
                },
            ],
        }
    }

    /// Encode as base64 of the JSON instruction list.
    ///
    pub fn encode(&self) -> Result<String, NavigationError> {
        let json = serde_json::to_string(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(fragment: &str) -> Result<Self, NavigationError> {
        let json = STANDARD.decode(fragment)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Return the URL of the redirect document carrying this hand-off.
    ///
    pub fn url(&self, redirect_html_url: &str) -> Result<String, NavigationError> {
        Ok(format!("{}#{}", redirect_html_url, self.encode()?))
    }

    /// Decode the hand-off carried by a redirect document URL.
    ///
    pub fn from_url(url: &str) -> Result<Self, NavigationError> {
        match url.split_once('#') {
            Some((_, fragment)) => HandOff::decode(fragment),
            None => Err(NavigationError::MissingFragment {
                url: url.to_owned(),
            }),
        }
    }
}

/// Return `href` relative to `origin`: path, query and fragment.
///
pub fn path_hash(href: &str, origin: &str) -> String {
    if origin.is_empty() {
        return href.to_owned();
    }
    match Regex::new(&format!("^{}", regex::escape(origin))) {
        Ok(pattern) => pattern.replace(href, "").into_owned(),
        Err(_) => href.to_owned(),
    }
}
