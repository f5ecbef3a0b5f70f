//! Session token issuance for successful logins.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Literal returned while no signing scheme is configured.
pub const PLACEHOLDER_TOKEN: &str = "JWT_TOKEN";

const OPAQUE_TOKEN_BYTES: usize = 32;

/// How tokens are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Always [`PLACEHOLDER_TOKEN`].
    #[default]
    Placeholder,
    /// 32 random bytes, hex-encoded.
    Opaque,
}

/// Produces bearer tokens for authenticated users.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenIssuer {
    mode: TokenMode,
}

impl TokenIssuer {
    pub fn new(mode: TokenMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TokenMode {
        self.mode
    }

    /// Issues a token for `username`.
    pub fn issue(&self, _username: &str) -> String {
        match self.mode {
            TokenMode::Placeholder => PLACEHOLDER_TOKEN.to_string(),
            TokenMode::Opaque => {
                let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
                rand::thread_rng().fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
        }
    }
}
