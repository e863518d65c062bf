//! Member access tokens.
//!
//! Tokens are opaque strings kept in the key-value store, which expires them
//! after `PAT_TTL_SECS`. The identity issuer writes them there; `debate-setup`
//! mints them for local members through `auth::provision`.

use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

const KEY_PREFIX: &str = "debate:pat";

/// Token TTL in seconds.
pub const PAT_TTL_SECS: u64 = 3600;

/// Data stored alongside a token.
#[derive(Debug, Serialize, Deserialize)]
pub struct PatData {
    pub member_id: String,
}

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;

    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

pub fn generate_pat() -> String {
    generate_opaque_token("pat", 32)
}

fn key(token: &str) -> String {
    format!("{KEY_PREFIX}:{token}")
}

pub async fn store_pat(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &PatData,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&key(token), &value, PAT_TTL_SECS).await
}

pub async fn lookup_pat(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<PatData>, ApiError> {
    match kv.get(&key(token)).await? {
        Some(v) => {
            let data: PatData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

pub async fn revoke_pat(kv: &dyn KeyValueStore, token: &str) -> Result<(), ApiError> {
    kv.del(&key(token)).await
}
