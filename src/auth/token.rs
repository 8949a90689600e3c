use rand::{rngs::OsRng, RngCore};
use tracing::{debug, warn};

use crate::{error::ApiError, store::Store, users::repo_types::User};

const TOKEN_BYTES: usize = 20;

/// 40 lowercase hex characters from the OS RNG.
pub fn generate_key() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Returns the user's token, creating it on first use.
pub async fn issue_token(store: &dyn Store, user: &User) -> anyhow::Result<String> {
    let key = store.get_or_create_token(user.id, &generate_key()).await?;
    debug!(user_id = %user.id, "token issued");
    Ok(key)
}

pub async fn resolve_token(store: &dyn Store, key: &str) -> Result<User, ApiError> {
    let Some(user) = store.find_user_by_token(key).await? else {
        warn!("unknown token");
        return Err(ApiError::Unauthenticated("Invalid token."));
    };
    if !user.is_active {
        warn!(user_id = %user.id, "token of inactive user");
        return Err(ApiError::Unauthenticated("User inactive or deleted."));
    }
    Ok(user)
}
