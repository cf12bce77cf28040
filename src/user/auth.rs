//! Session token model.

use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub value: AuthTokenValue,
    pub user_id: usize,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds of the last request that presented this token.
    pub last_used_at: Option<i64>,
}

impl AuthToken {
    pub fn issue(user_id: usize) -> AuthToken {
        AuthToken {
            value: AuthTokenValue::generate(),
            user_id,
            created_at: chrono::Utc::now().timestamp(),
            last_used_at: None,
        }
    }
}
