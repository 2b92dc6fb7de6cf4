use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::database::error::FoodgramError;
use crate::database::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Clone)]
pub struct SessionKey(Hmac<Sha256>);

impl SessionKey {
    pub fn new(secret: &[u8]) -> Result<Self, FoodgramError> {
        Hmac::new_from_slice(secret)
            .map(Self)
            .map_err(|e| FoodgramError::Config(format!("Invalid session secret ({e})")))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            user_role: role,
            iat,
            exp,
        }
    }
}

/// The authenticated caller, handed explicitly to every operation that needs one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub user_role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), FoodgramError> {
        if !action.authenticate(&self) {
            return Err(FoodgramError::Forbidden);
        }
        Ok(())
    }

    /// Authors manage their own recipes, admins manage everybody's.
    pub fn can_manage(&self, author_id: Uuid) -> bool {
        match self.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => true,
            Err(_) => {
                author_id == self.user_id && self.authenticate(ActionType::ManageOwnRecipes).is_ok()
            }
        }
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.user_role == UserRole::Admin,
            user_role: value.user_role,
        }
    }
}

pub fn generate_jwt_session(user: &User, key: &SessionKey) -> Result<String, FoodgramError> {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims
        .sign_with_key(&key.0)
        .map_err(|e| FoodgramError::Unauthorized(format!("Failed to sign token ({e})")))
}

pub fn verify_jwt_session(token: &str, key: &SessionKey) -> Result<SessionData, FoodgramError> {
    let session: JwtSessionData = token
        .verify_with_key(&key.0)
        .map_err(|_| FoodgramError::Unauthorized(String::from("Invalid token")))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(FoodgramError::Unauthorized(String::from("Token expired")));
    }

    Ok(session.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 3,
            username: String::from("chef"),
            email: String::from("chef@foodgram.example"),
            first_name: String::from("Иван"),
            last_name: String::from("Петров"),
            role,
        }
    }

    #[test]
    fn signed_session_round_trips() {
        let key = SessionKey::new(b"secret").unwrap();
        let token = generate_jwt_session(&user(UserRole::Admin), &key).unwrap();

        let session = verify_jwt_session(&token, &key).unwrap();
        assert_eq!(session.user_id, 3);
        assert_eq!(session.username, "chef");
        assert!(session.is_admin);
    }

    #[test]
    fn foreign_key_is_rejected() {
        let token =
            generate_jwt_session(&user(UserRole::User), &SessionKey::new(b"secret").unwrap()).unwrap();

        let result = verify_jwt_session(&token, &SessionKey::new(b"other").unwrap());
        assert!(matches!(result, Err(FoodgramError::Unauthorized(_))));
    }

    #[test]
    fn expired_session_is_rejected() {
        let key = SessionKey::new(b"secret").unwrap();
        let mut claims = JwtSessionData::new(3, String::from("chef"), UserRole::User);
        claims.exp = Local::now().timestamp() - 60;
        let token = claims.sign_with_key(&key.0).unwrap();

        let result = verify_jwt_session(&token, &key);
        assert!(matches!(result, Err(FoodgramError::Unauthorized(info)) if info == "Token expired"));
    }

    #[test]
    fn only_authors_and_admins_manage_recipes() {
        let author: SessionData = JwtSessionData::new(3, String::from("chef"), UserRole::User).into();
        let admin: SessionData = JwtSessionData::new(9, String::from("root"), UserRole::Admin).into();

        assert!(author.can_manage(3));
        assert!(!author.can_manage(4));
        assert!(admin.can_manage(4));
    }
}
