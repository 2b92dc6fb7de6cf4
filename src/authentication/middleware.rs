use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::constants::SESSION_HEADER_PREFIX;

use super::jwt::{verify_jwt_session, SessionData, SessionKey};

#[derive(Debug)]
pub struct Unauthorized(pub String);

impl reject::Reject for Unauthorized {}

fn parse_token(header: &str) -> Option<&str> {
    header
        .strip_prefix(SESSION_HEADER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn with_session(
    key: SessionKey,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let key = key.clone();
        async move {
            let token = header
                .as_deref()
                .and_then(parse_token)
                .ok_or_else(|| reject::custom(Unauthorized(String::from("Missing token"))))?;

            verify_jwt_session(token, &key).map_err(|e| reject::custom(Unauthorized(e.to_string())))
        }
    })
}

/// Anonymous access: a missing or broken token yields `None` rather than a rejection.
pub fn with_possible_session(
    key: SessionKey,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(parse_token)
            .and_then(|token| verify_jwt_session(token, &key).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    fn token(key: &SessionKey) -> String {
        let user = User {
            id: 5,
            username: String::from("cook"),
            email: String::from("cook@foodgram.example"),
            first_name: String::from("Анна"),
            last_name: String::from("Смирнова"),
            role: UserRole::User,
        };
        generate_jwt_session(&user, key).unwrap()
    }

    #[test]
    fn token_prefix_is_required() {
        assert_eq!(parse_token("Token abc"), Some("abc"));
        assert_eq!(parse_token("Bearer abc"), None);
        assert_eq!(parse_token("Token "), None);
    }

    #[tokio::test]
    async fn session_is_resolved_from_header() {
        let key = SessionKey::new(b"secret").unwrap();
        let header = format!("Token {}", token(&key));

        let session = warp::test::request()
            .header("authorization", header)
            .filter(&with_session(key))
            .await
            .unwrap();

        assert_eq!(session.user_id, 5);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let key = SessionKey::new(b"secret").unwrap();

        let result = warp::test::request().filter(&with_session(key)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn possible_session_tolerates_garbage() {
        let key = SessionKey::new(b"secret").unwrap();

        let session = warp::test::request()
            .header("authorization", "Token garbage")
            .filter(&with_possible_session(key))
            .await
            .unwrap();

        assert!(session.is_none());
    }
}
