use rusqlite::ErrorCode;
use serde::Serialize;

use crate::auth::{hash_password, verify_password, TokenIssuer};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub token_type: &'static str,
}

fn validate(new_user: &NewUser) -> AppResult<()> {
    let email = &new_user.email;
    let email_ok = !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .map(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            })
            .unwrap_or(false);
    if !email_ok {
        return Err(AppError::InvalidInput(format!(
            "'{}' is not a valid email address",
            new_user.email
        )));
    }
    if new_user.username.trim().is_empty() {
        return Err(AppError::InvalidInput("username must not be empty".to_string()));
    }
    Ok(())
}

/// UNIQUE violations raced past the explicit lookups.
fn map_unique_violation(err: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if message.contains("users.email") {
                return AppError::DuplicateEmail;
            }
            if message.contains("users.username") {
                return AppError::DuplicateUsername;
            }
        }
    }
    AppError::Database(err)
}

pub async fn register(db: &Database, bcrypt_cost: u32, new_user: NewUser) -> AppResult<User> {
    validate(&new_user)?;
    let password = new_user.password.clone();
    let password_hash =
        tokio::task::spawn_blocking(move || hash_password(&password, bcrypt_cost)).await??;

    let session = db.begin().await?;
    if session.user_by_email(&new_user.email)?.is_some() {
        return Err(AppError::DuplicateEmail);
    }
    if session.user_by_username(&new_user.username)?.is_some() {
        return Err(AppError::DuplicateUsername);
    }

    let id = session
        .insert_user(
            &new_user.username,
            &password_hash,
            &new_user.fullname,
            &new_user.email,
            &new_user.phone_number,
        )
        .map_err(map_unique_violation)?;
    let user = session.user_by_id(id)?.ok_or(AppError::NotFound)?;
    session.commit()?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(user)
}

pub async fn login(
    db: &Database,
    tokens: &TokenIssuer,
    username: &str,
    password: &str,
) -> AppResult<LoginOutcome> {
    let user = {
        let session = db.begin().await?;
        let user = session.user_by_username(username)?;
        session.commit()?;
        user
    };

    let verified = match &user {
        Some(user) => {
            let password = password.to_owned();
            let hash = user.password_hash.clone();
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::info!(username, "Rejected login");
            return Err(AppError::InvalidCredentials);
        }
    };

    let access_token = tokens.issue(&user.username)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(LoginOutcome {
        access_token,
        user_id: user.id,
        token_type: "bearer",
    })
}
