//! Account lifecycle: registration, login, logout and the two password flows.
//!
//! Each function validates its input bail-style, then touches the database
//! through [`db::transaction`] where more than one row moves together.

use serde::{Deserialize, Serialize};

use crate::auth::{password, tokens};
use crate::config::AuthConfig;
use crate::db::{self, models::User, users, TRANSACTION_ATTEMPTS};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::validation::{self, IdInput, PasswordPolicy};

pub const LOGGED_OUT: &str = "You are now logged out.";
pub const CHOOSE_DIFFERENT_PASSWORD: &str = "Choose a different password.";
pub const CURRENT_PASSWORD_INCORRECT: &str = "The current password is incorrect.";

#[derive(Debug, Default, Deserialize)]
pub struct RegisterInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutInput {
    pub id: Option<IdInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordInput {
    pub id: Option<IdInput>,
    pub current_password: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// Payload returned by register and login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub details: User,
}

fn policy(config: &AuthConfig) -> PasswordPolicy {
    PasswordPolicy {
        min: config.password_min,
        max: config.password_max,
    }
}

fn checked_email(value: Option<&str>) -> AppResult<&str> {
    let email = validation::required("email", value)?;
    validation::email("email", email)?;
    Ok(email)
}

pub fn register(
    pool: &DbPool,
    config: &AuthConfig,
    input: &RegisterInput,
) -> AppResult<IssuedToken> {
    let email = checked_email(input.email.as_deref())?;

    let mut conn = pool.get()?;
    validation::unique("email", users::email_taken(&conn, email)?)?;

    let plaintext = policy(config).check(
        "password",
        input.password.as_deref(),
        input.password_confirmation.as_deref(),
    )?;
    let hashed = password::hash(plaintext, config.bcrypt_cost)?;

    // No retry: a conflict here is more likely a duplicate than contention.
    let issued = db::transaction(&mut conn, 1, |tx| {
        let user = users::insert(tx, email, &hashed)?;
        let token = tokens::issue(tx, user.id, &config.token_name)?;
        Ok(IssuedToken {
            token,
            details: user,
        })
    })?;

    tracing::info!(user_id = issued.details.id, "Registered user");
    Ok(issued)
}

/// Verify credentials and issue an additional token. Prior tokens stay valid.
pub fn authenticate(
    pool: &DbPool,
    config: &AuthConfig,
    input: &LoginInput,
) -> AppResult<IssuedToken> {
    let email = checked_email(input.email.as_deref())?;
    let plaintext = validation::required_raw("password", input.password.as_deref())?;

    let conn = pool.get()?;
    let user = match users::find_by_email(&conn, email)? {
        Some(user) if password::verify(plaintext, &user.password) => user,
        _ => {
            tracing::warn!("Login rejected");
            return Err(AppError::LoginFailed);
        }
    };

    let token = tokens::issue(&conn, user.id, &config.token_name)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(IssuedToken {
        token,
        details: user,
    })
}

/// Revoke every token the user holds.
pub fn logout(pool: &DbPool, input: &LogoutInput) -> AppResult<&'static str> {
    let user_id = validation::id("id", input.id.as_ref())?;

    let conn = pool.get()?;
    validation::exists("id", users::exists(&conn, user_id)?)?;

    let revoked = tokens::revoke_all(&conn, user_id)?;
    if revoked == 0 {
        return Err(AppError::Internal(format!(
            "logout of user {user_id} revoked no tokens"
        )));
    }

    tracing::info!(user_id, revoked, "User logged out");
    Ok(LOGGED_OUT)
}

/// Replace the password after checking the current one against the stored hash.
pub fn change_password(
    pool: &DbPool,
    config: &AuthConfig,
    input: &ChangePasswordInput,
) -> AppResult<()> {
    let user_id = validation::id("id", input.id.as_ref())?;

    let mut conn = pool.get()?;
    validation::exists("id", users::exists(&conn, user_id)?)?;

    let current =
        validation::required_raw("current_password", input.current_password.as_deref())?;
    let new_password = policy(config).check(
        "password",
        input.password.as_deref(),
        input.password_confirmation.as_deref(),
    )?;

    let stored = users::password_hash(&conn, user_id)?
        .ok_or_else(|| AppError::Internal(format!("user {user_id} has no password row")))?;
    if !password::verify(current, &stored) {
        return Err(AppError::Validation(CURRENT_PASSWORD_INCORRECT.into()));
    }

    let hashed = password::hash(new_password, config.bcrypt_cost)?;
    db::transaction(&mut conn, TRANSACTION_ATTEMPTS, |tx| {
        let stored = users::password_hash(tx, user_id)?
            .ok_or_else(|| AppError::Internal(format!("user {user_id} vanished")))?;
        // Hashes are salted, so sameness is decided by verifying against the stored one.
        if password::verify(new_password, &stored) {
            return Err(AppError::Business(CHOOSE_DIFFERENT_PASSWORD));
        }

        if users::update_password(tx, user_id, &hashed)? != 1 {
            return Err(AppError::Internal(format!(
                "password of user {user_id} was not updated"
            )));
        }
        Ok(())
    })
    .inspect_err(|e| {
        if matches!(e, AppError::Business(_)) {
            tracing::warn!(user_id, "Password change skipped: unchanged");
        }
    })?;

    tracing::info!(user_id, "Password changed");
    Ok(())
}

/// Recovery flow: overwrite the password for the account behind `email`.
pub fn reset_password(
    pool: &DbPool,
    config: &AuthConfig,
    input: &ResetPasswordInput,
) -> AppResult<()> {
    let email = checked_email(input.email.as_deref())?;

    let mut conn = pool.get()?;
    let user = validation::found("email", users::find_by_email(&conn, email)?)?;

    let new_password = policy(config).check(
        "password",
        input.password.as_deref(),
        input.password_confirmation.as_deref(),
    )?;

    if password::verify(new_password, &user.password) {
        tracing::info!(user_id = user.id, "Password reset to its current value");
    }

    let hashed = password::hash(new_password, config.bcrypt_cost)?;
    db::transaction(&mut conn, TRANSACTION_ATTEMPTS, |tx| {
        if users::update_password(tx, user.id, &hashed)? != 1 {
            return Err(AppError::Internal(format!(
                "password of user {} was not reset",
                user.id
            )));
        }
        Ok(())
    })?;

    tracing::info!(user_id = user.id, "Password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn register_input(email: &str, password: &str, confirmation: &str) -> RegisterInput {
        RegisterInput {
            email: Some(email.into()),
            password: Some(password.into()),
            password_confirmation: Some(confirmation.into()),
        }
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn change_input(id: i64, current: &str, new: &str) -> ChangePasswordInput {
        ChangePasswordInput {
            id: Some(IdInput::Number(id)),
            current_password: Some(current.into()),
            password: Some(new.into()),
            password_confirmation: Some(new.into()),
        }
    }

    fn validation_message(err: AppError) -> String {
        match err {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    /// Register `email` with a matching confirmation.
    fn signup(pool: &DbPool, config: &AuthConfig, email: &str, pw: &str) -> AppResult<IssuedToken> {
        register(pool, config, &register_input(email, pw, pw))
    }

    fn logout_input(id: IdInput) -> LogoutInput {
        LogoutInput { id: Some(id) }
    }

    fn user_count(pool: &DbPool) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn register_creates_one_user_and_a_working_token() {
        let pool = testing::pool();
        let config = testing::auth_config();

        let issued = signup(&pool, &config, "a@x.com", "password1").unwrap();
        assert_eq!(issued.details.email, "a@x.com");
        assert_eq!(issued.details.name, users::PLACEHOLDER_NAME);
        assert_eq!(issued.token.len(), 64);
        assert_eq!(user_count(&pool), 1);

        let conn = pool.get().unwrap();
        let owner = tokens::find_user_by_token(&conn, &issued.token).unwrap().unwrap();
        assert_eq!(owner.id, issued.details.id);
        assert_ne!(owner.password, "password1");
    }

    #[test]
    fn register_rejects_taken_email() {
        let pool = testing::pool();
        let config = testing::auth_config();
        signup(&pool, &config, "a@x.com", "password1").unwrap();

        let err = signup(&pool, &config, "a@x.com", "password2").unwrap_err();
        assert_eq!(validation_message(err), "The email has already been taken.");
        assert_eq!(user_count(&pool), 1);
    }

    #[test]
    fn register_validates_in_order() {
        let pool = testing::pool();
        let config = testing::auth_config();

        let err = register(&pool, &config, &RegisterInput::default()).unwrap_err();
        assert_eq!(validation_message(err), "The email field is required.");

        let err = signup(&pool, &config, "not-an-email", "password1").unwrap_err();
        assert_eq!(
            validation_message(err),
            "The email must be a valid email address."
        );

        let err = signup(&pool, &config, "a@x.com", "short").unwrap_err();
        assert_eq!(
            validation_message(err),
            "The password must be at least 8 characters."
        );

        let mismatched = register_input("a@x.com", "password1", "password2");
        let err = register(&pool, &config, &mismatched).unwrap_err();
        assert_eq!(
            validation_message(err),
            "The password confirmation does not match."
        );

        assert_eq!(user_count(&pool), 0);
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let pool = testing::pool();
        let config = testing::auth_config();
        signup(&pool, &config, "a@x.com", "password1").unwrap();

        let wrong_password =
            authenticate(&pool, &config, &login_input("a@x.com", "password9")).unwrap_err();
        let unknown_email =
            authenticate(&pool, &config, &login_input("b@x.com", "password1")).unwrap_err();

        assert!(matches!(wrong_password, AppError::LoginFailed));
        assert!(matches!(unknown_email, AppError::LoginFailed));
        assert_eq!(wrong_password.public_message(), unknown_email.public_message());
    }

    #[test]
    fn login_email_is_case_sensitive() {
        let pool = testing::pool();
        let config = testing::auth_config();
        signup(&pool, &config, "a@x.com", "password1").unwrap();

        let err = authenticate(&pool, &config, &login_input("A@X.COM", "password1")).unwrap_err();
        assert!(matches!(err, AppError::LoginFailed));
    }

    #[test]
    fn register_login_logout_scenario() {
        let pool = testing::pool();
        let config = testing::auth_config();

        let t1 = signup(&pool, &config, "a@x.com", "password1").unwrap();
        let t2 = authenticate(&pool, &config, &login_input("a@x.com", "password1")).unwrap();
        assert_ne!(t1.token, t2.token);
        assert_eq!(t1.details.id, t2.details.id);

        {
            let conn = pool.get().unwrap();
            assert!(tokens::find_user_by_token(&conn, &t1.token).unwrap().is_some());
            assert!(tokens::find_user_by_token(&conn, &t2.token).unwrap().is_some());
        }

        let message = logout(&pool, &logout_input(IdInput::Number(t1.details.id))).unwrap();
        assert_eq!(message, LOGGED_OUT);

        let conn = pool.get().unwrap();
        assert!(tokens::find_user_by_token(&conn, &t1.token).unwrap().is_none());
        assert!(tokens::find_user_by_token(&conn, &t2.token).unwrap().is_none());
    }

    #[test]
    fn logout_validates_user() {
        let pool = testing::pool();

        let err = logout(&pool, &LogoutInput::default()).unwrap_err();
        assert_eq!(validation_message(err), "The id field is required.");

        let err = logout(&pool, &logout_input(IdInput::Text("x".into()))).unwrap_err();
        assert_eq!(validation_message(err), "The id must be a number.");

        let err = logout(&pool, &logout_input(IdInput::Number(42))).unwrap_err();
        assert_eq!(validation_message(err), "The selected id is invalid.");
    }

    #[test]
    fn logout_without_tokens_is_internal() {
        let pool = testing::pool();
        let user = testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");

        let err = logout(&pool, &logout_input(IdInput::Number(user.id))).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn change_password_replaces_hash() {
        let pool = testing::pool();
        let config = testing::auth_config();
        let user = testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");

        change_password(&pool, &config, &change_input(user.id, "password1", "password2")).unwrap();

        authenticate(&pool, &config, &login_input("a@x.com", "password2")).unwrap();
        let err = authenticate(&pool, &config, &login_input("a@x.com", "password1")).unwrap_err();
        assert!(matches!(err, AppError::LoginFailed));
    }

    #[test]
    fn change_password_to_same_value_is_business_noop() {
        let pool = testing::pool();
        let config = testing::auth_config();
        let user = testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");
        let before = users::password_hash(&pool.get().unwrap(), user.id).unwrap();

        let same = change_input(user.id, "password1", "password1");
        let err = change_password(&pool, &config, &same).unwrap_err();
        assert!(matches!(err, AppError::Business(CHOOSE_DIFFERENT_PASSWORD)));

        let after = users::password_hash(&pool.get().unwrap(), user.id).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn change_password_checks_current_password() {
        let pool = testing::pool();
        let config = testing::auth_config();
        let user = testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");

        // Knowing only the new password is not enough.
        let guessed = change_input(user.id, "password2", "password2");
        let err = change_password(&pool, &config, &guessed).unwrap_err();
        assert_eq!(validation_message(err), CURRENT_PASSWORD_INCORRECT);

        authenticate(&pool, &config, &login_input("a@x.com", "password1")).unwrap();
    }

    #[test]
    fn change_password_enforces_policy() {
        let pool = testing::pool();
        let config = testing::auth_config();
        let user = testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");

        let mut input = change_input(user.id, "password1", "password2");
        input.password_confirmation = Some("password3".into());
        let err = change_password(&pool, &config, &input).unwrap_err();
        assert_eq!(
            validation_message(err),
            "The password confirmation does not match."
        );

        let too_long = change_input(user.id, "password1", "a-much-too-long-password");
        let err = change_password(&pool, &config, &too_long).unwrap_err();
        assert_eq!(
            validation_message(err),
            "The password must not be greater than 16 characters."
        );

        let mut input = change_input(user.id, "password1", "password2");
        input.current_password = None;
        let err = change_password(&pool, &config, &input).unwrap_err();
        assert_eq!(validation_message(err), "The current password field is required.");
    }

    #[test]
    fn reset_password_needs_no_current_password() {
        let pool = testing::pool();
        let config = testing::auth_config();
        testing::seed_user(&pool.get().unwrap(), "a@x.com", "password1");

        let input = ResetPasswordInput {
            email: Some("a@x.com".into()),
            password: Some("password2".into()),
            password_confirmation: Some("password2".into()),
        };
        reset_password(&pool, &config, &input).unwrap();
        authenticate(&pool, &config, &login_input("a@x.com", "password2")).unwrap();

        // Same value again still succeeds.
        reset_password(&pool, &config, &input).unwrap();
    }

    #[test]
    fn reset_password_rejects_unknown_email() {
        let pool = testing::pool();
        let config = testing::auth_config();

        let input = ResetPasswordInput {
            email: Some("nobody@x.com".into()),
            password: Some("password2".into()),
            password_confirmation: Some("password2".into()),
        };
        let err = reset_password(&pool, &config, &input).unwrap_err();
        assert_eq!(validation_message(err), "The selected email is invalid.");
    }
}
