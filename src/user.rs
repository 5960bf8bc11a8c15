use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use thiserror::Error;
use uuid::Uuid;

use crate::main_db::MainDb;
use crate::utils;

const SALT_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("user already exists")]
    AlreadyExists,
    #[error("wrong password")]
    WrongPassword,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub login: String,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_input(login: &str, password: &str) -> Result<(), UserError> {
    if login.trim().is_empty() {
        return Err(UserError::InvalidInput("login is empty"));
    }
    if password.is_empty() {
        return Err(UserError::InvalidInput("password is empty"));
    }
    Ok(())
}

impl User {
    fn create(login: &str, password: &str) -> User {
        let password_salt = utils::random_token(SALT_LENGTH);
        let password_hash = hash_password(&password_salt, password);
        User {
            id: Uuid::new_v4().as_hyphenated().to_string(),
            login: login.to_string(),
            password_salt,
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        hash_password(&self.password_salt, password) == self.password_hash
    }
}

pub fn sign_up(main_db: &mut MainDb, login: &str, password: &str) -> Result<User, UserError> {
    check_input(login, password)?;
    let result = main_db.with_txn(|txn| {
        if txn.get_user_by_login(login)?.is_some() {
            return Ok(None);
        }
        let user = User::create(login, password);
        txn.insert_user(&user)?;
        Ok(Some(user))
    })?;
    result.ok_or(UserError::AlreadyExists)
}

pub fn sign_in(main_db: &mut MainDb, login: &str, password: &str) -> Result<User, UserError> {
    let user = main_db
        .with_txn(|txn| txn.get_user_by_login(login))?
        .ok_or(UserError::NotFound)?;
    if user.check_password(password) {
        info!("[user] signed in: id={}", user.id);
        Ok(user)
    } else {
        warn!("[user] wrong password for: id={}", user.id);
        Err(UserError::WrongPassword)
    }
}

pub fn change_password(
    main_db: &mut MainDb,
    login: &str,
    new_password: &str,
) -> Result<User, UserError> {
    check_input(login, new_password)?;
    let result = main_db.with_txn(|txn| match txn.get_user_by_login(login)? {
        None => Ok(None),
        Some(mut user) => {
            user.password_salt = utils::random_token(SALT_LENGTH);
            user.password_hash = hash_password(&user.password_salt, new_password);
            txn.update_user_password(&user.id, &user.password_salt, &user.password_hash)?;
            Ok(Some(user))
        }
    })?;
    result.ok_or(UserError::NotFound)
}

pub fn rename_user(main_db: &mut MainDb, login: &str, new_login: &str) -> Result<User, UserError> {
    if new_login.trim().is_empty() {
        return Err(UserError::InvalidInput("login is empty"));
    }
    enum Outcome {
        Renamed(User),
        NotFound,
        Taken,
    }
    let outcome = main_db.with_txn(|txn| {
        let mut user = match txn.get_user_by_login(login)? {
            None => return Ok(Outcome::NotFound),
            Some(user) => user,
        };
        if login == new_login {
            return Ok(Outcome::Renamed(user));
        }
        if txn.get_user_by_login(new_login)?.is_some() {
            return Ok(Outcome::Taken);
        }
        txn.update_user_login(&user.id, new_login)?;
        user.login = new_login.to_string();
        Ok(Outcome::Renamed(user))
    })?;
    match outcome {
        Outcome::Renamed(user) => Ok(user),
        Outcome::NotFound => Err(UserError::NotFound),
        Outcome::Taken => Err(UserError::AlreadyExists),
    }
}
