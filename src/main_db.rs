use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use crate::route::Route;
use crate::route_repository::{RouteRepository, StorageError};
use crate::user::User;
use crate::utils;

/* The main database. It holds very little: the last recorded route (as a
single json blob, there is never more than one row), user accounts and
settings.

`last_route` is replaced as a whole inside one transaction, so a failed write
keeps the previous route.
*/

#[allow(clippy::type_complexity)]
fn open_db_and_run_migration(
    support_dir: &str,
    file_name: &str,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<Connection> {
    debug!("open and run migration for {}", file_name);
    let mut conn = rusqlite::Connection::open(Path::new(support_dir).join(file_name))?;
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

fn run_sql_script(tx: &Transaction, sql: &str) -> Result<()> {
    for s in sql_split::split(sql) {
        tx.execute(&s, ())?;
    }
    Ok(())
}

pub struct Txn<'a> {
    db_txn: rusqlite::Transaction<'a>,
}

impl Txn<'_> {
    pub fn get_last_route_data(&self) -> Result<Option<Vec<u8>>> {
        let mut query = self
            .db_txn
            .prepare("SELECT data FROM last_route WHERE id = 0;")?;
        Ok(query.query_row((), |row| row.get(0)).optional()?)
    }

    pub fn get_last_route_saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        let mut query = self
            .db_txn
            .prepare("SELECT saved_at FROM last_route WHERE id = 0;")?;
        let timestamp_sec: Option<i64> = query.query_row((), |row| row.get(0)).optional()?;
        Ok(timestamp_sec.and_then(|x| DateTime::from_timestamp(x, 0)))
    }

    pub fn replace_last_route(&mut self, data: &[u8]) -> Result<()> {
        self.db_txn.execute("DELETE FROM last_route;", ())?;
        self.db_txn.execute(
            "INSERT INTO last_route (id, saved_at, data) VALUES (0, ?1, ?2);",
            (Utc::now().timestamp(), data),
        )?;
        Ok(())
    }

    pub fn insert_user(&mut self, user: &User) -> Result<()> {
        info!("Inserting user: id={}", user.id);
        let sql = "INSERT INTO user (id, login, password_salt, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5);";
        self.db_txn.execute(
            sql,
            (
                &user.id,
                &user.login,
                &user.password_salt,
                &user.password_hash,
                user.created_at.timestamp(),
            ),
        )?;
        Ok(())
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let mut query = self.db_txn.prepare(
            "SELECT id, login, password_salt, password_hash, created_at FROM user WHERE login = ?1;",
        )?;
        let result = query
            .query_row([login], |row| {
                let created_at: i64 = row.get(4)?;
                Ok(User {
                    id: row.get(0)?,
                    login: row.get(1)?,
                    password_salt: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
                })
            })
            .optional()?;
        Ok(result)
    }

    pub fn update_user_password(&mut self, id: &str, salt: &str, hash: &str) -> Result<()> {
        info!("Updating password of user: id={}", id);
        let changes = self.db_txn.execute(
            "UPDATE user SET password_salt = ?1, password_hash = ?2 WHERE id = ?3;",
            (salt, hash, id),
        )?;
        if changes != 1 {
            bail!("Failed to find user with id = {}", id);
        }
        Ok(())
    }

    pub fn update_user_login(&mut self, id: &str, new_login: &str) -> Result<()> {
        info!("Updating login of user: id={}", id);
        let changes = self.db_txn.execute(
            "UPDATE user SET login = ?1 WHERE id = ?2;",
            (new_login, id),
        )?;
        if changes != 1 {
            bail!("Failed to find user with id = {}", id);
        }
        Ok(())
    }
}

pub struct MainDb {
    conn: Connection,
}

impl MainDb {
    pub fn open(support_dir: &str) -> Result<MainDb> {
        let conn = open_db_and_run_migration(
            support_dir,
            "main.db",
            &[
                &|tx| {
                    run_sql_script(
                        tx,
                        "
                        CREATE TABLE last_route (
                            id                INTEGER PRIMARY KEY
                                                      NOT NULL
                                                      CHECK (id = 0),
                            saved_at          INTEGER NOT NULL, -- unix timestamp in sec
                            data              BLOB    NOT NULL  -- json array of points
                        );
                        CREATE TABLE setting (
                            key               TEXT    PRIMARY KEY
                                                      NOT NULL
                                                      UNIQUE,
                            value             TEXT
                        );
                        ",
                    )
                },
                &|tx| {
                    run_sql_script(
                        tx,
                        "
                        CREATE TABLE user (
                            id                TEXT    PRIMARY KEY
                                                      NOT NULL
                                                      UNIQUE,
                            login             TEXT    NOT NULL
                                                      UNIQUE,
                            password_salt     TEXT    NOT NULL,
                            password_hash     TEXT    NOT NULL,
                            created_at        INTEGER NOT NULL
                        );
                        ",
                    )
                },
            ],
        )?;
        Ok(MainDb { conn })
    }

    pub fn with_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        let mut txn = Txn {
            db_txn: self.conn.transaction()?,
        };
        // dropping `txn` without commit rolls it back.
        let output = f(&mut txn)?;
        txn.db_txn.commit()?;
        Ok(output)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_setting<T: FromStr>(&mut self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let tx = self.conn.transaction()?;
        let mut query = tx.prepare("SELECT value FROM setting WHERE key = ?1;")?;
        let result: Option<String> = query
            .query_row([setting.to_db_key()], |row| row.get(0))
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => {
                let v = FromStr::from_str(&s)?;
                Ok(Some(v))
            }
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&mut self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[main_db.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        let tx = self.conn.transaction()?;
        let sql = "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);";
        tx.execute(sql, (setting.to_db_key(), value.to_string()))?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear_setting(&mut self, setting: Setting) -> Result<()> {
        self.conn
            .execute("DELETE FROM setting WHERE key = ?1;", [setting.to_db_key()])?;
        Ok(())
    }
}

impl RouteRepository for MainDb {
    fn save(&mut self, route: &Route) -> Result<(), StorageError> {
        let data = route
            .to_json_bytes()
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;
        self.with_txn(|txn| txn.replace_last_route(&data))
            .map_err(StorageError::Unavailable)?;
        info!("[main_db] last route replaced: num_of_points={}", route.len());
        Ok(())
    }

    fn fetch_last(&mut self) -> Result<Route, StorageError> {
        let data = self
            .with_txn(|txn| txn.get_last_route_data())
            .map_err(StorageError::Unavailable)?;
        match data {
            None => Ok(Route::new()),
            Some(data) => {
                Route::from_json_bytes(&data).map_err(|e| StorageError::Corrupted(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    RouteBackend,
    LastSignedInUser,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        self.into()
    }
}

/// Where the last route is kept. Read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
pub enum RouteBackend {
    Sqlite,
    File,
}
