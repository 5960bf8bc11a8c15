pub fn random_token(len: usize) -> String {
    random_string::generate(len, random_string::charsets::ALPHANUMERIC)
}

pub mod db {
    use anyhow::Result;
    use rusqlite::{OptionalExtension, Transaction};

    pub fn init_metadata_and_get_version(tx: &Transaction) -> Result<i32> {
        let create_db_metadata_sql = "
        CREATE TABLE IF NOT EXISTS `db_metadata` (
        `key`	TEXT NOT NULL,
        `value`	TEXT,
        PRIMARY KEY(`key`)
        )";
        tx.execute(create_db_metadata_sql, ())?;

        let version_str: Option<String> = tx
            .query_row(
                "SELECT `value` FROM `db_metadata` WHERE key='version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let version = match version_str {
            None => 0,
            Some(s) => s.parse()?,
        };
        Ok(version)
    }

    pub fn set_version_in_metadata(tx: &Transaction, version: i32) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
            ("version", version.to_string()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::db::{init_metadata_and_get_version, set_version_in_metadata};
    use rusqlite::Connection;

    #[test]
    fn metadata_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        assert_eq!(init_metadata_and_get_version(&tx).unwrap(), 0);
        set_version_in_metadata(&tx, 3).unwrap();
        assert_eq!(init_metadata_and_get_version(&tx).unwrap(), 3);
        tx.commit().unwrap();
    }

    #[test]
    fn random_token() {
        let token = super::random_token(8);
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
