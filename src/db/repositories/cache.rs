use anyhow::{anyhow, Result};
use bytes::Bytes;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::helpers::parse_status;
use crate::worker::Response;

pub struct CacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CacheRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn open(&self, partition: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO cache_partitions (name, created_at) VALUES (?1, ?2)",
            params![partition, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn exists(&self, partition: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM cache_partitions WHERE name = ?1",
                params![partition],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn lookup(&self, partition: &str, url: &str) -> Result<Option<Response>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, content_type, body
                 FROM cache_entries WHERE partition = ?1 AND url = ?2",
                params![partition, url],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(status, content_type, body)| {
            Ok(Response {
                status: parse_status(status)?,
                content_type,
                body: Bytes::from(body),
            })
        })
        .transpose()
    }

    pub fn store(&self, partition: &str, url: &str, response: &Response) -> Result<()> {
        if !self.exists(partition)? {
            return Err(anyhow!("cache partition '{partition}' is not open"));
        }
        self.conn.execute(
            "INSERT INTO cache_entries (partition, url, status, content_type, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(partition, url) DO UPDATE SET
                 status = excluded.status,
                 content_type = excluded.content_type,
                 body = excluded.body,
                 stored_at = excluded.stored_at",
            params![
                partition,
                url,
                i64::from(response.status.as_u16()),
                response.content_type,
                response.body.as_ref(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn partitions(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM cache_partitions ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn delete(&self, partition: &str) -> Result<bool> {
        self.conn.execute(
            "DELETE FROM cache_entries WHERE partition = ?1",
            params![partition],
        )?;
        let removed = self.conn.execute(
            "DELETE FROM cache_partitions WHERE name = ?1",
            params![partition],
        )?;
        Ok(removed > 0)
    }
}
