//! Content unit operations.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::Utc;
use lectern_core::{ContentUnit, MediaFormat, SourceId};
use rusqlite::{params, Row};
use tracing::debug;

const UNIT_COLUMNS: &str = "id, source_id, source_name, media_format, text, subject, course, \
                            page, frame, timestamp, image_ref, chunk_index";

fn row_to_unit(row: &Row) -> rusqlite::Result<ContentUnit> {
    let source_id: String = row.get(1)?;
    let media_format: String = row.get(3)?;

    Ok(ContentUnit {
        id: row.get(0)?,
        source_id: SourceId::parse(&source_id).unwrap_or(SourceId::Named(source_id)),
        source_name: row.get(2)?,
        media_format: MediaFormat::from_str(&media_format).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(DbError::InvalidValue(format!("media format {}", media_format))),
            )
        })?,
        text: row.get(4)?,
        subject: row.get(5)?,
        course: row.get(6)?,
        page: row.get(7)?,
        frame: row.get(8)?,
        timestamp: row.get(9)?,
        image_ref: row.get(10)?,
        chunk_index: row.get(11)?,
    })
}

fn insert_units(tx: &rusqlite::Transaction, units: &[ContentUnit]) -> DbResult<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = tx.prepare(
        r#"
        INSERT OR REPLACE INTO content_units
            (id, source_id, source_name, media_format, text, subject, course,
             page, frame, timestamp, image_ref, chunk_index, ingested_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )?;

    for unit in units {
        stmt.execute(params![
            unit.id,
            unit.source_id.to_string(),
            unit.source_name,
            unit.media_format.as_str(),
            unit.text,
            unit.subject,
            unit.course,
            unit.page,
            unit.frame,
            unit.timestamp,
            unit.image_ref,
            unit.chunk_index,
            now,
        ])?;
    }
    Ok(())
}

impl Database {
    /// Insert or replace units by id in one transaction.
    pub fn upsert_units(&self, units: &[ContentUnit]) -> DbResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        insert_units(&tx, units)?;
        tx.commit()?;
        debug!("Upserted {} content units", units.len());
        Ok(units.len())
    }

    /// Drop every unit of `sources`, then insert `units`, atomically.
    ///
    /// Used on re-ingestion so units from an older version of a file
    /// do not linger.
    pub fn replace_source_units(&self, sources: &[SourceId], units: &[ContentUnit]) -> DbResult<(usize, usize)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut deleted = 0;
        for source in sources {
            deleted += tx.execute(
                "DELETE FROM content_units WHERE source_id = ?1",
                params![source.to_string()],
            )?;
        }
        insert_units(&tx, units)?;
        tx.commit()?;

        debug!(
            "Replaced {} units of {} sources with {} units",
            deleted,
            sources.len(),
            units.len()
        );
        Ok((deleted, units.len()))
    }

    /// Delete every unit derived from one source file.
    pub fn delete_units_by_source(&self, source_id: &SourceId) -> DbResult<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM content_units WHERE source_id = ?1",
            params![source_id.to_string()],
        )?;
        debug!("Deleted {} units for source {}", deleted, source_id);
        Ok(deleted)
    }

    /// List the units of one source file in a stable order.
    pub fn units_by_source(&self, source_id: &SourceId) -> DbResult<Vec<ContentUnit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM content_units WHERE source_id = ?1 \
             ORDER BY media_format, page, timestamp, chunk_index, image_ref, id",
            UNIT_COLUMNS
        ))?;

        let units = stmt
            .query_map(params![source_id.to_string()], row_to_unit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(units)
    }

    /// Get a unit by id.
    pub fn get_unit(&self, id: &str) -> DbResult<ContentUnit> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM content_units WHERE id = ?1", UNIT_COLUMNS),
            params![id],
            row_to_unit,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("Content unit not found: {}", id))
            }
            _ => DbError::from(e),
        })
    }

    /// Count stored units, optionally for one format.
    pub fn count_units(&self, media_format: Option<MediaFormat>) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = match media_format {
            Some(format) => conn.query_row(
                "SELECT COUNT(*) FROM content_units WHERE media_format = ?1",
                params![format.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM content_units", [], |row| row.get(0))?,
        };
        Ok(count)
    }
}
