use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use corkboard_types::events::{CreateSticker, UpdateSticker};
use corkboard_types::models::{BoardId, Sticker};

use crate::models::{StickerRow, format_timestamp};
use crate::{Database, Result, StoreError};

const STICKER_COLUMNS: &str =
    "id, board_id, author_id, x, y, text, color, z_index, created_at, updated_at";

impl Database {
    /// All stickers of a board, bottom of the stack first.
    pub fn list_stickers(&self, board_id: BoardId) -> Result<Vec<Sticker>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STICKER_COLUMNS} FROM stickers
                 WHERE board_id = ?1
                 ORDER BY z_index ASC, created_at ASC"
            ))?;

            let rows = stmt
                .query_map([board_id], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(StickerRow::into_sticker).collect()
        })
    }

    pub fn get_sticker(&self, id: Uuid) -> Result<Option<Sticker>> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {STICKER_COLUMNS} FROM stickers WHERE id = ?1"),
                    [id.to_string()],
                    map_row,
                )
                .optional()?)
        })?;

        row.map(StickerRow::into_sticker).transpose()
    }

    pub fn create_sticker(&self, dto: &CreateSticker, now: DateTime<Utc>) -> Result<Sticker> {
        let id = Uuid::new_v4();
        let ts = format_timestamp(now);

        let row = self.with_conn(|conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO stickers
                        (id, board_id, author_id, x, y, text, color, z_index, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                     RETURNING {STICKER_COLUMNS}"
                ),
                params![
                    id.to_string(),
                    dto.board_id,
                    dto.author_id,
                    dto.x,
                    dto.y,
                    dto.text,
                    dto.color.unwrap_or(0),
                    dto.z_index.unwrap_or(0),
                    ts,
                ],
                map_row,
            )?)
        })?;

        row.into_sticker()
    }

    /// Partial update: unset fields keep their stored value.
    ///
    /// The lookup and the write take the lock separately, so two concurrent
    /// updates of one sticker race and the last write wins.
    pub fn update_sticker(&self, dto: &UpdateSticker, now: DateTime<Utc>) -> Result<Sticker> {
        let existing = self.get_sticker(dto.id)?.ok_or_else(|| StoreError::NotFound {
            id: dto.id.to_string(),
        })?;

        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "UPDATE stickers
                         SET x = ?2, y = ?3, text = ?4, color = ?5, z_index = ?6, updated_at = ?7
                         WHERE id = ?1
                         RETURNING {STICKER_COLUMNS}"
                    ),
                    params![
                        dto.id.to_string(),
                        dto.x.unwrap_or(existing.x),
                        dto.y.unwrap_or(existing.y),
                        dto.text.as_deref().unwrap_or(&existing.text),
                        dto.color.unwrap_or(existing.color),
                        dto.z_index.unwrap_or(existing.z_index),
                        format_timestamp(now),
                    ],
                    map_row,
                )
                .optional()?)
        })?;

        // Deleted between the lookup and the write
        row.ok_or_else(|| StoreError::NotFound {
            id: dto.id.to_string(),
        })?
        .into_sticker()
    }

    /// Returns the id of the removed sticker.
    pub fn delete_sticker(&self, id: Uuid) -> Result<Uuid> {
        let deleted: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "DELETE FROM stickers WHERE id = ?1 RETURNING id",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        match deleted {
            Some(_) => Ok(id),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<StickerRow> {
    Ok(StickerRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        author_id: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        text: row.get(5)?,
        color: row.get(6)?,
        z_index: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap()
    }

    fn new_sticker(board_id: BoardId, text: &str, z_index: Option<i64>) -> CreateSticker {
        CreateSticker {
            board_id,
            author_id: 1,
            x: 10,
            y: 20,
            text: text.to_string(),
            color: None,
            z_index,
        }
    }

    #[test]
    fn create_applies_defaults() {
        let db = Database::open_in_memory().unwrap();
        let sticker = db.create_sticker(&new_sticker(3, "hello", None), t(0)).unwrap();

        assert_eq!(sticker.board_id, 3);
        assert_eq!(sticker.color, 0);
        assert_eq!(sticker.z_index, 0);
        assert_eq!(sticker.created_at, t(0));
        assert_eq!(sticker.updated_at, t(0));
        assert_eq!(db.get_sticker(sticker.id).unwrap(), Some(sticker));
    }

    #[test]
    fn list_orders_by_z_index_then_created_at() {
        let db = Database::open_in_memory().unwrap();
        let top = db.create_sticker(&new_sticker(1, "top", Some(5)), t(0)).unwrap();
        let late = db.create_sticker(&new_sticker(1, "late", Some(1)), t(9)).unwrap();
        let early = db.create_sticker(&new_sticker(1, "early", Some(1)), t(2)).unwrap();
        let bottom = db.create_sticker(&new_sticker(1, "bottom", Some(-2)), t(5)).unwrap();
        db.create_sticker(&new_sticker(2, "other board", Some(0)), t(1)).unwrap();

        let ids: Vec<Uuid> = db.list_stickers(1).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![bottom.id, early.id, late.id, top.id]);
    }

    #[test]
    fn list_of_unknown_board_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.list_stickers(404).unwrap().is_empty());
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let db = Database::open_in_memory().unwrap();
        let original = db.create_sticker(&new_sticker(1, "keep", Some(3)), t(0)).unwrap();

        let patch = UpdateSticker {
            id: original.id,
            x: Some(99),
            ..Default::default()
        };
        let updated = db.update_sticker(&patch, t(30)).unwrap();

        assert_eq!(updated.x, 99);
        assert_eq!(updated.y, original.y);
        assert_eq!(updated.text, original.text);
        assert_eq!(updated.color, original.color);
        assert_eq!(updated.z_index, original.z_index);
        assert_eq!(updated.board_id, original.board_id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.updated_at, t(30));
    }

    #[test]
    fn update_missing_sticker_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let patch = UpdateSticker {
            id: Uuid::new_v4(),
            text: Some("ghost".into()),
            ..Default::default()
        };
        assert!(matches!(
            db.update_sticker(&patch, t(0)),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_twice_reports_not_found() {
        let db = Database::open_in_memory().unwrap();
        let sticker = db.create_sticker(&new_sticker(1, "bye", None), t(0)).unwrap();

        assert_eq!(db.delete_sticker(sticker.id).unwrap(), sticker.id);
        assert!(db.get_sticker(sticker.id).unwrap().is_none());
        assert!(matches!(
            db.delete_sticker(sticker.id),
            Err(StoreError::NotFound { .. })
        ));
    }
}
