//! Database row types: these map directly to SQLite rows.
//! Distinct from corkboard-types models to keep the DB layer independent.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use corkboard_types::models::Sticker;

use crate::StoreError;

pub struct StickerRow {
    pub id: String,
    pub board_id: i64,
    pub author_id: i64,
    pub x: i64,
    pub y: i64,
    pub text: String,
    pub color: i64,
    pub z_index: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl StickerRow {
    pub fn into_sticker(self) -> Result<Sticker, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| StoreError::Corrupt {
            id: self.id.clone(),
            reason: e.to_string(),
        })?;
        let created_at = parse_timestamp(&self.id, &self.created_at)?;
        let updated_at = parse_timestamp(&self.id, &self.updated_at)?;

        Ok(Sticker {
            id,
            board_id: self.board_id,
            author_id: self.author_id,
            x: self.x,
            y: self.y,
            text: self.text,
            color: self.color,
            z_index: self.z_index,
            created_at,
            updated_at,
        })
    }
}

/// Fixed-width RFC 3339 with microseconds, so that ORDER BY on the text
/// column sorts chronologically.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(earlier), "2024-01-01T09:00:00.000000Z");
    }

    #[test]
    fn corrupt_id_is_reported() {
        let row = StickerRow {
            id: "not-a-uuid".into(),
            board_id: 1,
            author_id: 1,
            x: 0,
            y: 0,
            text: String::new(),
            color: 0,
            z_index: 0,
            created_at: "2024-01-01T09:00:00.000000Z".into(),
            updated_at: "2024-01-01T09:00:00.000000Z".into(),
        };
        assert!(matches!(row.into_sticker(), Err(StoreError::Corrupt { .. })));
    }
}
