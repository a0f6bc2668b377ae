use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (stickers)");
        conn.execute_batch(
            "
            CREATE TABLE stickers (
                id          TEXT PRIMARY KEY,
                board_id    INTEGER NOT NULL,
                author_id   INTEGER NOT NULL,
                x           INTEGER NOT NULL DEFAULT 0,
                y           INTEGER NOT NULL DEFAULT 0,
                text        TEXT NOT NULL DEFAULT '',
                color       INTEGER NOT NULL DEFAULT 0,
                z_index     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX stickers_board_id_idx ON stickers(board_id);
            CREATE INDEX stickers_author_id_idx ON stickers(author_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
