//! Minimal tables read and written by chart generation.
//!
//! Production schemas are normally applied out-of-band from
//! `sql/schema/01_motes.sql`; these statements mirror that file and are
//! idempotent.

pub const POSTGRES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT,
        category    SMALLINT NOT NULL,
        auth_status SMALLINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id              BIGSERIAL PRIMARY KEY,
        device_id       BIGINT NOT NULL REFERENCES devices (id),
        collect_date    TIMESTAMPTZ NOT NULL,
        last_collection DOUBLE PRECISION NOT NULL,
        total           DOUBLE PRECISION NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS readings_device_collect_idx ON readings (device_id, collect_date)",
    r#"
    CREATE TABLE IF NOT EXISTS chart_pointers (
        category  SMALLINT PRIMARY KEY,
        file_path TEXT NOT NULL
    )
    "#,
];

// collect_date is TEXT: RFC 3339 for aware values, offset-less for naive ones.
pub const SQLITE: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT,
        category    INTEGER NOT NULL,
        auth_status INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id       INTEGER NOT NULL REFERENCES devices (id),
        collect_date    TEXT NOT NULL,
        last_collection REAL NOT NULL,
        total           REAL NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS readings_device_collect_idx ON readings (device_id, collect_date)",
    r#"
    CREATE TABLE IF NOT EXISTS chart_pointers (
        category  INTEGER PRIMARY KEY,
        file_path TEXT NOT NULL
    )
    "#,
];
