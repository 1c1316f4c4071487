use sqlx::SqlitePool;

use super::StoreError;

/// Column names and units here are read directly by external reporting
/// tools; `*_kw` is always kilowatts and `timestamp` always RFC 3339 UTC.
const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp      TEXT    NOT NULL,
        production_kw  REAL    NOT NULL,
        consumption_kw REAL    NOT NULL,
        net_export_kw  REAL    NOT NULL,
        source         TEXT    NOT NULL CHECK (source IN ('gateway_real', 'fallback_synthetic'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_readings_timestamp ON readings(timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS device_readings (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp      TEXT    NOT NULL,
        device_id      TEXT    NOT NULL,
        device_class   TEXT    NOT NULL,
        power_kw       REAL    NOT NULL,
        voltage        REAL    NOT NULL,
        current_a      REAL    NOT NULL,
        frequency_hz   REAL    NOT NULL,
        temperature_c  REAL    NOT NULL,
        status         TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_device_readings_device_ts ON device_readings(device_id, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS weather_observations (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp          TEXT    NOT NULL,
        temperature_c      REAL,
        feels_like_c       REAL,
        humidity_pct       INTEGER,
        pressure_hpa       INTEGER,
        visibility_km      REAL,
        clouds_pct         INTEGER,
        wind_speed_ms      REAL,
        wind_direction_deg INTEGER,
        condition          TEXT,
        description        TEXT,
        icon               TEXT,
        sunrise            INTEGER,
        sunset             INTEGER,
        city               TEXT,
        country            TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_weather_observations_timestamp ON weather_observations(timestamp)",
];

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
