/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// GHG Protocol scope (1 = direct, 2 = purchased energy, 3 = value chain).
pub type Scope = i16;
