/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Lookup table keys are SMALLSERIAL.
pub type LookupId = i16;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
