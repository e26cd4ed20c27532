//! SQLite-dialect schema for the libSQL backend.
//!
//! Timestamps are RFC 3339 text in UTC with millisecond precision so they sort
//! and compare lexicographically. Money is decimal text. List fields are JSON.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attorneys (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    bar_association_id TEXT NOT NULL,
    bio TEXT NOT NULL DEFAULT '',
    education TEXT NOT NULL DEFAULT '',
    years_of_experience INTEGER NOT NULL DEFAULT 0,
    practice_areas TEXT NOT NULL DEFAULT '[]',
    hourly_rate TEXT NOT NULL DEFAULT '0',
    fixed_fee_packages TEXT NOT NULL DEFAULT '[]',
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    languages TEXT NOT NULL DEFAULT '[]',
    is_verified INTEGER NOT NULL DEFAULT 0,
    profile_image TEXT,
    timezone TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_attorneys_email ON attorneys(email);
CREATE UNIQUE INDEX IF NOT EXISTS idx_attorneys_bar_association_id ON attorneys(bar_association_id);
CREATE INDEX IF NOT EXISTS idx_attorneys_verified ON attorneys(is_verified);
CREATE INDEX IF NOT EXISTS idx_attorneys_location ON attorneys(city, state);

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_email ON clients(email);

CREATE TABLE IF NOT EXISTS matters (
    id TEXT PRIMARY KEY,
    attorney_id TEXT NOT NULL,
    client_id TEXT NOT NULL,
    title TEXT,
    last_message_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_matters_attorney_client ON matters(attorney_id, client_id);
CREATE INDEX IF NOT EXISTS idx_matters_attorney ON matters(attorney_id);

CREATE TABLE IF NOT EXISTS consultations (
    id TEXT PRIMARY KEY,
    attorney_id TEXT NOT NULL,
    client_id TEXT NOT NULL,
    matter_id TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    price TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    consultation_type TEXT NOT NULL,
    package_id TEXT,
    notes TEXT,
    slot_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_consultations_attorney ON consultations(attorney_id);
CREATE INDEX IF NOT EXISTS idx_consultations_client ON consultations(client_id);
CREATE INDEX IF NOT EXISTS idx_consultations_scheduled_at ON consultations(scheduled_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_consultations_active_slot
    ON consultations(attorney_id, slot_key) WHERE status != 'cancelled';

CREATE TABLE IF NOT EXISTS reviews (
    id TEXT PRIMARY KEY,
    attorney_id TEXT NOT NULL,
    client_name TEXT NOT NULL,
    client_email TEXT NOT NULL,
    rating INTEGER NOT NULL,
    comment TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reviews_attorney ON reviews(attorney_id);
CREATE INDEX IF NOT EXISTS idx_reviews_client_email ON reviews(client_email);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    matter_id TEXT NOT NULL,
    sender TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_matter ON messages(matter_id);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    matter_id TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    storage_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_matter ON files(matter_id);
"#;
