//! SQL schema for the KBO SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE … IF NOT EXISTS`. The projection tables (`company_document`,
//! `company_location`, `company_fts`, `company_fts_map`) are additionally
//! dropped and recreated by their builders, from the same DDL constants.

/// The read projection: one JSON document per enterprise.
pub const COMPANY_DOCUMENT_DDL: &str = "
CREATE TABLE IF NOT EXISTS company_document (
    enterprise_number INTEGER PRIMARY KEY,
    payload           TEXT NOT NULL CHECK (json_valid(payload)),
    json_version      INTEGER NOT NULL,
    etag              TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    source_import_id  TEXT
);
";

/// One row per addressed entity with its owning enterprise resolved;
/// the address side of the structured search.
pub const COMPANY_LOCATION_DDL: &str = "
CREATE TABLE IF NOT EXISTS company_location (
    enterprise_number INTEGER NOT NULL,
    entity_number     TEXT NOT NULL,
    zipcode           TEXT NOT NULL DEFAULT '',
    municipality_nl   TEXT NOT NULL DEFAULT '',
    municipality_fr   TEXT NOT NULL DEFAULT '',
    street_nl         TEXT NOT NULL DEFAULT '',
    street_fr         TEXT NOT NULL DEFAULT '',
    house_number      TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS company_location_enterprise_idx
    ON company_location(enterprise_number);
";

/// Contentless inverted index over the documents' `fts` subtree.
///
/// Tokenizer and prefix lengths are part of the on-disk contract shared with
/// the free-text planner; the column order is frozen because the BM25 weight
/// vector addresses columns by position.
pub const COMPANY_FTS_DDL: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS company_fts USING fts5(
    company_name,
    commercial_name,
    street_nl,
    street_fr,
    city_nl,
    city_fr,
    postal_code,
    activity_desc_nl,
    activity_desc_fr,
    activity_desc_de,
    activity_desc_en,
    content = '',
    tokenize = \"unicode61 remove_diacritics 2 tokenchars '.-/'\",
    prefix = '2 3 4'
);
CREATE TABLE IF NOT EXISTS company_fts_map (
    rowid             INTEGER PRIMARY KEY AUTOINCREMENT,
    enterprise_number INTEGER NOT NULL UNIQUE
);
";

/// Full base schema.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    variable TEXT PRIMARY KEY,
    value    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS code (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    category   TEXT NOT NULL,
    code_value TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS code_category_value_idx
    ON code(category, code_value);

CREATE TABLE IF NOT EXISTS code_description (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    code_id     INTEGER NOT NULL REFERENCES code(id),
    language    TEXT NOT NULL,
    description TEXT NOT NULL,
    UNIQUE (code_id, language)
);

CREATE TABLE IF NOT EXISTS enterprise (
    enterprise_number      INTEGER PRIMARY KEY,
    juridical_situation_id INTEGER NOT NULL REFERENCES code(id),
    type_of_enterprise_id  INTEGER NOT NULL REFERENCES code(id),
    juridical_form_id      INTEGER REFERENCES code(id),
    juridical_form_cac_id  INTEGER REFERENCES code(id),
    start_date             TEXT
);

CREATE TABLE IF NOT EXISTS establishment (
    establishment_number TEXT PRIMARY KEY,
    start_date           TEXT,
    enterprise_number    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS establishment_enterprise_idx
    ON establishment(enterprise_number);

CREATE TABLE IF NOT EXISTS branch (
    id                TEXT PRIMARY KEY,
    start_date        TEXT,
    enterprise_number INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS branch_enterprise_idx
    ON branch(enterprise_number);

CREATE TABLE IF NOT EXISTS address (
    entity_number      TEXT NOT NULL,
    type_of_address_id INTEGER NOT NULL REFERENCES code(id),
    country_nl         TEXT NOT NULL DEFAULT '',
    country_fr         TEXT NOT NULL DEFAULT '',
    zipcode            TEXT NOT NULL DEFAULT '',
    municipality_nl    TEXT NOT NULL DEFAULT '',
    municipality_fr    TEXT NOT NULL DEFAULT '',
    street_nl          TEXT NOT NULL DEFAULT '',
    street_fr          TEXT NOT NULL DEFAULT '',
    house_number       TEXT NOT NULL DEFAULT '',
    box_number         TEXT NOT NULL DEFAULT '',
    extra_info         TEXT NOT NULL DEFAULT '',
    date_striking_off  TEXT,
    PRIMARY KEY (entity_number, type_of_address_id)
);

CREATE TABLE IF NOT EXISTS denomination (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_number           TEXT NOT NULL,
    language_id             INTEGER NOT NULL REFERENCES code(id),
    type_of_denomination_id INTEGER NOT NULL REFERENCES code(id),
    value                   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS denomination_entity_idx
    ON denomination(entity_number);

CREATE TABLE IF NOT EXISTS contact (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_number     TEXT NOT NULL,
    entity_contact_id INTEGER NOT NULL REFERENCES code(id),
    contact_type_id   INTEGER NOT NULL REFERENCES code(id),
    value             TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS contact_entity_idx
    ON contact(entity_number);

CREATE TABLE IF NOT EXISTS activity (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_number     TEXT NOT NULL,
    activity_group_id INTEGER NOT NULL REFERENCES code(id),
    classification_id INTEGER NOT NULL REFERENCES code(id),
    nace_code_id      INTEGER NOT NULL REFERENCES code(id)
);
CREATE INDEX IF NOT EXISTS activity_entity_idx
    ON activity(entity_number);

-- SQL counterpart of the two-dots entity classifier: maps any entity_number
-- (dotted enterprise number, establishment number, or branch id) to its
-- owning enterprise.
CREATE VIEW IF NOT EXISTS entity_owner AS
    SELECT printf('%04d.%03d.%03d',
                  enterprise_number / 1000000,
                  (enterprise_number / 1000) % 1000,
                  enterprise_number % 1000) AS entity_number,
           enterprise_number
    FROM enterprise
    UNION ALL
    SELECT establishment_number, enterprise_number FROM establishment
    UNION ALL
    SELECT id, enterprise_number FROM branch;
";
