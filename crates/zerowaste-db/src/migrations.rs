use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts, donations, requests)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE profiles (
                id                  TEXT PRIMARY KEY REFERENCES users(id),
                first_name          TEXT NOT NULL,
                last_name           TEXT NOT NULL DEFAULT '',
                avatar_url          TEXT,
                role                TEXT NOT NULL
                    CHECK (role IN ('donor', 'receiver', 'volunteer', 'admin')),
                organization_name   TEXT,
                is_verified         INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE donations (
                id              TEXT PRIMARY KEY,
                donor_id        TEXT NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                food_type       TEXT NOT NULL,
                is_vegetarian   INTEGER NOT NULL,
                quantity        REAL NOT NULL,
                quantity_unit   TEXT NOT NULL,
                expiry_date     TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                image_url       TEXT,
                latitude        REAL NOT NULL,
                longitude       REAL NOT NULL,
                address         TEXT NOT NULL DEFAULT '',
                city            TEXT NOT NULL DEFAULT '',
                postal_code     TEXT NOT NULL DEFAULT '',
                country         TEXT NOT NULL DEFAULT '',
                pickup_deadline TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'picked', 'verified', 'expired')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_donations_status ON donations(status, pickup_deadline);
            CREATE INDEX idx_donations_donor ON donations(donor_id);

            CREATE TABLE requests (
                id          TEXT PRIMARY KEY,
                donation_id TEXT NOT NULL REFERENCES donations(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                status      TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'rejected')),
                message     TEXT,
                created_at  TEXT NOT NULL,
                decided_at  TEXT
            );

            CREATE INDEX idx_requests_donation ON requests(donation_id);
            CREATE INDEX idx_requests_receiver ON requests(receiver_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (pickups, transactions, analytics)");
        conn.execute_batch(
            "
            ALTER TABLE donations ADD COLUMN picked_by TEXT REFERENCES users(id);

            CREATE TABLE transactions (
                id              TEXT PRIMARY KEY,
                donation_id     TEXT NOT NULL UNIQUE REFERENCES donations(id),
                donor_id        TEXT NOT NULL REFERENCES users(id),
                receiver_id     TEXT NOT NULL REFERENCES users(id),
                volunteer_id    TEXT REFERENCES users(id),
                completed_at    TEXT NOT NULL,
                feedback        TEXT,
                rating          INTEGER CHECK (rating BETWEEN 1 AND 5),
                food_saved_kg   REAL NOT NULL,
                co2_saved_kg    REAL NOT NULL,
                people_served   INTEGER
            );

            CREATE INDEX idx_transactions_receiver ON transactions(receiver_id);

            CREATE TABLE analytics (
                id                      TEXT PRIMARY KEY,
                total_transactions      INTEGER NOT NULL DEFAULT 0,
                food_saved_total_kg     REAL NOT NULL DEFAULT 0,
                co2_saved_total_kg      REAL NOT NULL DEFAULT 0,
                people_served_total     INTEGER NOT NULL DEFAULT 0,
                last_updated            TEXT
            );

            INSERT INTO analytics (id) VALUES ('global');

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
