//! Applies the embedded schema migrations.
//!
//! Usage:
//!   cargo run -p debate-api --bin debate-migrate
//!   cargo run -p debate-api --bin debate-migrate -- --test
//!
//! `--test` targets the `_test` database next to `DATABASE_URL`.

use std::path::Path;

use debate_api::config::with_test_db_suffix;
use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let mut database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");
    if std::env::args().any(|arg| arg == "--test") {
        database_url = with_test_db_suffix(&database_url);
    }

    let mut conn =
        PgConnection::establish(&database_url).expect("failed to connect to database");

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");

    if applied.is_empty() {
        println!("Schema is up to date.");
        return;
    }
    for migration in &applied {
        println!("  applied {migration}");
    }
    println!("{} migration(s) applied.", applied.len());
}
