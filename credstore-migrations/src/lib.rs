use sqlx::migrate::Migrator;

pub static SQLITE_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub fn sqlite_migrator() -> &'static Migrator {
    &SQLITE_MIGRATOR
}
