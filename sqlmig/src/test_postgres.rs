#![allow(dead_code)]

//! PostgreSQL test infrastructure module.
//!
//! Starts one shared PostgreSQL container per test run and hands each test
//! a freshly created database.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Once, OnceLock};

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use crate::postgres::PostgresDatabase;

/// Global PostgreSQL container port, set once the container is started
static POSTGRES_PORT: AtomicU16 = AtomicU16::new(0);

/// Ensures the container is started only once
static POSTGRES_INIT: Once = Once::new();

/// Tokio runtime for container management, kept alive for the whole test run
static TOKIO_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

/// Default credentials for testcontainers-modules postgres
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

fn ensure_postgres_started() {
    POSTGRES_INIT.call_once(|| {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

        let port = rt.block_on(async {
            let container = Postgres::default()
                .start()
                .await
                .expect("failed to start postgres container");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("failed to get postgres port");
            // Leak the container to keep it alive for the test duration
            std::mem::forget(container);
            port
        });

        POSTGRES_PORT.store(port, Ordering::SeqCst);
        let _ = TOKIO_RT.set(rt);
    });
}

fn url_with_db(db: &str) -> String {
    ensure_postgres_started();
    format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER,
        PG_PASSWORD,
        POSTGRES_PORT.load(Ordering::SeqCst),
        db
    )
}

/// Create a fresh PostgreSQL database with a unique name and connect to it.
pub fn fresh_postgres_db() -> (Client, String) {
    let mut admin =
        Client::connect(&url_with_db(PG_DB), NoTls).expect("failed to connect as admin");

    let db_name = format!("test_{}", Uuid::new_v4().simple());
    admin
        .execute(&format!("CREATE DATABASE \"{}\"", db_name), &[])
        .expect("failed to create test database");
    drop(admin);

    let client =
        Client::connect(&url_with_db(&db_name), NoTls).expect("failed to connect to test database");
    (client, db_name)
}

/// A [PostgresDatabase] connected to a fresh, isolated database.
pub fn get_test_database() -> PostgresDatabase {
    let (client, _db_name) = fresh_postgres_db();
    PostgresDatabase::from_client(client)
}
