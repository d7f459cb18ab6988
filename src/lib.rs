#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use mongodb::Client;
use rocket::{Build, Rocket};

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// The production server, connecting to the database named in the config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing::default())
}

/// A server using an existing database connection and the given database.
pub fn rocket_for_db(db_client: Client, db_name: &str) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(db_client)
        .attach(DatabaseFairing::new(db_name))
}

/// Connect to the database named by `db_uri` in the config.
#[cfg(test)]
pub(crate) async fn db_client() -> Client {
    let db_uri: String = rocket::Config::figment()
        .extract_inner("db_uri")
        .expect("`db_uri` not set");
    Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// A fresh database name, so concurrently running tests never share data.
#[cfg(test)]
pub(crate) fn database() -> String {
    format!("test{}", rand::random::<u32>())
}
