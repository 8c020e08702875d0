//! # elif-entity: Schemaless entities for elif.rs
//!
//! Dynamic records over SQLite, MySQL/MariaDB and PostgreSQL. An [`Entity`]
//! represents one row of any table and acquires attributes at runtime; tables
//! and columns are created the first time they are saved to. [`EntityList`]
//! counts and fetches rows of a table as entities.
//!
//! Connection parameters come from `DB_*` settings (see [`config`]), read
//! from the environment and `.env` once per process.
//!
//! ```no_run
//! use elif_entity::{ConnectionManager, Entity, EntityList, EntityResult};
//!
//! # async fn run() -> EntityResult<()> {
//! let mut db = ConnectionManager::from_env();
//!
//! let mut book = Entity::dispense(&mut db, "book").await?;
//! book.set("title", "Dune");
//! book.set("pages", 412);
//! let id = book.save(&mut db).await?;
//!
//! let book = Entity::with_id(&mut db, "book", id).await?;
//! assert_eq!(book.get_i64("pages"), Some(412));
//!
//! let long_books = EntityList::find_by(&mut db, "book", "pages > 400").await?;
//! println!("{} of {} books", long_books.len(), EntityList::count(&mut db, "book").await?);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod list;
pub mod record;
pub mod security;
pub mod store;
pub mod value;

pub use backends::{BackendKind, DatabaseConnection, DatabaseRow, SqlDialect};
pub use config::{BackendConfig, Settings};
pub use connection::ConnectionManager;
pub use entity::Entity;
pub use error::{EntityError, EntityResult};
pub use list::EntityList;
pub use record::Record;
pub use store::RecordStore;
pub use value::Value;
