//! storyserver: a social story-publishing service.
//!
//! Stories are published as numbered episodes, each carrying an immutable
//! history of versions. Readers like, favorite and follow; reports feed a
//! quarantine pipeline that admins resolve.

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

pub mod access;
pub mod accounts;
pub mod admin;
pub mod api_router;
pub mod auth;
pub mod config;
pub mod moderation;
pub mod shared;
pub mod stories;
pub mod tests;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
