//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Once;

use storm::{Entity, SqlEnum};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, SqlEnum)]
pub enum Status {
    Active = 1,
    Retired = 2,
}

#[derive(Debug, Clone, Entity)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Entity)]
pub struct Person {
    pub id: i32,
    #[column(name = "FullName")]
    pub name: String,
    pub status: Status,
    pub nickname: Option<String>,
    #[owned]
    pub address: Address,
    /// Composite without owned designation: not mapped
    pub manager: Option<Address>,
    /// Sequence of scalars: not mapped
    pub tags: Vec<String>,
    #[not_mapped]
    pub display: String,
    secret: String,
}

impl Person {
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

pub fn person() -> Person {
    Person {
        id: 7,
        name: "Ada Lovelace".to_string(),
        status: Status::Active,
        nickname: None,
        address: Address {
            street: "12 St James's Square".to_string(),
            city: "London".to_string(),
            zip: None,
        },
        manager: None,
        tags: vec!["math".to_string()],
        display: "Ada".to_string(),
        secret: "analytical engine".to_string(),
    }
}

/// No key and no `id` member
#[derive(Debug, Clone, Entity)]
pub struct AuditEntry {
    pub message: String,
}

/// Explicit key next to a member named `id`
#[derive(Debug, Clone, Entity)]
pub struct Ticket {
    pub id: i32,
    #[key]
    #[generated(none)]
    pub code: String,
}

#[derive(Debug, Clone, Entity)]
pub struct Membership {
    #[key]
    #[generated(none)]
    pub group_id: i32,
    #[key]
    #[generated(none)]
    pub user_id: i32,
    pub role: String,
}
