pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod storage;
pub mod services;
pub mod controllers;
pub mod middleware;

use std::sync::Arc;

use services::{catalog::EventCatalog, ledger::SeatLedger, lifecycle::SystemClock};
use storage::PgLedgerStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub ledger: SeatLedger<PgLedgerStore>,
    pub catalog: EventCatalog<PgLedgerStore>,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database).await?;
        tracing::info!("Database connected");

        db.run_migrations().await?;

        let state = Self::with_database(db, config);

        if state.config.features.seed_demo_data {
            services::seed::seed_demo_data(&state).await?;
        }

        Ok(state)
    }

    /// Собрать состояние поверх готового пула, без миграций.
    pub fn with_database(db: database::Database, config: config::Config) -> Arc<Self> {
        let store = PgLedgerStore::new(db.pool.clone(), config.booking.lock_timeout());
        let clock = SystemClock::from_offset_minutes(config.booking.utc_offset_minutes);

        Arc::new(Self {
            ledger: SeatLedger::new(store.clone(), clock),
            catalog: EventCatalog::new(store, clock),
            db,
            config,
        })
    }
}
