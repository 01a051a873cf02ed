use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

use crate::{
    AllocationPolicy, BiasFactor, EngineError, NoopPreviewCache, PreviewCache, ResultEngine,
    default_epsilon,
};

mod donations;
mod group;
mod recipients;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Default lifetime of a memoized eligible group.
const DEFAULT_PREVIEW_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    preview_cache: Arc<dyn PreviewCache>,
    preview_ttl: Duration,
    epsilon: Decimal,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Allocation parameters for a request with the given bias factor.
    fn policy(&self, bias_factor: Option<Decimal>) -> ResultEngine<AllocationPolicy> {
        let bias = BiasFactor::from_optional(bias_factor)?;
        Ok(AllocationPolicy::new(bias).with_epsilon(self.epsilon))
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    preview_cache: Arc<dyn PreviewCache>,
    preview_ttl: Duration,
    epsilon: Decimal,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            preview_cache: Arc::new(NoopPreviewCache),
            preview_ttl: DEFAULT_PREVIEW_TTL,
            epsilon: default_epsilon(),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Memoize eligible groups for previews. Without it nothing is cached.
    pub fn preview_cache(mut self, cache: Arc<dyn PreviewCache>) -> EngineBuilder {
        self.preview_cache = cache;
        self
    }

    /// How long a memoized group stays valid. Defaults to 5 minutes.
    pub fn preview_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.preview_ttl = ttl;
        self
    }

    /// Redistribution threshold. Defaults to `0.0001`.
    pub fn epsilon(mut self, epsilon: Decimal) -> EngineBuilder {
        self.epsilon = epsilon;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.epsilon < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "epsilon must be >= 0, got {}",
                self.epsilon
            )));
        }
        Ok(Engine {
            database: self.database,
            preview_cache: self.preview_cache,
            preview_ttl: self.preview_ttl,
            epsilon: self.epsilon,
        })
    }
}
