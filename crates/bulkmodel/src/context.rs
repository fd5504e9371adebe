//! A connection bound to its dialect and bulk configuration.

use bulkmodel_core::{Connection, Cx, Dialect, Error, Outcome};
use bulkmodel_mapping::{RootEntity, TableMapping};
use bulkmodel_writer::{BulkConfig, Filter, OwnedRows, UpsertSummary, bulk_upsert, query_mapped};

/// Ties a [`Connection`] to the dialect it speaks and a default
/// [`BulkConfig`], so call sites only pass entities and filters.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = BulkContext::new(conn).with_config(BulkConfig::default().calculate_stats(true));
///
/// let summary = ctx.upsert(&cx, &roots).await?;
/// let stored: NestedRoot = ctx
///     .query::<NestedRoot>(&cx, &Filter::key_eq("nestedrootid"))
///     .await?
///     .single()?;
/// ```
#[derive(Debug)]
pub struct BulkContext<C: Connection> {
    connection: C,
    dialect: Dialect,
    config: BulkConfig,
}

impl<C: Connection> BulkContext<C> {
    /// Bind a connection with the default configuration.
    pub fn new(connection: C) -> Self {
        let dialect = connection.dialect();
        Self {
            connection,
            dialect,
            config: BulkConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: BulkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Consume the context and return the underlying connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Upsert `entities` with the context's configuration.
    pub async fn upsert<T: RootEntity>(
        &self,
        cx: &Cx,
        entities: &[T],
    ) -> Outcome<UpsertSummary, Error> {
        self.upsert_with(cx, entities, &self.config).await
    }

    /// Upsert `entities` with a one-off configuration.
    pub async fn upsert_with<T: RootEntity>(
        &self,
        cx: &Cx,
        entities: &[T],
        config: &BulkConfig,
    ) -> Outcome<UpsertSummary, Error> {
        tracing::debug!(
            entities = entities.len(),
            dialect = %self.dialect,
            "Bulk context upsert"
        );
        bulk_upsert(cx, &self.connection, self.dialect, entities, config).await
    }

    /// Read entities matching `filter`, using the context's naming convention.
    pub async fn query<T: RootEntity>(
        &self,
        cx: &Cx,
        filter: &Filter,
    ) -> Outcome<OwnedRows<T>, Error> {
        let mapping = match TableMapping::of_with::<T>(self.config.naming.clone()) {
            Ok(mapping) => mapping,
            Err(e) => return Outcome::Err(e),
        };
        query_mapped(cx, &self.connection, self.dialect, mapping, filter).await
    }

    /// The entity stored under `key`, if any.
    pub async fn find<T: RootEntity>(
        &self,
        cx: &Cx,
        key: impl Into<bulkmodel_core::Value>,
    ) -> Outcome<Option<T>, Error> {
        let filter = Filter::key_eq(key);
        match self.query::<T>(cx, &filter).await {
            Outcome::Ok(mut rows) => match rows.next() {
                Some(Ok(entity)) => Outcome::Ok(Some(entity)),
                Some(Err(e)) => Outcome::Err(e),
                None => Outcome::Ok(None),
            },
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}
