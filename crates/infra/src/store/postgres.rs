//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate document code or concurrent first write of a stock row |
//! | Database (serialization failure) | `40001` | `Conflict` | Transaction lost a serialization race |
//! | Database (other) | Any other | `Persistence` | Constraint or server errors |
//! | Other | N/A | `Persistence` | Pool closed, network errors, decode failures |
//!
//! A guarded `UPDATE ... WHERE version = $n` that touches no row is also a
//! `Conflict`: somebody else bumped the row since it was read.
//!
//! ## Sync Facade
//!
//! [`LedgerStore`] is synchronous. The async inherent methods are driven on the
//! runtime handle the store was built with; when called from a multi-threaded
//! runtime worker the call is wrapped in `block_in_place`.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use stockflow_core::{
    Column, DomainError, DomainResult, LocationId, MovementId, Page, PartyId, ProductId,
    QueryComposer, RecordState, SortDirection, Stamp, StateFilter, UserId,
};
use stockflow_inventory::{
    Counterparty, DocumentStatus, DocumentType, MovementColumn, MovementDocument, MovementHeader,
    MovementLine, StockColumn, StockKey, StockMutation, StockRecord,
};

use super::{LedgerStore, UnitOfWork};

const SCHEMA: &str = include_str!("../../migrations/0001_stock_ledger.sql");

/// Postgres ledger store.
///
/// Every [`UnitOfWork`] runs in one transaction; the first failed guard rolls
/// the whole unit back.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    /// Create the ledger tables if they are missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        if Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.runtime.block_on(future))
        } else {
            self.runtime.block_on(future)
        }
    }

    #[instrument(skip(self, key), fields(key = %key), err)]
    pub async fn load_stock(&self, key: StockKey) -> DomainResult<Option<StockRecord>> {
        let row = sqlx::query(
            r#"
            SELECT location_id, product_id, quantity, unit_price, updated_by, updated_at, version
            FROM stock_records
            WHERE location_id = $1 AND product_id = $2
            "#,
        )
        .bind(key.location_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stock", e))?;

        row.as_ref().map(stock_from_row).transpose()
    }

    #[instrument(skip(self, query), err)]
    pub async fn query_stock(
        &self,
        location: Option<LocationId>,
        query: &QueryComposer<StockColumn>,
    ) -> DomainResult<Page<StockRecord>> {
        // Ledger rows are always active.
        if !query.state().admits(RecordState::Active) {
            return Ok(Page {
                items: vec![],
                total: 0,
                pagination: query.window(),
            });
        }

        let filters = ListFilters {
            table: "stock_records",
            time_column: "updated_at",
            status: None,
            location: location.map(|l| *l.as_uuid()),
        };

        let total = self.count(&filters, query).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {STOCK_COLUMNS} FROM "));
        filters.push_where(&mut select, query);
        push_order_and_window(&mut select, query);

        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_stock", e))?;

        let items = rows.iter().map(stock_from_row).collect::<DomainResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total,
            pagination: query.window(),
        })
    }

    #[instrument(skip(self, id), fields(movement_id = %id), err)]
    pub async fn load_movement(&self, id: MovementId) -> DomainResult<Option<MovementDocument>> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM movement_headers WHERE id = $1");
        let Some(row) = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_movement", e))?
        else {
            return Ok(None);
        };
        let header = header_from_row(&row)?;

        let lines = sqlx::query(
            r#"
            SELECT movement_id, line_number, product_id, quantity, unit_price, line_total
            FROM movement_lines
            WHERE movement_id = $1
            ORDER BY line_number ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_movement_lines", e))?
        .iter()
        .map(line_from_row)
        .collect::<DomainResult<Vec<_>>>()?;

        Ok(Some(MovementDocument { header, lines }))
    }

    #[instrument(skip(self, query), err)]
    pub async fn query_movements(
        &self,
        query: &QueryComposer<MovementColumn>,
    ) -> DomainResult<Page<MovementHeader>> {
        let status = match query.state() {
            StateFilter::All => None,
            StateFilter::Active => Some("active"),
            StateFilter::Inactive => Some("cancelled"),
        };
        let filters = ListFilters {
            table: "movement_headers",
            time_column: "created_at",
            status,
            location: None,
        };

        let total = self.count(&filters, query).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {HEADER_COLUMNS} FROM "));
        filters.push_where(&mut select, query);
        push_order_and_window(&mut select, query);

        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_movements", e))?;

        let items = rows.iter().map(header_from_row).collect::<DomainResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total,
            pagination: query.window(),
        })
    }

    async fn count<C: Column>(
        &self,
        filters: &ListFilters,
        query: &QueryComposer<C>,
    ) -> DomainResult<u64> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM ");
        filters.push_where(&mut count, query);
        let row = count
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count", e))?;
        Ok(total as u64)
    }

    #[instrument(skip(self, document_type), fields(document_type = %document_type), err)]
    pub async fn advance_sequence(&self, document_type: DocumentType) -> DomainResult<u64> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_sequences (document_type, last_value)
            VALUES ($1, 1)
            ON CONFLICT (document_type)
            DO UPDATE SET last_value = document_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(document_type.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_sequence", e))?;

        let value: i64 = row
            .try_get("last_value")
            .map_err(|e| map_sqlx_error("advance_sequence", e))?;
        Ok(value as u64)
    }

    /// Apply a unit of work in one transaction.
    #[instrument(
        skip(self, unit),
        fields(
            stock_writes = unit.stock.len(),
            inserts = unit.inserts.len(),
            cancellations = unit.cancellations.len()
        ),
        err
    )]
    pub async fn commit_unit(&self, unit: UnitOfWork) -> DomainResult<()> {
        if unit.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Err(err) = apply_unit(&mut tx, &unit).await {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

impl LedgerStore for PostgresLedgerStore {
    fn stock(&self, key: StockKey) -> DomainResult<Option<StockRecord>> {
        self.block_on(self.load_stock(key))
    }

    fn list_stock(
        &self,
        location: Option<LocationId>,
        query: &QueryComposer<StockColumn>,
    ) -> DomainResult<Page<StockRecord>> {
        self.block_on(self.query_stock(location, query))
    }

    fn movement(&self, id: MovementId) -> DomainResult<Option<MovementDocument>> {
        self.block_on(self.load_movement(id))
    }

    fn list_movements(
        &self,
        query: &QueryComposer<MovementColumn>,
    ) -> DomainResult<Page<MovementHeader>> {
        self.block_on(self.query_movements(query))
    }

    fn next_sequence(&self, document_type: DocumentType) -> DomainResult<u64> {
        self.block_on(self.advance_sequence(document_type))
    }

    fn commit(&self, unit: UnitOfWork) -> DomainResult<()> {
        self.block_on(self.commit_unit(unit))
    }
}

async fn apply_unit(tx: &mut Transaction<'_, Postgres>, unit: &UnitOfWork) -> DomainResult<()> {
    for mutation in &unit.stock {
        apply_stock_mutation(tx, mutation).await?;
    }
    for document in &unit.inserts {
        insert_document(tx, document).await?;
    }
    for header in &unit.cancellations {
        cancel_header(tx, header).await?;
    }
    Ok(())
}

async fn apply_stock_mutation(
    tx: &mut Transaction<'_, Postgres>,
    mutation: &StockMutation,
) -> DomainResult<()> {
    let result = match mutation {
        StockMutation::Create { record } => sqlx::query(
            r#"
            INSERT INTO stock_records
                (location_id, product_id, quantity, unit_price, updated_by, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, 1)
            ON CONFLICT (location_id, product_id) DO NOTHING
            "#,
        )
        .bind(record.location_id.as_uuid())
        .bind(record.product_id.as_uuid())
        .bind(record.quantity)
        .bind(record.unit_price)
        .bind(record.last_updated.user.as_uuid())
        .bind(record.last_updated.at)
        .execute(&mut **tx)
        .await,
        StockMutation::Quantity {
            key,
            expected_version,
            quantity,
            stamp,
        } => sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = $3, updated_by = $4, updated_at = $5, version = version + 1
            WHERE location_id = $1 AND product_id = $2 AND version = $6
            "#,
        )
        .bind(key.location_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(*quantity)
        .bind(stamp.user.as_uuid())
        .bind(stamp.at)
        .bind(*expected_version as i64)
        .execute(&mut **tx)
        .await,
        StockMutation::Price {
            key,
            expected_version,
            unit_price,
            stamp,
        } => sqlx::query(
            r#"
            UPDATE stock_records
            SET unit_price = $3, updated_by = $4, updated_at = $5, version = version + 1
            WHERE location_id = $1 AND product_id = $2 AND version = $6
            "#,
        )
        .bind(key.location_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(*unit_price)
        .bind(stamp.user.as_uuid())
        .bind(stamp.at)
        .bind(*expected_version as i64)
        .execute(&mut **tx)
        .await,
    }
    .map_err(|e| map_sqlx_error("apply_stock_mutation", e))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::conflict(format!(
            "stock record for {} changed concurrently (expected {:?})",
            mutation.key(),
            mutation.expected()
        )));
    }
    Ok(())
}

async fn insert_document(
    tx: &mut Transaction<'_, Postgres>,
    document: &MovementDocument,
) -> DomainResult<()> {
    let header = &document.header;
    let (kind, counterparty_id, peer_location) = counterparty_columns(&header.counterparty);

    sqlx::query(
        r#"
        INSERT INTO movement_headers (
            id, code, document_type, location_id,
            counterparty_kind, counterparty_id, peer_location_id,
            total_amount, annotations, status,
            created_by, created_at, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', $10, $11, $12)
        "#,
    )
    .bind(header.id.as_uuid())
    .bind(&header.code)
    .bind(header.document_type.as_str())
    .bind(header.location_id.as_uuid())
    .bind(kind)
    .bind(counterparty_id)
    .bind(peer_location)
    .bind(header.total_amount)
    .bind(header.annotations.as_deref())
    .bind(header.created.user.as_uuid())
    .bind(header.created.at)
    .bind(header.version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement_header", e))?;

    for line in &document.lines {
        sqlx::query(
            r#"
            INSERT INTO movement_lines
                (movement_id, line_number, product_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.movement_id.as_uuid())
        .bind(line.line_number as i32)
        .bind(line.product_id.as_uuid())
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement_line", e))?;
    }
    Ok(())
}

async fn cancel_header(
    tx: &mut Transaction<'_, Postgres>,
    header: &MovementHeader,
) -> DomainResult<()> {
    let stamp = header.cancelled().ok_or_else(|| {
        DomainError::invalid_state(format!("movement {} is not cancelled", header.code))
    })?;

    let result = sqlx::query(
        r#"
        UPDATE movement_headers
        SET status = 'cancelled', cancelled_by = $2, cancelled_at = $3, version = version + 1
        WHERE id = $1 AND version = $4 AND status = 'active'
        "#,
    )
    .bind(header.id.as_uuid())
    .bind(stamp.user.as_uuid())
    .bind(stamp.at)
    .bind(header.version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("cancel_movement", e))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::conflict(format!(
            "movement {} changed concurrently",
            header.code
        )));
    }
    Ok(())
}

// Filter and sort composition. Column names only ever come from `Column::sql_name`.

struct ListFilters {
    table: &'static str,
    time_column: &'static str,
    status: Option<&'static str>,
    location: Option<Uuid>,
}

impl ListFilters {
    fn push_where<C: Column>(&self, qb: &mut QueryBuilder<'_, Postgres>, query: &QueryComposer<C>) {
        qb.push(self.table);
        qb.push(" WHERE TRUE");

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(location) = self.location {
            qb.push(" AND location_id = ").push_bind(location);
        }

        let (from, to) = query.date_range();
        push_date_bound(qb, self.time_column, ">=", from);
        push_date_bound(qb, self.time_column, "<=", to);

        if let Some((column, needle)) = query.search() {
            qb.push(" AND CAST(")
                .push(column.sql_name())
                .push(" AS TEXT) ILIKE ")
                .push_bind(format!("%{}%", escape_like(needle)))
                .push(" ESCAPE '\\'");
        }
    }
}

fn push_date_bound(
    qb: &mut QueryBuilder<'_, Postgres>,
    column: &'static str,
    op: &'static str,
    bound: Option<NaiveDate>,
) {
    if let Some(date) = bound {
        qb.push(" AND (")
            .push(column)
            .push(" AT TIME ZONE 'UTC')::date ")
            .push(op)
            .push(" ")
            .push_bind(date);
    }
}

fn push_order_and_window<C: Column>(qb: &mut QueryBuilder<'_, Postgres>, query: &QueryComposer<C>) {
    let (column, direction) = query.sort();
    let dir = match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };

    let mut parts: Vec<&str> = column.sql_name().split(", ").collect();
    if column != C::primary() {
        parts.extend(C::primary().sql_name().split(", "));
    }
    let order = parts
        .iter()
        .map(|p| format!("{p} {dir}"))
        .collect::<Vec<_>>()
        .join(", ");
    qb.push(" ORDER BY ").push(order);

    if let Some(page) = query.window() {
        qb.push(" LIMIT ")
            .push_bind(i64::from(page.page_size))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// Row mapping

const STOCK_COLUMNS: &str =
    "location_id, product_id, quantity, unit_price, updated_by, updated_at, version";

const HEADER_COLUMNS: &str = "id, code, document_type, location_id, counterparty_kind, \
    counterparty_id, peer_location_id, total_amount, annotations, status, cancelled_by, \
    cancelled_at, created_by, created_at, version";

fn counterparty_columns(counterparty: &Counterparty) -> (&'static str, Uuid, Option<Uuid>) {
    match counterparty {
        Counterparty::Consumer { party_id } => ("consumer", *party_id.as_uuid(), None),
        Counterparty::Supplier { party_id } => ("supplier", *party_id.as_uuid(), None),
        Counterparty::Transfer {
            paired_movement,
            peer_location,
        } => (
            "transfer",
            *paired_movement.as_uuid(),
            Some(*peer_location.as_uuid()),
        ),
    }
}

fn decode<'r, T>(row: &'r PgRow, column: &str) -> DomainResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(|e| {
        DomainError::persistence(format!("failed to read column {column}: {e}"))
    })
}

fn stock_from_row(row: &PgRow) -> DomainResult<StockRecord> {
    let version: i64 = decode(row, "version")?;
    Ok(StockRecord {
        location_id: LocationId::from_uuid(decode(row, "location_id")?),
        product_id: ProductId::from_uuid(decode(row, "product_id")?),
        quantity: decode(row, "quantity")?,
        unit_price: decode(row, "unit_price")?,
        last_updated: Stamp::new(
            UserId::from_uuid(decode(row, "updated_by")?),
            decode(row, "updated_at")?,
        ),
        version: version as u64,
    })
}

fn header_from_row(row: &PgRow) -> DomainResult<MovementHeader> {
    let kind: String = decode(row, "counterparty_kind")?;
    let counterparty_id: Uuid = decode(row, "counterparty_id")?;
    let counterparty = match kind.as_str() {
        "consumer" => Counterparty::Consumer {
            party_id: PartyId::from_uuid(counterparty_id),
        },
        "supplier" => Counterparty::Supplier {
            party_id: PartyId::from_uuid(counterparty_id),
        },
        "transfer" => {
            let peer: Option<Uuid> = decode(row, "peer_location_id")?;
            let peer = peer.ok_or_else(|| {
                DomainError::persistence("transfer header without peer location")
            })?;
            Counterparty::Transfer {
                paired_movement: MovementId::from_uuid(counterparty_id),
                peer_location: LocationId::from_uuid(peer),
            }
        }
        other => {
            return Err(DomainError::persistence(format!(
                "unknown counterparty kind: {other}"
            )));
        }
    };

    let status: String = decode(row, "status")?;
    let status = match status.as_str() {
        "active" => DocumentStatus::Active,
        "cancelled" => {
            let by: Option<Uuid> = decode(row, "cancelled_by")?;
            let at: Option<DateTime<Utc>> = decode(row, "cancelled_at")?;
            match (by, at) {
                (Some(by), Some(at)) => DocumentStatus::Cancelled {
                    cancelled: Stamp::new(UserId::from_uuid(by), at),
                },
                _ => {
                    return Err(DomainError::persistence(
                        "cancelled header without cancellation stamp",
                    ));
                }
            }
        }
        other => {
            return Err(DomainError::persistence(format!(
                "unknown document status: {other}"
            )));
        }
    };

    let document_type: String = decode(row, "document_type")?;
    let version: i64 = decode(row, "version")?;

    Ok(MovementHeader {
        id: MovementId::from_uuid(decode(row, "id")?),
        code: decode(row, "code")?,
        document_type: document_type
            .parse()
            .map_err(|e: DomainError| DomainError::persistence(e.to_string()))?,
        location_id: LocationId::from_uuid(decode(row, "location_id")?),
        counterparty,
        total_amount: decode(row, "total_amount")?,
        annotations: decode(row, "annotations")?,
        status,
        created: Stamp::new(
            UserId::from_uuid(decode(row, "created_by")?),
            decode(row, "created_at")?,
        ),
        version: version as u64,
    })
}

fn line_from_row(row: &PgRow) -> DomainResult<MovementLine> {
    let line_number: i32 = decode(row, "line_number")?;
    Ok(MovementLine {
        movement_id: MovementId::from_uuid(decode(row, "movement_id")?),
        line_number: line_number as u32,
        product_id: ProductId::from_uuid(decode(row, "product_id")?),
        quantity: decode(row, "quantity")?,
        unit_price: decode(row, "unit_price")?,
        line_total: decode(row, "line_total")?,
    })
}

/// Map SQLx errors to DomainError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") => DomainError::Conflict(msg),
                _ => DomainError::Persistence(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::Persistence(format!("connection pool closed in {}", operation))
        }
        _ => DomainError::Persistence(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn order_by_spreads_direction_over_composite_key() {
        let query = QueryComposer::<StockColumn>::new(
            &stockflow_core::ListQuery {
                sort_direction: SortDirection::Desc,
                ..Default::default()
            },
            stockflow_core::PageLimits::default(),
        );
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM stock_records");
        push_order_and_window(&mut qb, &query);
        let sql = qb.sql();
        assert!(sql.contains("ORDER BY location_id DESC, product_id DESC LIMIT"));
    }

    #[test]
    fn secondary_sort_falls_back_to_primary_key() {
        let query = QueryComposer::<MovementColumn>::new(
            &stockflow_core::ListQuery {
                sort_column: Some(1),
                export_all: true,
                ..Default::default()
            },
            stockflow_core::PageLimits::default(),
        );
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM movement_headers");
        push_order_and_window(&mut qb, &query);
        assert!(qb.sql().ends_with("ORDER BY code ASC, id ASC"));
    }

    #[test]
    fn search_targets_whitelisted_column_only() {
        let query = QueryComposer::<MovementColumn>::new(
            &stockflow_core::ListQuery {
                search_column: Some(1),
                search_value: Some(" ISS ".into()),
                ..Default::default()
            },
            stockflow_core::PageLimits::default(),
        );
        let filters = ListFilters {
            table: "movement_headers",
            time_column: "created_at",
            status: Some("active"),
            location: None,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        filters.push_where(&mut qb, &query);
        let sql = qb.sql();
        assert!(sql.contains("status = $1"));
        assert!(sql.contains("CAST(code AS TEXT) ILIKE $2"));
    }
}
