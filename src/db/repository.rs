use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::models::{OrderRow, TransferRecord};
use crate::error::{Result, TradeError};
use crate::trade::model::{OrderStatus, TradeOrder};
use crate::trade::store::{OrderFilter, OrderStore, OrderUpdate};

const ORDER_COLUMNS: &str = "order_id, trade_id, buyer_wallet_address, seller_wallet_address, \
     status, usdt_amount, krw_amount, rate, platform_fee_rate, platform_fee_amount, \
     platform_fee_wallet_address, private_sale, agentcode, storecode, \
     payment_method, payment_bank_name, payment_account_number, payment_account_holder, \
     payment_contact_memo, is_contact_transfer, \
     created_at, accepted_at, payment_requested_at, payment_confirmed_at, cancelled_at, \
     canceller, cancelled_by_wallet_address, cancelled_by_nickname, cancelled_by_ip_address";

/// SQLite 기반 주문 저장소
pub struct SqliteOrderStore {
    pool: SqlitePool,
}

impl SqliteOrderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, order_id: &str) -> Result<Option<TradeOrder>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE order_id = ?",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn insert_new(&self, order: &TradeOrder) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO orders
             (order_id, trade_id, buyer_wallet_address, seller_wallet_address, status,
              usdt_amount, krw_amount, rate, platform_fee_rate, platform_fee_amount,
              platform_fee_wallet_address, private_sale, agentcode, storecode, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.order_id)
        .bind(&order.trade_id)
        .bind(&order.buyer_wallet_address)
        .bind(&order.seller_wallet_address)
        .bind(order.status.as_str())
        .bind(order.usdt_amount.to_string())
        .bind(order.krw_amount)
        .bind(order.rate.to_string())
        .bind(order.platform_fee_rate.to_string())
        .bind(order.platform_fee_amount.to_string())
        .bind(&order.platform_fee_wallet_address)
        .bind(order.private_sale)
        .bind(&order.agentcode)
        .bind(&order.storecode)
        .bind(order.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            // 부분 유니크 인덱스 충돌 = 같은 쌍의 진행 중 주문이 이미 존재
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, order_id: &str) -> Result<Option<TradeOrder>> {
        self.fetch_by_id(order_id).await
    }

    async fn find_active_by_pair(&self, buyer: &str, seller: &str) -> Result<Option<TradeOrder>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders
             WHERE buyer_wallet_address = ? AND seller_wallet_address = ?
               AND status IN ('ordered', 'accepted', 'paymentRequested')",
            ORDER_COLUMNS
        ))
        .bind(buyer)
        .bind(seller)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn transition(
        &self,
        order_id: &str,
        expected: OrderStatus,
        update: OrderUpdate,
    ) -> Result<TradeOrder> {
        let target = update.target_status();

        // 현재 상태가 기대값일 때만 갱신되는 조건부 UPDATE.
        // 경합에서 진 쪽은 0건 갱신으로 끝난다.
        let affected = match &update {
            OrderUpdate::Accept { at } => {
                sqlx::query(
                    "UPDATE orders SET status = ?, accepted_at = ?
                     WHERE order_id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(at)
                .bind(order_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            OrderUpdate::RequestPayment { at, payment } => {
                sqlx::query(
                    "UPDATE orders SET status = ?, payment_requested_at = ?,
                         payment_method = ?, payment_bank_name = ?, payment_account_number = ?,
                         payment_account_holder = ?, payment_contact_memo = ?, is_contact_transfer = ?
                     WHERE order_id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(at)
                .bind(&payment.payment_method)
                .bind(&payment.payment_bank_name)
                .bind(&payment.payment_account_number)
                .bind(&payment.payment_account_holder)
                .bind(&payment.payment_contact_memo)
                .bind(payment.is_contact_transfer)
                .bind(order_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            OrderUpdate::ConfirmPayment { at } => {
                sqlx::query(
                    "UPDATE orders SET status = ?, payment_confirmed_at = ?
                     WHERE order_id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(at)
                .bind(order_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            OrderUpdate::Cancel { at, provenance } => {
                sqlx::query(
                    "UPDATE orders SET status = ?, cancelled_at = ?,
                         canceller = ?, cancelled_by_wallet_address = ?,
                         cancelled_by_nickname = ?, cancelled_by_ip_address = ?
                     WHERE order_id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(at)
                .bind(provenance.canceller.as_str())
                .bind(&provenance.cancelled_by_wallet_address)
                .bind(&provenance.cancelled_by_nickname)
                .bind(&provenance.cancelled_by_ip_address)
                .bind(order_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            return match self.fetch_by_id(order_id).await? {
                Some(current) => Err(TradeError::InvalidState {
                    current: current.status.as_str().to_string(),
                    expected: expected.as_str().to_string(),
                }),
                None => Err(TradeError::Validation(format!(
                    "주문을 찾을 수 없습니다: {}",
                    order_id
                ))),
            };
        }

        self.fetch_by_id(order_id)
            .await?
            .ok_or_else(|| TradeError::Internal(format!("갱신 직후 주문 소실: {}", order_id)))
    }

    async fn find_expired_payment_requests(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TradeOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders
             WHERE status = 'paymentRequested' AND payment_requested_at < ?
             ORDER BY payment_requested_at ASC",
            ORDER_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn list(&self, filter: &OrderFilter) -> Result<(Vec<TradeOrder>, i64)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(wallet) = &filter.wallet_address {
            conditions.push("(buyer_wallet_address = ? OR seller_wallet_address = ?)".to_string());
            binds.push(wallet.clone());
            binds.push(wallet.clone());
        }
        if let Some(agentcode) = &filter.agentcode {
            conditions.push("agentcode = ?".to_string());
            binds.push(agentcode.clone());
        }
        if let Some(storecode) = &filter.storecode {
            conditions.push("storecode = ?".to_string());
            binds.push(storecode.clone());
        }
        if let Some(term) = &filter.search_term {
            conditions.push(
                "(trade_id LIKE ? OR buyer_wallet_address LIKE ? OR seller_wallet_address LIKE ?)"
                    .to_string(),
            );
            let pattern = format!("%{}%", term);
            binds.push(pattern.clone());
            binds.push(pattern.clone());
            binds.push(pattern);
        }
        if !filter.statuses.is_empty() {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            conditions.push(format!("status IN ({})", placeholders));
            for status in &filter.statuses {
                binds.push(status.as_str().to_string());
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM orders{}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total_count = count_query.fetch_one(&self.pool).await?;

        let limit = if filter.limit == 0 { 10 } else { filter.limit } as i64;
        let offset = (filter.page.max(1) as i64 - 1) * limit;

        let list_sql = format!(
            "SELECT {} FROM orders{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            ORDER_COLUMNS, where_clause
        );
        let mut list_query = sqlx::query_as::<_, OrderRow>(&list_sql);
        for bind in &binds {
            list_query = list_query.bind(bind);
        }
        let rows = list_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .into_iter()
            .map(OrderRow::into_order)
            .collect::<Result<Vec<_>>>()?;
        Ok((orders, total_count))
    }
}

/// 수탁 전송 이력 저장소
///
/// 모든 전송 시도가 성공 여부와 무관하게 기록되는 불변 원장.
/// 상태 갱신은 허용하지만 행 삭제는 없다.
pub struct TransferLedger {
    pool: SqlitePool,
}

impl TransferLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 전송 이력 기록
    pub async fn append(&self, record: &TransferRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO transfers
             (transaction_id, transaction_hash, wallet, kind, status, amount,
              from_wallet, to_wallet, error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.transaction_id)
        .bind(&record.transaction_hash)
        .bind(&record.wallet)
        .bind(&record.kind)
        .bind(&record.status)
        .bind(&record.amount)
        .bind(&record.from_wallet)
        .bind(&record.to_wallet)
        .bind(&record.error)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 전송 상태 갱신 (refresh-status 경로, 멱등)
    pub async fn update_status(
        &self,
        transaction_id: &str,
        status: &str,
        transaction_hash: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE transfers
             SET status = ?, transaction_hash = COALESCE(?, transaction_hash),
                 error = COALESCE(?, error), updated_at = ?
             WHERE transaction_id = ?",
        )
        .bind(status)
        .bind(transaction_hash)
        .bind(error)
        .bind(Utc::now())
        .bind(transaction_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 트랜잭션 ID로 조회
    pub async fn find(&self, transaction_id: &str) -> Result<Option<TransferRecord>> {
        let record = sqlx::query_as::<_, TransferRecord>(
            "SELECT transaction_id, transaction_hash, wallet, kind, status, amount,
                    from_wallet, to_wallet, error, created_at, updated_at
             FROM transfers WHERE transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// 지갑별 전송 이력 조회 (최신순)
    pub async fn history(&self, wallet: &str, limit: i64) -> Result<Vec<TransferRecord>> {
        let records = sqlx::query_as::<_, TransferRecord>(
            "SELECT transaction_id, transaction_hash, wallet, kind, status, amount,
                    from_wallet, to_wallet, error, created_at, updated_at
             FROM transfers
             WHERE wallet = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(wallet)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
