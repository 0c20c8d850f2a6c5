pub mod models;
pub mod repository;

use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Error as SqlxError;

/// SQLite 데이터베이스 초기화 및 연결
pub async fn init_database(database_url: &str) -> Result<SqlitePool, SqlxError> {
    info!("SQLite 데이터베이스 초기화 중...");

    // 연결 풀 생성
    // in-memory SQLite는 연결마다 별도 DB가 되므로 연결을 1개로 제한
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // 테이블 생성
    create_tables(&pool).await?;

    info!("데이터베이스 초기화 완료");

    Ok(pool)
}

/// 필요한 테이블 생성
async fn create_tables(pool: &SqlitePool) -> Result<(), SqlxError> {
    // 주문 테이블
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            trade_id TEXT NOT NULL,
            buyer_wallet_address TEXT NOT NULL,
            seller_wallet_address TEXT NOT NULL,
            status TEXT NOT NULL,
            usdt_amount TEXT NOT NULL,
            krw_amount INTEGER NOT NULL,
            rate TEXT NOT NULL,
            platform_fee_rate TEXT NOT NULL,
            platform_fee_amount TEXT NOT NULL,
            platform_fee_wallet_address TEXT NOT NULL,
            private_sale INTEGER NOT NULL DEFAULT 1,
            agentcode TEXT,
            storecode TEXT,
            payment_method TEXT,
            payment_bank_name TEXT,
            payment_account_number TEXT,
            payment_account_holder TEXT,
            payment_contact_memo TEXT,
            is_contact_transfer INTEGER,
            created_at TEXT NOT NULL,
            accepted_at TEXT,
            payment_requested_at TEXT,
            payment_confirmed_at TEXT,
            cancelled_at TEXT,
            canceller TEXT,
            cancelled_by_wallet_address TEXT,
            cancelled_by_nickname TEXT,
            cancelled_by_ip_address TEXT
        )",
    )
    .execute(pool)
    .await?;

    // (구매자, 판매자) 쌍당 진행 중 주문 1건 불변식을 DB 수준에서 보증.
    // 경합하는 생성 호출은 이 인덱스 충돌로 수렴한다.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_active_pair
         ON orders (buyer_wallet_address, seller_wallet_address)
         WHERE status IN ('ordered', 'accepted', 'paymentRequested')",
    )
    .execute(pool)
    .await?;

    // 수탁 전송 이력 테이블 (append-only)
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transfers (
            transaction_id TEXT PRIMARY KEY,
            transaction_hash TEXT,
            wallet TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            amount TEXT NOT NULL,
            from_wallet TEXT NOT NULL,
            to_wallet TEXT NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
