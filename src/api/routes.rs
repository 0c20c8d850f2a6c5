use axum::{routing::post, Router};

use crate::api::handlers::*;
use crate::server::ServerState;

/// API 라우터 생성
pub fn create_api_router() -> Router<ServerState> {
    Router::new()
        // 거래 수명주기 API
        .route("/v1/trade/order", post(create_trade_order))
        .route("/v1/trade/accept", post(accept_trade))
        .route("/v1/trade/request-payment", post(request_payment))
        .route("/v1/trade/confirm", post(confirm_payment))
        .route("/v1/trade/cancel", post(cancel_by_buyer))
        .route("/v1/trade/cancel-by-admin", post(cancel_by_admin))
        // 폴링 대상 조회 API
        .route("/v1/trade/status", post(get_trade_status))
        .route("/v1/trade/history", post(get_trade_history))
        // 수수료 지갑 수납/출금 API
        .route("/v1/collect/:action", post(collect_action))
}
