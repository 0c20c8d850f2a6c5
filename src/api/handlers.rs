use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};

use crate::api::models::*;
use crate::error::TradeError;
use crate::trade::engine::CreateOrderRequest;
use crate::trade::model::{Actor, CancellerRole, OrderStatus};
use crate::trade::store::OrderFilter;
use crate::server::ServerState;

/// 에러를 HTTP 상태 코드와 응답 본문으로 변환
fn error_response(e: TradeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        TradeError::Validation(_) | TradeError::SelfTrade => StatusCode::BAD_REQUEST,
        TradeError::InsufficientSellerLiquidity { .. } => StatusCode::BAD_REQUEST,
        TradeError::Authorization(_) => StatusCode::FORBIDDEN,
        TradeError::InvalidState { .. } => StatusCode::CONFLICT,
        TradeError::TransferPending { .. } => StatusCode::ACCEPTED,
        TradeError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
        TradeError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        TradeError::Database(_) | TradeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorResponse {
        error: e.code().to_string(),
        message: e.to_string(),
    };
    (status, Json(body))
}

/// 요청자의 IP 추출 (프록시 헤더 기준)
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

/// 주문 생성 핸들러
pub async fn create_trade_order(
    State(state): State<ServerState>,
    Json(payload): Json<CreateTradeRequest>,
) -> Result<Json<CreateTradeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (order, created) = state
        .engine
        .create_order(CreateOrderRequest {
            buyer_wallet_address: payload.buyer_wallet_address,
            seller_wallet_address: payload.seller_wallet_address,
            usdt_amount: payload.usdt_amount,
            krw_amount: payload.krw_amount,
            agentcode: payload.agentcode,
            storecode: payload.storecode,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(CreateTradeResponse {
        result: true,
        created,
        order,
    }))
}

/// 판매자 주문 수락 핸들러
pub async fn accept_trade(
    State(state): State<ServerState>,
    Json(payload): Json<SellerActionRequest>,
) -> Result<Json<TradeOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .engine
        .accept(&payload.order_id, &payload.seller_wallet_address)
        .await
        .map_err(error_response)?;

    Ok(Json(TradeOrderResponse { result: true, order }))
}

/// 판매자 입금 요청 핸들러
pub async fn request_payment(
    State(state): State<ServerState>,
    Json(payload): Json<SellerActionRequest>,
) -> Result<Json<TradeOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let order = state
        .engine
        .request_payment(&payload.order_id, &payload.seller_wallet_address)
        .await
        .map_err(error_response)?;

    Ok(Json(TradeOrderResponse { result: true, order }))
}

/// 입금 확인 핸들러 (판매자/관리자)
pub async fn confirm_payment(
    State(state): State<ServerState>,
    Json(payload): Json<ConfirmTradeRequest>,
) -> Result<Json<TradeOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (requester, admin) = match (&payload.admin_wallet_address, &payload.seller_wallet_address) {
        (Some(admin_wallet), _) => (admin_wallet.clone(), true),
        (None, Some(seller_wallet)) => (seller_wallet.clone(), false),
        (None, None) => {
            return Err(error_response(TradeError::Validation(
                "sellerWalletAddress 또는 adminWalletAddress가 필요합니다".to_string(),
            )))
        }
    };

    let order = state
        .engine
        .confirm_payment(&payload.order_id, &requester, admin)
        .await
        .map_err(error_response)?;

    Ok(Json(TradeOrderResponse { result: true, order }))
}

/// 구매자 취소 핸들러
pub async fn cancel_by_buyer(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<BuyerCancelRequest>,
) -> Result<Json<BuyerCancelResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .cancel_by_buyer(
            &payload.order_id,
            &payload.buyer_wallet_address,
            &payload.seller_wallet_address,
            client_ip(&headers),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(BuyerCancelResponse { result: true }))
}

/// 관리자/에이전트 취소 핸들러
pub async fn cancel_by_admin(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<AdminCancelRequest>,
) -> Result<Json<AdminCancelResponse>, (StatusCode, Json<ErrorResponse>)> {
    let role = match CancellerRole::parse(&payload.cancelled_by_role) {
        Some(role @ (CancellerRole::Agent | CancellerRole::Admin)) => role,
        _ => {
            return Err(error_response(TradeError::Validation(format!(
                "지원하지 않는 취소 역할: {}",
                payload.cancelled_by_role
            ))))
        }
    };

    let actor = Actor {
        wallet_address: payload.admin_wallet_address,
        nickname: payload.cancelled_by_nickname,
        role,
    };
    let (_, refund) = state
        .engine
        .cancel(&payload.order_id, &actor, client_ip(&headers))
        .await
        .map_err(error_response)?;

    Ok(Json(AdminCancelResponse {
        result: AdminCancelResult {
            success: true,
            transaction_hash: refund.transaction_hash,
        },
    }))
}

/// 거래 상태 조회 핸들러 (클라이언트 폴링 대상)
pub async fn get_trade_status(
    State(state): State<ServerState>,
    Json(payload): Json<TradeStatusRequest>,
) -> Result<Json<TradeStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = state
        .engine
        .get_trade_status(&payload.buyer_wallet_address, &payload.seller_wallet_address)
        .await
        .map_err(error_response)?;

    Ok(Json(TradeStatusResponse {
        result: TradeStatusResult {
            is_trading: status.is_trading,
            status: status.order.as_ref().map(|o| o.status.as_str().to_string()),
            order: status.order,
        },
    }))
}

/// 이력/목록 조회 핸들러
pub async fn get_trade_history(
    State(state): State<ServerState>,
    Json(payload): Json<TradeHistoryRequest>,
) -> Result<Json<TradeHistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let statuses = payload
        .statuses
        .unwrap_or_default()
        .iter()
        .filter_map(|s| OrderStatus::parse(s))
        .collect();

    let filter = OrderFilter {
        wallet_address: payload.wallet_address,
        agentcode: payload.agentcode,
        storecode: payload.storecode,
        search_term: payload.search_term,
        statuses,
        page: payload.page.unwrap_or(1),
        limit: payload.limit.unwrap_or(10),
    };
    let (orders, total_count) = state
        .engine
        .list_orders(&filter)
        .await
        .map_err(error_response)?;

    Ok(Json(TradeHistoryResponse {
        result: TradeHistoryResult { orders, total_count },
    }))
}

/// 수납/출금 핸들러 (action 경로로 분기)
pub async fn collect_action(
    State(state): State<ServerState>,
    Path(action): Path<String>,
    Json(payload): Json<CollectRequest>,
) -> Result<Json<CollectResponse>, (StatusCode, Json<ErrorResponse>)> {
    let require_amount = || {
        payload.amount.ok_or_else(|| {
            TradeError::Validation("amount가 필요합니다".to_string())
        })
    };
    let require_transaction_id = || {
        payload.transaction_id.clone().ok_or_else(|| {
            TradeError::Validation("transactionId가 필요합니다".to_string())
        })
    };

    let result = match action.as_str() {
        "collect-balance" => {
            let amount = state
                .collect
                .balance(&payload.wallet_address)
                .await
                .map_err(error_response)?;
            CollectResult::Balance { amount }
        }
        "collect" => {
            let amount = require_amount().map_err(error_response)?;
            let to_wallet = payload.to_wallet_address.clone().ok_or_else(|| {
                error_response(TradeError::Validation(
                    "toWalletAddress가 필요합니다".to_string(),
                ))
            })?;
            let record = state
                .collect
                .collect(&payload.wallet_address, &to_wallet, amount)
                .await
                .map_err(error_response)?;
            CollectResult::Transfer(Box::new(record))
        }
        "record-charge" => {
            let amount = require_amount().map_err(error_response)?;
            let from_wallet = payload.from_wallet_address.clone().ok_or_else(|| {
                error_response(TradeError::Validation(
                    "fromWalletAddress가 필요합니다".to_string(),
                ))
            })?;
            let record = state
                .collect
                .charge(&payload.wallet_address, &from_wallet, amount)
                .await
                .map_err(error_response)?;
            CollectResult::Transfer(Box::new(record))
        }
        "collect-status" => {
            let transaction_id = require_transaction_id().map_err(error_response)?;
            let record = state
                .collect
                .status(&transaction_id)
                .await
                .map_err(error_response)?;
            CollectResult::Transfer(Box::new(record))
        }
        "refresh-status" => {
            let transaction_id = require_transaction_id().map_err(error_response)?;
            let record = state
                .collect
                .refresh_status(&transaction_id)
                .await
                .map_err(error_response)?;
            CollectResult::Transfer(Box::new(record))
        }
        "collect-history" => {
            let transfers = state
                .collect
                .history(&payload.wallet_address, payload.limit.unwrap_or(100))
                .await
                .map_err(error_response)?;
            CollectResult::History { transfers }
        }
        _ => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "UNKNOWN_ACTION".to_string(),
                    message: format!("지원하지 않는 action: {}", action),
                }),
            ))
        }
    };

    Ok(Json(CollectResponse { result }))
}
