//! 거래 엔진 공통 에러 타입
//!
//! 모든 상태 전이/검증 실패를 하나의 열거형으로 표현하고,
//! API 계층에서 HTTP 상태 코드와 에러 코드로 변환합니다.

use thiserror::Error;

/// 크레이트 전역 Result 별칭
pub type Result<T> = std::result::Result<T, TradeError>;

/// 거래 엔진 에러 타입
#[derive(Debug, Error)]
pub enum TradeError {
    /// 입력값 검증 실패 (금액 범위, 필수 필드 누락 등)
    #[error("입력값 오류: {0}")]
    Validation(String),

    /// 구매자와 판매자가 동일한 지갑
    #[error("자기 자신과는 거래할 수 없습니다")]
    SelfTrade,

    /// 해당 전이를 수행할 권한이 없는 행위자
    #[error("권한 없음: {0}")]
    Authorization(String),

    /// 기대한 선행 상태와 현재 상태가 불일치 (경합 패배 포함)
    #[error("잘못된 주문 상태: 현재 {current}, 기대 {expected}")]
    InvalidState { current: String, expected: String },

    /// 판매자의 에스크로 잔고 부족
    #[error("판매자 잔고 부족: 요청 {requested}, 가용 {available}")]
    InsufficientSellerLiquidity { requested: String, available: String },

    /// 제한 횟수 내에 전송 완료를 확인하지 못함 (처리 중)
    #[error("전송 처리 중: {transaction_id}")]
    TransferPending { transaction_id: String },

    /// 온체인 전송 최종 실패 (메시지는 감사/표시용으로 보존)
    #[error("전송 실패: {0}")]
    TransferFailed(String),

    /// 시세 소스/채팅 프로비저닝 등 외부 시스템 접근 불가
    #[error("외부 시스템 접근 불가: {0}")]
    UpstreamUnavailable(String),

    /// 데이터베이스 오류
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),

    /// 저장된 레코드 해석 실패 등 내부 오류
    #[error("내부 오류: {0}")]
    Internal(String),
}

impl TradeError {
    /// API 응답용 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            TradeError::Validation(_) => "VALIDATION_ERROR",
            TradeError::SelfTrade => "SELF_TRADE",
            TradeError::Authorization(_) => "AUTHORIZATION_ERROR",
            TradeError::InvalidState { .. } => "INVALID_STATE",
            TradeError::InsufficientSellerLiquidity { .. } => "INSUFFICIENT_SELLER_LIQUIDITY",
            TradeError::TransferPending { .. } => "TRANSFER_PENDING",
            TradeError::TransferFailed(_) => "TRANSFER_FAILED",
            TradeError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            TradeError::Database(_) => "DATABASE_ERROR",
            TradeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
