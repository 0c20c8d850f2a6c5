//! 에스크로 기반 USDT-KRW 개인거래 엔진
//!
//! 구매자↔판매자 1:1 거래의 수명주기(생성 → 수락 → 입금요청 →
//! 입금확인/취소)를 소유하는 서비스와, 모든 클라이언트 화면이
//! 동일하게 쓰는 폴링 재조정 라이브러리(`sync`)를 제공합니다.

pub mod api;
pub mod chat;
pub mod db;
pub mod error;
pub mod escrow;
pub mod server;
pub mod sync;
pub mod trade;
