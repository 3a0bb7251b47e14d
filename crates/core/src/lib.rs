//! # tea-core
//!
//! tea의 공통 타입, 에러, 설정을 정의하는 크레이트입니다.
//!
//! - [`config`]: `tea.toml` 파싱, 환경변수 오버라이드, 전역 검증
//! - [`error`]: 계층별 에러 타입
//! - [`metrics`]: 메트릭 이름 상수
//! - [`types`]: 스트림, 토폴로지, 스타일 관련 도메인 타입

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, TeaError};

// 설정
pub use config::{RuleConfig, SignalSpec, StyleConfig, TeaConfig};

// 도메인 타입
pub use types::{
    Color, ColorMode, MatchMode, RuleState, StreamKind, StreamSelector, TextAttribute, Topology,
};
