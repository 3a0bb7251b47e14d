//! 파이프라인 에러 타입
//!
//! [`PipelineError`]는 규칙 컴파일과 라인 파이프라인 실행 중 발생하는 모든 에러를 표현합니다.
//! `From<PipelineError> for TeaError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 컴파일 단계 에러(`RuleValidation`, `InvalidPattern`)를 제외한
//! 모든 에러는 실행 중 치명적이며 복구 경로가 없습니다.

use tea_core::error::{ConfigError, PipelineError as CorePipelineError, TeaError};
use tea_core::types::StreamKind;

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 규칙 유효성 검증 실패
    #[error("{rule}: {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 라벨
        rule: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 실패
    #[error("{rule}: invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// 문제가 된 규칙 라벨
        rule: String,
        /// 원본 패턴
        pattern: String,
        /// 정규식 에러
        source: regex::Error,
    },

    /// 최대 라인 길이 초과
    #[error("{stream}: line exceeds maximum length of {limit} bytes")]
    LineTooLong {
        /// 라인이 들어온 스트림
        stream: StreamKind,
        /// 최대 길이 (바이트)
        limit: usize,
    },

    /// 시그널 전달 실패
    #[error("failed to send signal {signal} to pid {pid}: {source}")]
    Signal {
        /// 시그널 이름
        signal: String,
        /// 대상 프로세스 ID
        pid: u32,
        /// OS 에러
        source: std::io::Error,
    },

    /// 실제 출력 스트림 쓰기 실패
    #[error("failed to write to {stream}: {source}")]
    Output {
        /// 출력 스트림
        stream: StreamKind,
        /// I/O 에러
        source: std::io::Error,
    },

    /// 자식 stdin 입력 실패 (입력 파일 읽기, 파이프 쓰기)
    #[error("input error: {0}")]
    Input(String),

    /// 자식 프로세스 실행 실패
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// 실행하려던 프로그램
        program: String,
        /// I/O 에러
        source: std::io::Error,
    },

    /// 채널이 예기치 않게 닫힘
    #[error("channel error: {0}")]
    Channel(String),

    /// 런타임 불변식 위반 (검증 단계의 버그)
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// 파이프라인 태스크 패닉 또는 취소
    #[error("pipeline task failed: {0}")]
    Task(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// 실행 전에 발견되는 설정 에러인지 확인합니다.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::RuleValidation { .. } | Self::InvalidPattern { .. }
        )
    }
}

impl From<PipelineError> for TeaError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::RuleValidation { rule, reason } => {
                TeaError::Config(ConfigError::InvalidRule { rule, reason })
            }
            PipelineError::InvalidPattern {
                rule,
                pattern,
                source,
            } => TeaError::Config(ConfigError::InvalidRule {
                rule,
                reason: format!("invalid pattern '{pattern}': {source}"),
            }),
            err @ PipelineError::Spawn { .. } => {
                TeaError::Pipeline(CorePipelineError::InitFailed(err.to_string()))
            }
            PipelineError::Io(e) => TeaError::Io(e),
            other => TeaError::Pipeline(CorePipelineError::Fatal(other.to_string())),
        }
    }
}
