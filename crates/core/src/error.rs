//! 에러 타입 — 도메인별 에러 정의

/// tea 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TeaError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 유효하지 않은 규칙 정의
    #[error("{rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// 파이프라인 처리 에러 (상위 계층 전달용 요약)
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 실행 중 치명적 에러
    #[error("pipeline failed: {0}")]
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_tea_error() {
        let err: TeaError = ConfigError::FileNotFound {
            path: "tea.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, TeaError::Config(_)));
        assert!(err.to_string().contains("tea.toml"));
    }

    #[test]
    fn invalid_rule_display() {
        let err = ConfigError::InvalidRule {
            rule: "rule #2 (name=errors)".to_owned(),
            reason: "duplicate rule name".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "rule #2 (name=errors): duplicate rule name"
        );
    }
}
