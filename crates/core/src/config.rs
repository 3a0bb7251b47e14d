//! 설정 관리 — tea.toml 파싱 및 런타임 설정
//!
//! [`TeaConfig`]는 로깅, 파이프라인, 규칙 체인 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TEA_PIPELINE_TOPOLOGY=shared-commands` 형식)
//! 3. 설정 파일 (`tea.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tea_core::error::TeaError> {
//! use tea_core::config::TeaConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TeaConfig::load("tea.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TeaConfig::parse("[[rules]]\npatterns = [\"ERROR\"]\nprefix = \"! \"")?;
//! # Ok(())
//! # }
//! ```
//!
//! 규칙 단위 검증(이름 참조, 정규식, 점프 방향 등)은 `tea-pipeline`의
//! 규칙 컴파일러가 담당합니다. 여기서는 전역 설정만 검증합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TeaError};
use crate::types::{
    Color, ColorMode, MatchMode, RuleState, StreamKind, StreamSelector, TextAttribute, Topology,
};

/// 최소 라인 버퍼 크기 (바이트)
pub const MIN_LINE_BUFFER_SIZE: usize = 1024;

/// 기본 라인 버퍼 크기 (바이트)
pub const DEFAULT_LINE_BUFFER_SIZE: usize = 65535;

/// tea 통합 설정
///
/// `tea.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeaConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파이프라인 전역 설정
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// 규칙 체인 (정의 순서 = 평가 순서)
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl TeaConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TeaError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TeaError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TeaError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TeaError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TeaError> {
        toml::from_str(toml_str).map_err(|e| {
            TeaError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TEA_{SECTION}_{FIELD}`
    /// 예: `TEA_PIPELINE_LINE_BUFFER_SIZE=131072`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TEA_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TEA_GENERAL_LOG_FORMAT");

        // Pipeline
        override_parsed(&mut self.pipeline.topology, "TEA_PIPELINE_TOPOLOGY");
        override_parsed(
            &mut self.pipeline.line_buffer_size,
            "TEA_PIPELINE_LINE_BUFFER_SIZE",
        );
        override_parsed(&mut self.pipeline.stdbuf, "TEA_PIPELINE_STDBUF");
        override_string(&mut self.pipeline.pid_file, "TEA_PIPELINE_PID_FILE");
        override_parsed(&mut self.pipeline.color, "TEA_PIPELINE_COLOR");
    }

    /// 전역 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TeaError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.pipeline.line_buffer_size < MIN_LINE_BUFFER_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.line_buffer_size".to_owned(),
                reason: format!("must be at least {MIN_LINE_BUFFER_SIZE}"),
            }
            .into());
        }

        if self.rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rules".to_owned(),
                reason: "at least one rule must be defined".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// pid 파일 경로를 반환합니다 (빈 문자열이면 None).
    pub fn pid_file(&self) -> Option<PathBuf> {
        if self.pipeline.pid_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.pipeline.pid_file))
        }
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error, off)
    pub log_level: String,
    /// 로그 형식 (pretty, compact, json)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 파이프라인 전역 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// 스트림 토폴로지
    pub topology: Topology,
    /// 최대 라인 길이 (바이트)
    pub line_buffer_size: usize,
    /// 자식 프로세스를 `stdbuf -oL -eL`로 감싸 라인 버퍼링을 강제할지 여부
    pub stdbuf: bool,
    /// 자식 프로세스 PID 파일 경로 (빈 문자열이면 사용 안 함)
    pub pid_file: String,
    /// 색상 출력 정책
    pub color: ColorMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            topology: Topology::Split,
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            stdbuf: true,
            pid_file: String::new(),
            color: ColorMode::Auto,
        }
    }
}

/// 규칙 하나의 원시 설정
///
/// 조건(patterns, match, negate, streams)과 액션 필드를 평탄하게 담습니다.
/// 오타로 인한 무시를 막기 위해 알 수 없는 필드는 거부합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    /// 규칙 이름 (선택, 유일해야 함)
    pub name: Option<String>,
    /// 초기 상태
    pub state: RuleState,

    // --- 조건 ---
    /// 정규식 패턴 목록
    pub patterns: Vec<String>,
    /// 패턴 결합 방식
    #[serde(rename = "match")]
    pub match_mode: MatchMode,
    /// 매칭 결과 반전
    pub negate: bool,
    /// 평가 대상 입력 스트림
    pub streams: StreamSelector,

    // --- 액션 ---
    /// 목적지가 stdout일 때 라인 전체를 대체할 텍스트
    pub mark: Option<String>,
    /// 목적지가 stderr일 때 라인 전체를 대체할 텍스트
    pub mark_stderr: Option<String>,
    /// 접두사
    pub prefix: Option<String>,
    /// 접미사
    pub suffix: Option<String>,
    /// 목적지 스트림 변경
    pub send_to: Option<StreamKind>,
    /// 출력 스타일
    pub style: Option<StyleConfig>,
    /// 자식 프로세스에 보낼 시그널
    pub signal: Option<SignalSpec>,
    /// 자식 stdin에 쓸 텍스트 (그대로 기록)
    pub input: Option<String>,
    /// 자식 stdin으로 스트리밍할 파일
    pub input_file: Option<PathBuf>,
    /// 라인 출력 후 자식 stdin 닫기
    pub close_input: bool,
    /// 최종 종료 코드 고정 (0..=255)
    pub set_exit_code: Option<i64>,
    /// 고정 종료 코드 해제
    pub clear_exit_code: bool,
    /// 비활성화할 규칙 이름
    pub disable: Vec<String>,
    /// 활성화할 규칙 이름
    pub enable: Vec<String>,
    /// 활성 상태를 뒤집을 규칙 이름
    pub toggle: Vec<String>,
    /// 이 라인의 평가 중단
    pub next_line: bool,
    /// 지정한 규칙으로 점프
    pub skip_to: Option<String>,
}

impl RuleConfig {
    /// 에러 메시지용 규칙 라벨을 반환합니다 (`rule #3` 또는 `rule #3 (name=errors)`).
    pub fn label(&self, ordinal: usize) -> String {
        match self.name.as_deref() {
            Some(name) => format!("rule #{} (name={name})", ordinal + 1),
            None => format!("rule #{}", ordinal + 1),
        }
    }
}

/// 스타일 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    /// 전경색
    pub fg: Option<Color>,
    /// 배경색
    pub bg: Option<Color>,
    /// 텍스트 속성
    pub attributes: Vec<TextAttribute>,
}

/// 시그널 지정 -- 이름(`TERM`, `SIGTERM`) 또는 번호
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalSpec {
    /// 시그널 번호
    Number(i32),
    /// 시그널 이름
    Name(String),
}

impl fmt::Display for SignalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse value from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> TeaConfig {
        TeaConfig {
            rules: vec![RuleConfig::default()],
            ..TeaConfig::default()
        }
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = TeaConfig::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.pipeline.topology, Topology::Split);
        assert_eq!(config.pipeline.line_buffer_size, DEFAULT_LINE_BUFFER_SIZE);
        assert!(config.pipeline.stdbuf);
        assert!(config.pid_file().is_none());
    }

    #[test]
    fn default_config_without_rules_fails_validation() {
        let err = TeaConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("rules"));
    }

    #[test]
    fn minimal_config_passes_validation() {
        minimal().validate().unwrap();
    }

    #[test]
    fn parse_rule_with_all_fields() {
        let toml = r#"
[pipeline]
topology = "shared-commands"

[[rules]]
name = "errors"
state = "line-disabled"
patterns = ["ERROR", "disk"]
match = "any"
negate = true
streams = "all"
mark = "!!"
mark_stderr = "!!!"
prefix = "[ERR] "
suffix = " <"
send_to = "stderr"
style = { fg = "red", bg = "hi-black", attributes = ["bold", "underline"] }
signal = "TERM"
input = "y\n"
input_file = "answers.txt"
close_input = true
set_exit_code = 42
disable = ["a"]
enable = ["b"]
toggle = ["c"]
skip_to = "d"
"#;
        let config = TeaConfig::parse(toml).unwrap();
        assert_eq!(config.pipeline.topology, Topology::SharedCommands);
        let rule = &config.rules[0];
        assert_eq!(rule.name.as_deref(), Some("errors"));
        assert_eq!(rule.state, RuleState::LineDisabled);
        assert_eq!(rule.match_mode, MatchMode::Any);
        assert!(rule.negate);
        assert_eq!(rule.streams, StreamSelector::All);
        assert_eq!(rule.send_to, Some(StreamKind::Stderr));
        let style = rule.style.as_ref().unwrap();
        assert_eq!(style.fg, Some(Color::Red));
        assert_eq!(style.bg, Some(Color::HiBlack));
        assert_eq!(
            style.attributes,
            vec![TextAttribute::Bold, TextAttribute::Underline]
        );
        assert_eq!(rule.signal, Some(SignalSpec::Name("TERM".to_owned())));
        assert_eq!(rule.set_exit_code, Some(42));
        assert_eq!(rule.input.as_deref(), Some("y\n"));
        assert_eq!(rule.input_file.as_deref(), Some(std::path::Path::new("answers.txt")));
        assert!(rule.close_input);
    }

    #[test]
    fn parse_numeric_signal() {
        let config = TeaConfig::parse("[[rules]]\nsignal = 15").unwrap();
        assert_eq!(config.rules[0].signal, Some(SignalSpec::Number(15)));
    }

    #[test]
    fn parse_rejects_unknown_rule_field() {
        let result = TeaConfig::parse("[[rules]]\npatern = \"x\"");
        assert!(matches!(
            result,
            Err(TeaError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = TeaConfig::parse("invalid = [[[toml");
        assert!(matches!(
            result,
            Err(TeaError::Config(ConfigError::ParseFailed { .. }))
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = minimal();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = minimal();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_small_line_buffer() {
        let mut config = minimal();
        config.pipeline.line_buffer_size = 1023;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("line_buffer_size"));
    }

    #[test]
    fn rule_label_includes_name() {
        let mut rule = RuleConfig::default();
        assert_eq!(rule.label(0), "rule #1");
        rule.name = Some("errors".to_owned());
        assert_eq!(rule.label(2), "rule #3 (name=errors)");
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_TEA_STR", "overridden") };
        override_string(&mut val, "TEST_TEA_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_TEA_STR") };
    }

    #[test]
    fn env_override_parsed_invalid_keeps_original() {
        let mut val = Topology::Split;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_TEA_TOPOLOGY_BAD", "sideways") };
        override_parsed(&mut val, "TEST_TEA_TOPOLOGY_BAD");
        assert_eq!(val, Topology::Split);
        unsafe { std::env::remove_var("TEST_TEA_TOPOLOGY_BAD") };
    }

    #[test]
    fn env_override_parsed_usize() {
        let mut val = 1024usize;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_TEA_USIZE", "4096") };
        override_parsed(&mut val, "TEST_TEA_USIZE");
        assert_eq!(val, 4096);
        unsafe { std::env::remove_var("TEST_TEA_USIZE") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let mut config = minimal();
        config.rules[0].name = Some("r1".to_owned());
        config.rules[0].patterns = vec!["ERROR".to_owned()];
        config.rules[0].signal = Some(SignalSpec::Number(15));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = TeaConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].name.as_deref(), Some("r1"));
        assert_eq!(parsed.rules[0].signal, Some(SignalSpec::Number(15)));
        assert_eq!(parsed.pipeline.topology, config.pipeline.topology);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = TeaConfig::from_file("/nonexistent/path/tea.toml").await;
        assert!(matches!(
            result,
            Err(TeaError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
