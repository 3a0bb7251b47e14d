//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 설정 계층(`config`)과 파이프라인(`tea-pipeline`)이 공유하는
//! 스트림, 토폴로지, 스타일 관련 타입을 정의합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 표준 출력 스트림 종류
///
/// 라인의 출처(origin)와 목적지(destination)를 모두 표현합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// 표준 출력 (기본값)
    #[default]
    Stdout,
    /// 표준 에러
    Stderr,
}

impl StreamKind {
    /// 메트릭 레이블 등에 사용하는 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파이프라인 토폴로지
///
/// 프로세스 수명 동안 고정됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// stdout/stderr가 각자 독립된 규칙 체인 인스턴스를 가집니다 (기본값)
    #[default]
    Split,
    /// 두 스트림을 병합하여 하나의 규칙 체인 인스턴스로 처리합니다
    SharedCommands,
    /// 병합 + 모든 라인을 stdout 출처로 취급합니다
    SharedStreams,
}

impl Topology {
    /// 설정 파일에서 사용하는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::SharedCommands => "shared-commands",
            Self::SharedStreams => "shared-streams",
        }
    }

    /// 병합 스테이지를 사용하는 토폴로지인지 확인합니다.
    pub fn is_merged(&self) -> bool {
        !matches!(self, Self::Split)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "split" => Ok(Self::Split),
            "shared-commands" => Ok(Self::SharedCommands),
            "shared-streams" => Ok(Self::SharedStreams),
            other => Err(format!(
                "unknown topology '{other}', expected split, shared-commands or shared-streams"
            )),
        }
    }
}

/// 규칙이 평가할 입력 스트림 선택
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSelector {
    /// stdout 라인만 (기본값)
    #[default]
    Stdout,
    /// stderr 라인만
    Stderr,
    /// 두 스트림 모두
    All,
}

impl StreamSelector {
    /// 주어진 출처 스트림이 선택에 포함되는지 확인합니다.
    pub fn includes(&self, stream: StreamKind) -> bool {
        match self {
            Self::Stdout => stream == StreamKind::Stdout,
            Self::Stderr => stream == StreamKind::Stderr,
            Self::All => true,
        }
    }

    /// 설정 파일에서 사용하는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::All => "all",
        }
    }
}

/// 규칙의 초기 상태 및 라인 단위 강제 상태
///
/// `LineEnabled`/`LineDisabled`는 매 라인 평가 시작 시 활성 여부를 강제합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleState {
    /// 활성화 (기본값)
    #[default]
    Enabled,
    /// 비활성화로 시작
    Disabled,
    /// 매 라인 시작 시 활성화
    LineEnabled,
    /// 매 라인 시작 시 비활성화
    LineDisabled,
}

impl RuleState {
    /// 설정 파일에서 사용하는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::LineEnabled => "line-enabled",
            Self::LineDisabled => "line-disabled",
        }
    }
}

/// 패턴 결합 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// 모든 패턴이 매칭되어야 함 (기본값, 패턴이 없으면 항상 참)
    #[default]
    All,
    /// 하나 이상의 패턴이 매칭되어야 함
    Any,
}

/// 터미널 색상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    HiBlack,
    HiRed,
    HiGreen,
    HiYellow,
    HiBlue,
    HiMagenta,
    HiCyan,
    HiWhite,
}

/// 텍스트 속성
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAttribute {
    Bold,
    Faint,
    Italic,
    Underline,
    Blink,
    Reversed,
}

/// 색상 출력 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// 터미널/환경변수에 따라 자동 결정 (기본값)
    #[default]
    Auto,
    /// 항상 ANSI 스타일 적용
    Always,
    /// 스타일 적용 안 함
    Never,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown color mode '{other}', expected auto, always or never"
            )),
        }
    }
}
