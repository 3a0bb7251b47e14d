//! 컴파일된 규칙 데이터 타입
//!
//! 설정의 [`RuleConfig`](tea_core::config::RuleConfig)를 검증하고 이름을 서수로 해석한 결과입니다.
//! 조건과 액션은 불변이므로 `Arc`로 공유하고, 체인 인스턴스마다 달라지는 값은 `enabled`뿐입니다.

use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;

use tea_core::types::{MatchMode, RuleState, StreamKind, StreamSelector};

use crate::signal::Signal;
use crate::style::Style;

/// 체인 안의 규칙 하나
#[derive(Debug, Clone)]
pub struct Rule {
    /// 체인 내 위치 (0부터)
    pub ordinal: usize,
    /// 규칙 이름 (선택)
    pub name: Option<String>,
    /// 로그와 에러 메시지용 라벨
    pub label: String,
    /// 현재 활성 여부 (체인 인스턴스가 소유하는 유일한 가변 상태)
    pub enabled: bool,
    /// 라인 단위 강제 상태
    pub scope: LineScope,
    /// 매칭 조건
    pub condition: Arc<Condition>,
    /// 매칭 시 적용할 액션
    pub actions: Arc<ActionSet>,
}

impl Rule {
    /// 설정 형식의 상태로 되돌립니다. 체인 인스턴스가 만들어진 직후에만 의미가 있습니다.
    pub fn initial_state(&self) -> RuleState {
        match (self.scope, self.enabled) {
            (LineScope::Enable, _) => RuleState::LineEnabled,
            (LineScope::Disable, _) => RuleState::LineDisabled,
            (LineScope::Persistent, true) => RuleState::Enabled,
            (LineScope::Persistent, false) => RuleState::Disabled,
        }
    }
}

/// 매 라인 평가 전에 `enabled`를 강제하는 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineScope {
    /// 강제하지 않음
    #[default]
    Persistent,
    /// 매 라인 시작 시 활성화
    Enable,
    /// 매 라인 시작 시 비활성화
    Disable,
}

/// 규칙 조건
#[derive(Debug, Clone)]
pub struct Condition {
    /// 컴파일된 패턴 (정의 순서)
    pub patterns: Vec<Regex>,
    /// 패턴 결합 방식
    pub match_mode: MatchMode,
    /// 결과 반전
    pub negate: bool,
    /// 평가 대상 출처 스트림
    pub sources: StreamSelector,
}

/// 매칭 시 적용되는 액션 묶음
///
/// 모든 필드는 독립적이며 정의된 것만 적용됩니다.
#[derive(Debug, Clone, Default)]
pub struct ActionSet {
    /// 목적지 변경
    pub reroute: Option<StreamKind>,
    /// stdout 목적지용 mark
    pub mark_stdout: Option<String>,
    /// stderr 목적지용 mark
    pub mark_stderr: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub style: Option<Style>,
    pub signal: Option<Signal>,
    /// stdin에 그대로 쓸 텍스트
    pub input: Option<String>,
    /// stdin으로 스트리밍할 파일
    pub input_file: Option<PathBuf>,
    pub close_input: bool,
    pub exit_code: Option<ExitCodeAction>,
    /// 비활성화할 규칙 서수
    pub disable: Vec<usize>,
    /// 활성화할 규칙 서수
    pub enable: Vec<usize>,
    /// 활성 상태를 뒤집을 규칙 서수
    pub toggle: Vec<usize>,
    pub flow: ControlFlow,
}

/// 고정 종료 코드 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodeAction {
    /// 종료 코드를 고정
    Set(u8),
    /// 고정 해제
    Clear,
}

/// 매칭 후 다음 평가 위치
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlFlow {
    /// 다음 규칙으로 진행
    #[default]
    Continue,
    /// 이 라인의 평가 종료 (출력은 계속)
    StopLine,
    /// 지정한 서수의 규칙으로 이동
    JumpTo(usize),
}

impl ActionSet {
    /// 자식 stdin에 영향을 주는 액션이 있는지 확인합니다.
    pub fn touches_input(&self) -> bool {
        self.input.is_some() || self.input_file.is_some() || self.close_input
    }

    /// 사람이 읽을 수 있는 액션 요약을 반환합니다.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(stream) = self.reroute {
            out.push(format!("send-to {stream}"));
        }
        if let Some(mark) = &self.mark_stdout {
            out.push(format!("mark {mark:?}"));
        }
        if let Some(mark) = &self.mark_stderr {
            out.push(format!("mark-stderr {mark:?}"));
        }
        if let Some(prefix) = &self.prefix {
            out.push(format!("prefix {prefix:?}"));
        }
        if let Some(suffix) = &self.suffix {
            out.push(format!("suffix {suffix:?}"));
        }
        if self.style.is_some() {
            out.push("style".to_owned());
        }
        if let Some(signal) = self.signal {
            out.push(format!("signal {signal}"));
        }
        if let Some(input) = &self.input {
            out.push(format!("input {input:?}"));
        }
        if let Some(path) = &self.input_file {
            out.push(format!("input-file {}", path.display()));
        }
        if self.close_input {
            out.push("close-input".to_owned());
        }
        match self.exit_code {
            Some(ExitCodeAction::Set(code)) => out.push(format!("set-exit-code {code}")),
            Some(ExitCodeAction::Clear) => out.push("clear-exit-code".to_owned()),
            None => {}
        }
        for (verb, targets) in [
            ("disable", &self.disable),
            ("enable", &self.enable),
            ("toggle", &self.toggle),
        ] {
            if !targets.is_empty() {
                let list: Vec<String> = targets.iter().map(|t| format!("#{}", t + 1)).collect();
                out.push(format!("{verb} {}", list.join(",")));
            }
        }
        match self.flow {
            ControlFlow::Continue => {}
            ControlFlow::StopLine => out.push("next-line".to_owned()),
            ControlFlow::JumpTo(target) => out.push(format!("skip-to #{}", target + 1)),
        }
        out
    }
}
