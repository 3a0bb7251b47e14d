//! 규칙 엔진 -- 체인 인스턴스 하나로 라인을 한 줄씩 평가합니다.
//!
//! [`RuleEngine`]은 [`RuleSet`]에서 복제한 규칙 목록(체인 인스턴스)을 독점 소유합니다.
//! 규칙의 `enabled` 플래그는 이 엔진만 변경하므로 잠금이 필요 없습니다.
//!
//! # 평가 단계
//! 1. 사전 단계: 라인 단위 규칙의 `enabled`를 강제
//! 2. 평가 단계: 서수 0부터 조건을 평가하고 매칭된 규칙의 액션을 적용
//! 3. 출력 단계: mark 또는 prefix/text/suffix 조각을 스타일과 함께 생성
//!
//! 프로세스에 대한 부수 효과(시그널, 입력, 종료 코드)는 [`Effect`]로 모아
//! 호출자가 순서대로 실행합니다.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use tracing::trace;

use tea_core::metrics::{LABEL_RULE, RULE_MATCHES_TOTAL};
use tea_core::types::StreamKind;

use crate::error::PipelineError;
use crate::line::Line;
use crate::rule::{ControlFlow, ExitCodeAction, LineScope, Rule, RuleSet};
use crate::signal::Signal;
use crate::style::StyleRenderer;

/// 라인 출력의 끝을 나타내는 조각 (스타일 없음)
pub const LINE_TERMINATOR: &str = "\n";

/// 자식 프로세스 또는 프로세스 전역 상태에 대한 부수 효과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// 시그널 전달
    Signal(Signal),
    /// stdin에 텍스트 쓰기
    Input(String),
    /// stdin으로 파일 내용 스트리밍
    InputFile(PathBuf),
    /// 종료 코드 고정
    SetExitCode(u8),
    /// 고정 종료 코드 해제
    ClearExitCode,
}

/// 한 라인의 평가 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// 출력 조각이 기록될 스트림
    pub destination: StreamKind,
    /// 순서대로 기록할 출력 조각 (마지막은 항상 줄바꿈)
    pub fragments: Vec<String>,
    /// 액션 적용 순서대로 모은 부수 효과
    pub effects: Vec<Effect>,
    /// 출력 후 자식 stdin을 닫아야 하는지 여부
    pub close_input: bool,
    /// 매칭된 규칙 서수 (매칭 순서)
    pub matched: Vec<usize>,
}

/// 규칙 엔진 (체인 인스턴스 하나)
pub struct RuleEngine {
    rules: Vec<Rule>,
    renderer: Arc<dyn StyleRenderer>,
}

impl RuleEngine {
    /// 규칙 체인을 복제하여 새 체인 인스턴스를 만듭니다.
    pub fn new(rule_set: &RuleSet, renderer: Arc<dyn StyleRenderer>) -> Self {
        Self {
            rules: rule_set.rules().to_vec(),
            renderer,
        }
    }

    /// 규칙 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 서수로 규칙의 현재 활성 여부를 조회합니다.
    pub fn is_enabled(&self, ordinal: usize) -> Option<bool> {
        self.rules.get(ordinal).map(|r| r.enabled)
    }

    /// 모든 규칙의 활성 여부를 서수 순으로 반환합니다.
    pub fn enabled_flags(&self) -> Vec<bool> {
        self.rules.iter().map(|r| r.enabled).collect()
    }

    /// 라인 하나를 평가합니다.
    ///
    /// 런타임에 존재하지 않는 서수를 만나면 [`PipelineError::Invariant`]로 실패합니다.
    pub fn evaluate(&mut self, mut line: Line) -> Result<Evaluation, PipelineError> {
        self.apply_line_scope();

        let mut effects = Vec::new();
        let mut matched = Vec::new();
        let mut close_input = false;
        let mut ordinal = 0;

        while ordinal < self.rules.len() {
            let rule = &self.rules[ordinal];
            if !rule.enabled
                || !rule.condition.applies_to(line.origin)
                || !rule.condition.matches(&line.text)
            {
                ordinal += 1;
                continue;
            }

            trace!(rule = %rule.label, ordinal, "rule matched");
            counter!(RULE_MATCHES_TOTAL, LABEL_RULE => rule.label.clone()).increment(1);
            matched.push(ordinal);

            let actions = Arc::clone(&rule.actions);

            if let Some(stream) = actions.reroute {
                line.destination = stream;
            }
            if let Some(mark) = &actions.mark_stdout {
                line.mark_stdout = Some(mark.clone());
            }
            if let Some(mark) = &actions.mark_stderr {
                line.mark_stderr = Some(mark.clone());
            }
            if let Some(prefix) = &actions.prefix {
                line.prefix = Some(prefix.clone());
            }
            if let Some(suffix) = &actions.suffix {
                line.suffix = Some(suffix.clone());
            }
            if let Some(style) = &actions.style {
                line.style = Some(style.clone());
            }
            if let Some(signal) = actions.signal {
                effects.push(Effect::Signal(signal));
            }
            if let Some(input) = &actions.input {
                effects.push(Effect::Input(input.clone()));
            }
            if let Some(path) = &actions.input_file {
                effects.push(Effect::InputFile(path.clone()));
            }
            if actions.close_input {
                close_input = true;
            }
            match actions.exit_code {
                Some(ExitCodeAction::Set(code)) => effects.push(Effect::SetExitCode(code)),
                Some(ExitCodeAction::Clear) => effects.push(Effect::ClearExitCode),
                None => {}
            }
            for &target in &actions.disable {
                self.rule_mut(target)?.enabled = false;
            }
            for &target in &actions.enable {
                self.rule_mut(target)?.enabled = true;
            }
            for &target in &actions.toggle {
                let rule = self.rule_mut(target)?;
                rule.enabled = !rule.enabled;
            }

            match actions.flow {
                ControlFlow::Continue => ordinal += 1,
                ControlFlow::StopLine => break,
                ControlFlow::JumpTo(target) => {
                    if target < ordinal || target >= self.rules.len() {
                        return Err(PipelineError::Invariant(format!(
                            "rule #{} jumps to invalid ordinal {target}",
                            ordinal + 1
                        )));
                    }
                    ordinal = target;
                }
            }
        }

        Ok(Evaluation {
            destination: line.destination,
            fragments: self.render(&line),
            effects,
            close_input,
            matched,
        })
    }

    /// 라인 단위 규칙의 `enabled`를 강제합니다. 모든 규칙에 대해 매 라인 실행됩니다.
    fn apply_line_scope(&mut self) {
        for rule in &mut self.rules {
            match rule.scope {
                LineScope::Persistent => {}
                LineScope::Enable => rule.enabled = true,
                LineScope::Disable => rule.enabled = false,
            }
        }
    }

    fn rule_mut(&mut self, ordinal: usize) -> Result<&mut Rule, PipelineError> {
        self.rules
            .get_mut(ordinal)
            .ok_or_else(|| PipelineError::Invariant(format!("unknown rule ordinal {ordinal}")))
    }

    fn render(&self, line: &Line) -> Vec<String> {
        let style = line.style.as_ref();
        let mut fragments = Vec::with_capacity(4);

        if let Some(mark) = line.mark() {
            fragments.push(self.renderer.render(mark, style));
        } else {
            if let Some(prefix) = &line.prefix {
                fragments.push(self.renderer.render(prefix, style));
            }
            fragments.push(self.renderer.render(&line.text, style));
            if let Some(suffix) = &line.suffix {
                fragments.push(self.renderer.render(suffix, style));
            }
        }

        fragments.push(LINE_TERMINATOR.to_owned());
        fragments
    }
}
