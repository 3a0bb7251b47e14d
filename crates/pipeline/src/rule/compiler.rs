//! 규칙 컴파일러 -- 설정의 규칙 목록을 검증하고 실행 가능한 체인으로 변환합니다.
//!
//! 모든 이름 참조(disable/enable/toggle/skip_to)는 여기서 서수로 해석되므로
//! 규칙 엔진은 런타임에 이름을 조회하지 않습니다.
//!
//! # 검증 순서 (규칙 #i 기준)
//! 1. 이름: 유일, 비어있지 않음, `-`로 시작하지 않음 (먼저 전체 색인)
//! 2. shared-streams 토폴로지: stderr 관련 설정 금지
//! 3. 패턴: 비어있지 않고 정규식으로 컴파일 가능
//! 4. `match = "any"`는 패턴 하나 이상 필요
//! 5. 종료 코드: 0..=255, set/clear 동시 사용 불가
//! 6. disable/enable/toggle: 존재하는 이름, 한 이름은 한 목록에만
//! 7. skip_to: 존재하고 뒤로 가지 않으며 next_line과 동시 사용 불가
//! 8. 자기 자신으로의 skip_to는 자기 비활성화/토글 필요
//! 9. signal: 시그널 테이블에서 해석 가능

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use tea_core::config::{RuleConfig, TeaConfig};
use tea_core::types::{MatchMode, RuleState, StreamKind, StreamSelector, Topology};

use super::types::{ActionSet, Condition, ControlFlow, ExitCodeAction, LineScope, Rule};
use crate::error::PipelineError;
use crate::signal::Signal;
use crate::style::Style;

/// 체인 전역 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    /// 스트림 토폴로지
    pub topology: Topology,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

/// 검증과 이름 해석이 끝난 규칙 체인
///
/// 파이프라인은 토폴로지에 따라 이 값에서 하나 또는 두 개의 체인 인스턴스를 복제합니다.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    settings: ChainSettings,
}

impl RuleSet {
    /// 전체 설정에서 규칙 체인을 컴파일합니다.
    pub fn compile(config: &TeaConfig) -> Result<Self, PipelineError> {
        Self::compile_rules(
            &config.rules,
            ChainSettings {
                topology: config.pipeline.topology,
                max_line_length: config.pipeline.line_buffer_size,
            },
        )
    }

    /// 규칙 목록과 체인 설정으로 규칙 체인을 컴파일합니다.
    pub fn compile_rules(
        configs: &[RuleConfig],
        settings: ChainSettings,
    ) -> Result<Self, PipelineError> {
        let index = build_index(configs)?;

        let rules = configs
            .iter()
            .enumerate()
            .map(|(ordinal, config)| compile_rule(ordinal, config, &index, settings.topology))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            rules = rules.len(),
            topology = %settings.topology,
            "compiled rule chain"
        );

        Ok(Self {
            rules,
            index,
            settings,
        })
    }

    /// 규칙 목록 (정의 순서)
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 이름으로 서수를 찾습니다.
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// 체인 전역 설정
    pub fn settings(&self) -> ChainSettings {
        self.settings
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 자식 stdin에 쓰거나 닫는 규칙이 있는지 확인합니다.
    pub fn needs_input(&self) -> bool {
        self.rules.iter().any(|r| r.actions.touches_input())
    }
}

fn invalid(config: &RuleConfig, ordinal: usize, reason: impl Into<String>) -> PipelineError {
    PipelineError::RuleValidation {
        rule: config.label(ordinal),
        reason: reason.into(),
    }
}

fn build_index(configs: &[RuleConfig]) -> Result<HashMap<String, usize>, PipelineError> {
    let mut index = HashMap::new();
    for (ordinal, config) in configs.iter().enumerate() {
        let Some(name) = config.name.as_deref() else {
            continue;
        };
        if name.is_empty() {
            return Err(invalid(config, ordinal, "rule name must not be empty"));
        }
        if name.starts_with('-') {
            return Err(invalid(
                config,
                ordinal,
                format!("rule name '{name}' must not start with '-'"),
            ));
        }
        if let Some(first) = index.insert(name.to_owned(), ordinal) {
            return Err(invalid(
                config,
                ordinal,
                format!("duplicate rule name '{name}' (first used by rule #{})", first + 1),
            ));
        }
    }
    Ok(index)
}

fn compile_rule(
    ordinal: usize,
    config: &RuleConfig,
    index: &HashMap<String, usize>,
    topology: Topology,
) -> Result<Rule, PipelineError> {
    if topology == Topology::SharedStreams {
        check_shared_streams(ordinal, config)?;
    }

    let condition = compile_condition(ordinal, config)?;
    let exit_code = compile_exit_code(ordinal, config)?;
    let (disable, enable, toggle) = resolve_state_targets(ordinal, config, index)?;
    let flow = compile_flow(ordinal, config, index, &disable, &toggle)?;

    let signal = match &config.signal {
        Some(spec) => Some(
            Signal::resolve(spec)
                .ok_or_else(|| invalid(config, ordinal, format!("unknown signal '{spec}'")))?,
        ),
        None => None,
    };

    let (enabled, scope) = match config.state {
        RuleState::Enabled => (true, LineScope::Persistent),
        RuleState::Disabled => (false, LineScope::Persistent),
        RuleState::LineEnabled => (true, LineScope::Enable),
        RuleState::LineDisabled => (false, LineScope::Disable),
    };

    let actions = ActionSet {
        reroute: config.send_to,
        mark_stdout: config.mark.clone(),
        mark_stderr: config.mark_stderr.clone(),
        prefix: config.prefix.clone(),
        suffix: config.suffix.clone(),
        style: config.style.as_ref().map(Style::from),
        signal,
        input: config.input.clone(),
        input_file: config.input_file.clone(),
        close_input: config.close_input,
        exit_code,
        disable,
        enable,
        toggle,
        flow,
    };

    Ok(Rule {
        ordinal,
        name: config.name.clone(),
        label: config.label(ordinal),
        enabled,
        scope,
        condition: Arc::new(condition),
        actions: Arc::new(actions),
    })
}

fn check_shared_streams(ordinal: usize, config: &RuleConfig) -> Result<(), PipelineError> {
    if config.mark_stderr.is_some() {
        return Err(invalid(
            config,
            ordinal,
            "mark_stderr is not allowed with the shared-streams topology",
        ));
    }
    if config.streams != StreamSelector::Stdout {
        return Err(invalid(
            config,
            ordinal,
            "streams must be 'stdout' with the shared-streams topology",
        ));
    }
    if config.send_to == Some(StreamKind::Stderr) {
        return Err(invalid(
            config,
            ordinal,
            "send_to = 'stderr' is not allowed with the shared-streams topology",
        ));
    }
    Ok(())
}

fn compile_condition(ordinal: usize, config: &RuleConfig) -> Result<Condition, PipelineError> {
    let mut patterns = Vec::with_capacity(config.patterns.len());
    for pattern in &config.patterns {
        if pattern.is_empty() {
            return Err(invalid(config, ordinal, "patterns must not be empty strings"));
        }
        let regex = Regex::new(pattern).map_err(|source| PipelineError::InvalidPattern {
            rule: config.label(ordinal),
            pattern: pattern.clone(),
            source,
        })?;
        patterns.push(regex);
    }

    if config.match_mode == MatchMode::Any && patterns.is_empty() {
        return Err(invalid(
            config,
            ordinal,
            "match = 'any' requires at least one pattern",
        ));
    }

    Ok(Condition {
        patterns,
        match_mode: config.match_mode,
        negate: config.negate,
        sources: config.streams,
    })
}

fn compile_exit_code(
    ordinal: usize,
    config: &RuleConfig,
) -> Result<Option<ExitCodeAction>, PipelineError> {
    match (config.set_exit_code, config.clear_exit_code) {
        (Some(_), true) => Err(invalid(
            config,
            ordinal,
            "set_exit_code and clear_exit_code are mutually exclusive",
        )),
        (Some(code), false) => u8::try_from(code)
            .map(|code| Some(ExitCodeAction::Set(code)))
            .map_err(|_| {
                invalid(
                    config,
                    ordinal,
                    format!("set_exit_code {code} is out of range 0..=255"),
                )
            }),
        (None, true) => Ok(Some(ExitCodeAction::Clear)),
        (None, false) => Ok(None),
    }
}

type StateTargets = (Vec<usize>, Vec<usize>, Vec<usize>);

fn resolve_state_targets(
    ordinal: usize,
    config: &RuleConfig,
    index: &HashMap<String, usize>,
) -> Result<StateTargets, PipelineError> {
    let mut seen: HashMap<String, &'static str> = HashMap::new();
    let mut resolve = |list: &'static str, names: &[String]| -> Result<Vec<usize>, PipelineError> {
        let mut ordinals = Vec::with_capacity(names.len());
        for name in names {
            if let Some(previous) = seen.insert(name.clone(), list) {
                return Err(invalid(
                    config,
                    ordinal,
                    format!("rule '{name}' appears in both {previous} and {list}"),
                ));
            }
            let target = index.get(name).copied().ok_or_else(|| {
                invalid(config, ordinal, format!("unknown rule '{name}' in {list}"))
            })?;
            ordinals.push(target);
        }
        Ok(ordinals)
    };

    let disable = resolve("disable", &config.disable)?;
    let enable = resolve("enable", &config.enable)?;
    let toggle = resolve("toggle", &config.toggle)?;
    Ok((disable, enable, toggle))
}

fn compile_flow(
    ordinal: usize,
    config: &RuleConfig,
    index: &HashMap<String, usize>,
    disable: &[usize],
    toggle: &[usize],
) -> Result<ControlFlow, PipelineError> {
    let Some(name) = config.skip_to.as_deref() else {
        return Ok(if config.next_line {
            ControlFlow::StopLine
        } else {
            ControlFlow::Continue
        });
    };

    if config.next_line {
        return Err(invalid(
            config,
            ordinal,
            "skip_to and next_line are mutually exclusive",
        ));
    }

    let target = index
        .get(name)
        .copied()
        .ok_or_else(|| invalid(config, ordinal, format!("unknown rule '{name}' in skip_to")))?;

    if target < ordinal {
        return Err(invalid(
            config,
            ordinal,
            format!("skip_to '{name}' points backwards to rule #{}", target + 1),
        ));
    }

    if target == ordinal && !disable.contains(&ordinal) && !toggle.contains(&ordinal) {
        return Err(invalid(
            config,
            ordinal,
            "skip_to targets the rule itself without disabling or toggling it",
        ));
    }

    Ok(ControlFlow::JumpTo(target))
}
