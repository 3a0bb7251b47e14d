#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tea_core::config::RuleConfig;
use tea_core::types::{StreamKind, StreamSelector, Topology};
use tea_pipeline::{ChainSettings, Line, PlainRenderer, RuleEngine, RuleSet};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 8개로 제한)
    rules: Vec<FuzzRule>,
    /// 평가할 라인
    lines: Vec<(bool, String)>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    pattern: Option<String>,
    negate: bool,
    stderr_only: bool,
    prefix: Option<String>,
    suffix: Option<String>,
    reroute: bool,
    toggle_self: bool,
    next_line: bool,
}

fuzz_target!(|input: FuzzInput| {
    let configs: Vec<RuleConfig> = input
        .rules
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, r)| RuleConfig {
            name: Some(format!("r{i}")),
            patterns: r.pattern.iter().cloned().collect(),
            negate: r.negate,
            streams: if r.stderr_only {
                StreamSelector::Stderr
            } else {
                StreamSelector::All
            },
            prefix: r.prefix.clone(),
            suffix: r.suffix.clone(),
            send_to: r.reroute.then_some(StreamKind::Stderr),
            toggle: if r.toggle_self {
                vec![format!("r{i}")]
            } else {
                Vec::new()
            },
            next_line: r.next_line,
            ..RuleConfig::default()
        })
        .collect();

    let settings = ChainSettings {
        topology: Topology::SharedCommands,
        max_line_length: 4096,
    };
    // 잘못된 정규식 등은 컴파일 에러로 끝나야 함
    let Ok(rule_set) = RuleSet::compile_rules(&configs, settings) else {
        return;
    };

    let mut engine = RuleEngine::new(&rule_set, Arc::new(PlainRenderer));
    for (is_stderr, text) in input.lines.into_iter().take(32) {
        let origin = if is_stderr {
            StreamKind::Stderr
        } else {
            StreamKind::Stdout
        };
        if let Ok(evaluation) = engine.evaluate(Line::new(text, origin)) {
            assert_eq!(evaluation.fragments.last().map(String::as_str), Some("\n"));
        }
    }
});
