//! 통합 테스트 -- 라인 파이프라인 전체 흐름 검증
//!
//! 메모리 리더/라이터로 세 가지 토폴로지를 검증하고,
//! unix에서는 실제 자식 프로세스로 감독자와의 연결을 확인합니다.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use tea_core::config::RuleConfig;
use tea_core::types::{StreamKind, StreamSelector, Topology};
use tea_pipeline::{
    ChainSettings, ChildStreams, FixedExitCode, Line, LinePipelineBuilder, OutputSinks,
    PipelineError, PipelineStats, PlainRenderer, ProcessControl, RuleEngine, RuleSet, Signal,
};

/// 기록용 프로세스 제어 구현
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Signal(i32),
    Input(Vec<u8>),
    CloseInput,
    SetExitCode(u8),
    ClearExitCode,
}

#[derive(Default)]
struct RecordingControl {
    calls: Mutex<Vec<Call>>,
    exit_code: FixedExitCode,
}

impl RecordingControl {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProcessControl for RecordingControl {
    fn signal(&self, signal: Signal) -> Result<(), PipelineError> {
        self.push(Call::Signal(signal.number()));
        Ok(())
    }

    async fn write_input(&self, data: Bytes) -> Result<(), PipelineError> {
        self.push(Call::Input(data.to_vec()));
        Ok(())
    }

    async fn write_input_file(&self, path: &Path) -> Result<(), PipelineError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Input(e.to_string()))?;
        self.push(Call::Input(content));
        Ok(())
    }

    async fn close_input(&self) -> Result<(), PipelineError> {
        self.push(Call::CloseInput);
        Ok(())
    }

    fn set_fixed_exit_code(&self, code: u8) {
        self.push(Call::SetExitCode(code));
        self.exit_code.set(code);
    }

    fn clear_fixed_exit_code(&self) {
        self.push(Call::ClearExitCode);
        self.exit_code.clear();
    }
}

fn named(name: &str) -> RuleConfig {
    RuleConfig {
        name: Some(name.to_owned()),
        ..RuleConfig::default()
    }
}

fn compile(rules: &[RuleConfig], topology: Topology) -> RuleSet {
    compile_with_limit(rules, topology, 65535)
}

fn compile_with_limit(rules: &[RuleConfig], topology: Topology, max: usize) -> RuleSet {
    RuleSet::compile_rules(
        rules,
        ChainSettings {
            topology,
            max_line_length: max,
        },
    )
    .unwrap()
}

struct Output {
    stdout: String,
    stderr: String,
    stats: PipelineStats,
}

async fn run_pipeline(
    rule_set: RuleSet,
    control: Arc<RecordingControl>,
    stdout: impl Into<Vec<u8>>,
    stderr: impl Into<Vec<u8>>,
) -> Result<Output, PipelineError> {
    let (out_writer, mut out_reader) = tokio::io::duplex(1 << 16);
    let (err_writer, mut err_reader) = tokio::io::duplex(1 << 16);

    let stats = LinePipelineBuilder::new(rule_set, control)
        .renderer(Arc::new(PlainRenderer))
        .build()?
        .run(
            ChildStreams {
                stdout: Cursor::new(stdout.into()),
                stderr: Cursor::new(stderr.into()),
            },
            OutputSinks {
                stdout: out_writer,
                stderr: err_writer,
            },
        )
        .await?;

    let mut output = Output {
        stdout: String::new(),
        stderr: String::new(),
        stats,
    };
    out_reader.read_to_string(&mut output.stdout).await?;
    err_reader.read_to_string(&mut output.stderr).await?;
    Ok(output)
}

#[tokio::test]
async fn prefix_is_applied_to_matching_lines() {
    let mut rule = named("r1");
    rule.patterns = vec!["ERROR".to_owned()];
    rule.prefix = Some("[ERR] ".to_owned());

    let output = run_pipeline(
        compile(&[rule], Topology::Split),
        Arc::default(),
        "ERROR: disk full\nall good\n",
        "",
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "[ERR] ERROR: disk full\nall good\n");
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn reroute_moves_lines_between_streams() {
    let mut rule = named("warn");
    rule.patterns = vec!["^warning".to_owned()];
    rule.send_to = Some(StreamKind::Stderr);

    let output = run_pipeline(
        compile(&[rule], Topology::Split),
        Arc::default(),
        "compiling\nwarning: unused\n",
        "",
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "compiling\n");
    assert_eq!(output.stderr, "warning: unused\n");
    assert_eq!(output.stats.stdout_lines_read, 2);
    assert_eq!(output.stats.stderr_fragments, 2);
}

#[tokio::test]
async fn split_topology_keeps_chain_state_independent() {
    let mut off = named("off");
    off.patterns = vec!["OFF".to_owned()];
    off.streams = StreamSelector::All;
    off.disable = vec!["seen".to_owned()];
    let mut seen = named("seen");
    seen.streams = StreamSelector::All;
    seen.mark = Some("seen".to_owned());
    seen.mark_stderr = Some("seen".to_owned());

    let output = run_pipeline(
        compile(&[off, seen], Topology::Split),
        Arc::default(),
        "OFF\nx\n",
        "y\n",
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "OFF\nx\n");
    assert_eq!(output.stderr, "seen\n");
}

#[tokio::test]
async fn shared_commands_topology_shares_one_chain() {
    let mut off = named("off");
    off.patterns = vec!["OFF".to_owned()];
    off.streams = StreamSelector::All;
    off.disable = vec!["seen".to_owned()];
    let mut seen = named("seen");
    seen.streams = StreamSelector::All;
    seen.mark_stderr = Some("seen".to_owned());

    let (out_writer, mut out_reader) = tokio::io::duplex(1024);
    let (err_writer, mut err_reader) = tokio::io::duplex(1024);
    let (mut child_err, err_source) = tokio::io::duplex(1024);

    let pipeline = LinePipelineBuilder::new(
        compile(&[off, seen], Topology::SharedCommands),
        Arc::new(RecordingControl::default()),
    )
    .renderer(Arc::new(PlainRenderer))
    .build()
    .unwrap();
    let running = tokio::spawn(pipeline.run(
        ChildStreams {
            stdout: Cursor::new(b"OFF\n".to_vec()),
            stderr: err_source,
        },
        OutputSinks {
            stdout: out_writer,
            stderr: err_writer,
        },
    ));

    // stdout 라인이 출력된 뒤에야 stderr 라인을 보내 평가 순서를 고정합니다.
    let mut first = [0u8; 4];
    out_reader.read_exact(&mut first).await.unwrap();
    assert_eq!(&first, b"OFF\n");
    child_err.write_all(b"y\n").await.unwrap();
    drop(child_err);

    running.await.unwrap().unwrap();
    let mut stderr = String::new();
    err_reader.read_to_string(&mut stderr).await.unwrap();
    assert_eq!(stderr, "y\n");
}

#[tokio::test]
async fn shared_streams_topology_writes_only_stdout() {
    let mut tag = named("tag");
    tag.prefix = Some("| ".to_owned());

    let output = run_pipeline(
        compile(&[tag], Topology::SharedStreams),
        Arc::default(),
        "out\n",
        "err\n",
    )
    .await
    .unwrap();

    let mut lines: Vec<_> = output.stdout.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["| err", "| out"]);
    assert!(output.stderr.is_empty());
    assert_eq!(output.stats.stderr_lines_read, 1);
}

#[tokio::test]
async fn exit_code_actions_reach_the_controller() {
    let mut fail = named("fail");
    fail.patterns = vec!["FAIL".to_owned()];
    fail.set_exit_code = Some(42);
    let mut recover = named("recover");
    recover.patterns = vec!["RETRY OK".to_owned()];
    recover.clear_exit_code = true;

    let control = Arc::new(RecordingControl::default());
    run_pipeline(
        compile(&[fail, recover], Topology::Split),
        Arc::clone(&control),
        "FAIL one\nRETRY OK\nFAIL two\n",
        "",
    )
    .await
    .unwrap();

    assert_eq!(
        control.calls(),
        vec![
            Call::SetExitCode(42),
            Call::ClearExitCode,
            Call::SetExitCode(42)
        ]
    );
    assert_eq!(control.exit_code.get(), Some(42));
}

#[cfg(unix)]
#[tokio::test]
async fn side_effects_are_applied_in_action_order() {
    let mut rule = named("all");
    rule.patterns = vec!["go".to_owned()];
    rule.signal = Some(tea_core::config::SignalSpec::Number(15));
    rule.input = Some("y\n".to_owned());
    rule.close_input = true;
    rule.set_exit_code = Some(3);

    let control = Arc::new(RecordingControl::default());
    run_pipeline(
        compile(&[rule], Topology::Split),
        Arc::clone(&control),
        "go\n",
        "",
    )
    .await
    .unwrap();

    assert_eq!(
        control.calls(),
        vec![
            Call::Signal(15),
            Call::Input(b"y\n".to_vec()),
            Call::SetExitCode(3),
            Call::CloseInput,
        ]
    );
}

#[tokio::test]
async fn input_file_contents_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("answer.txt");
    std::fs::write(&path, "42\n").unwrap();

    let mut rule = named("ask");
    rule.patterns = vec!["\\?$".to_owned()];
    rule.input_file = Some(path);

    let control = Arc::new(RecordingControl::default());
    run_pipeline(
        compile(&[rule], Topology::Split),
        Arc::clone(&control),
        "what is the answer?\n",
        "",
    )
    .await
    .unwrap();

    assert_eq!(control.calls(), vec![Call::Input(b"42\n".to_vec())]);
}

#[tokio::test]
async fn line_too_long_fails_the_pipeline() {
    let err = run_pipeline(
        compile_with_limit(&[named("any")], Topology::Split, 8),
        Arc::default(),
        "short\n0123456789\n",
        "",
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(
        err,
        PipelineError::LineTooLong {
            stream: StreamKind::Stdout,
            limit: 8
        }
    ));
}

#[tokio::test]
async fn final_unterminated_line_is_relayed() {
    let output = run_pipeline(
        compile(&[named("any")], Topology::Split),
        Arc::default(),
        "first\nlast",
        "tail",
    )
    .await
    .unwrap();

    assert_eq!(output.stdout, "first\nlast\n");
    assert_eq!(output.stderr, "tail\n");
}

#[tokio::test]
async fn closed_sink_is_an_output_error() {
    let (out_writer, out_reader) = tokio::io::duplex(16);
    drop(out_reader);

    let err = LinePipelineBuilder::new(
        compile(&[named("any")], Topology::Split),
        Arc::new(RecordingControl::default()),
    )
    .renderer(Arc::new(PlainRenderer))
    .build()
    .unwrap()
    .run(
        ChildStreams {
            stdout: Cursor::new(b"hello\n".to_vec()),
            stderr: Cursor::new(Vec::new()),
        },
        OutputSinks {
            stdout: out_writer,
            stderr: tokio::io::sink(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Output {
            stream: StreamKind::Stdout,
            ..
        }
    ));
}

#[cfg(unix)]
mod with_child {
    use tea_pipeline::ProcessSupervisor;
    use tokio::process::Command;

    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script).kill_on_drop(true);
        command
    }

    async fn supervise(rules: &[RuleConfig], script: &str) -> (String, i32) {
        let rule_set = compile(rules, Topology::Split);
        let (supervisor, streams) =
            ProcessSupervisor::spawn(shell(script), rule_set.needs_input()).unwrap();
        let (out_writer, mut out_reader) = tokio::io::duplex(1 << 16);

        LinePipelineBuilder::new(rule_set, Arc::new(supervisor.handle()))
            .renderer(Arc::new(PlainRenderer))
            .build()
            .unwrap()
            .run(
                streams,
                OutputSinks {
                    stdout: out_writer,
                    stderr: tokio::io::sink(),
                },
            )
            .await
            .unwrap();

        let outcome = supervisor.wait().await.unwrap();
        let mut stdout = String::new();
        out_reader.read_to_string(&mut stdout).await.unwrap();
        (stdout, outcome.code())
    }

    #[tokio::test]
    async fn fixed_exit_code_overrides_successful_child() {
        let mut rule = named("fail");
        rule.patterns = vec!["trigger".to_owned()];
        rule.set_exit_code = Some(42);

        let (stdout, code) = supervise(&[rule], "echo trigger; exit 0").await;
        assert_eq!(stdout, "trigger\n");
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn child_exit_code_passes_through() {
        let (_, code) = supervise(&[named("any")], "echo hi; exit 5").await;
        assert_eq!(code, 5);
    }

    #[tokio::test]
    async fn input_is_written_before_repeated_close() {
        let mut answer = named("answer");
        answer.patterns = vec!["^ready$".to_owned()];
        answer.input = Some("hello\n".to_owned());
        let mut close = named("close");
        close.close_input = true;

        let (stdout, code) = supervise(&[answer, close], "echo ready; cat").await;
        assert_eq!(stdout, "ready\nhello\n");
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn signal_action_terminates_child() {
        let mut rule = named("stop");
        rule.patterns = vec!["start".to_owned()];
        rule.signal = Some(tea_core::config::SignalSpec::Name("TERM".to_owned()));

        let (stdout, code) = supervise(&[rule], "echo start; exec sleep 30").await;
        assert_eq!(stdout, "start\n");
        assert_eq!(code, 128 + 15);
    }
}

fn toggling_chain() -> Vec<RuleConfig> {
    let mut flip = named("flip");
    flip.patterns = vec!["a".to_owned()];
    flip.toggle = vec!["tag".to_owned()];
    let mut tag = named("tag");
    tag.patterns = vec!["b".to_owned()];
    tag.prefix = Some("> ".to_owned());
    let mut stop = named("stop");
    stop.patterns = vec!["c".to_owned()];
    stop.mark = Some("-".to_owned());
    stop.disable = vec!["flip".to_owned()];
    let mut restart = named("restart");
    restart.patterns = vec!["d".to_owned()];
    restart.enable = vec!["flip".to_owned()];
    vec![flip, tag, stop, restart]
}

fn stdout_line(text: &str) -> Line {
    Line::new(text.to_owned(), StreamKind::Stdout)
}

fn run_engine(rule_set: &RuleSet, lines: &[String]) -> (Vec<Vec<String>>, Vec<bool>) {
    let mut engine = RuleEngine::new(rule_set, Arc::new(PlainRenderer));
    let outputs = lines
        .iter()
        .map(|text| engine.evaluate(stdout_line(text)).unwrap().fragments)
        .collect();
    (outputs, engine.enabled_flags())
}

/// 주어진 라인을 모두 평가한 뒤의 엔진
fn engine_after(rule_set: &RuleSet, lines: &[String]) -> RuleEngine {
    let mut engine = RuleEngine::new(rule_set, Arc::new(PlainRenderer));
    for text in lines {
        engine.evaluate(stdout_line(text)).unwrap();
    }
    engine
}

proptest! {
    #[test]
    fn engine_is_deterministic(lines in prop::collection::vec("[a-e ]{0,12}", 0..40)) {
        let rule_set = compile(&toggling_chain(), Topology::Split);
        let first = run_engine(&rule_set, &lines);
        let second = run_engine(&rule_set, &lines);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn evaluation_depends_only_on_enabled_flags_and_line(
        left in prop::collection::vec("[a-e ]{0,12}", 0..20),
        right in prop::collection::vec("[a-e ]{0,12}", 0..20),
        next in prop::collection::vec("[a-e ]{0,12}", 1..20),
    ) {
        let rule_set = compile(&toggling_chain(), Topology::Split);
        let mut replayed = engine_after(&rule_set, &left);
        let mut from_left = engine_after(&rule_set, &left);
        let mut from_right = engine_after(&rule_set, &right);
        let same_state = from_left.enabled_flags() == from_right.enabled_flags();

        for text in &next {
            let expected = from_left.evaluate(stdout_line(text)).unwrap();
            prop_assert_eq!(&replayed.evaluate(stdout_line(text)).unwrap(), &expected);
            let other = from_right.evaluate(stdout_line(text)).unwrap();
            if same_state {
                prop_assert_eq!(&other, &expected);
                prop_assert_eq!(from_right.enabled_flags(), from_left.enabled_flags());
            }
            prop_assert_eq!(replayed.enabled_flags(), from_left.enabled_flags());
        }
    }

    #[test]
    fn merge_preserves_every_line_and_per_origin_order(
        out_lines in prop::collection::vec("[a-z0-9 ]{0,16}", 0..30),
        err_lines in prop::collection::vec("[a-z0-9 ]{0,16}", 0..30),
    ) {
        let mut from_out = named("from-out");
        from_out.prefix = Some("o:".to_owned());
        let mut from_err = named("from-err");
        from_err.streams = StreamSelector::Stderr;
        from_err.prefix = Some("e:".to_owned());
        from_err.send_to = Some(StreamKind::Stdout);
        let rule_set = compile(&[from_out, from_err], Topology::SharedCommands);

        let join = |lines: &[String]| lines.iter().map(|l| format!("{l}\n")).collect::<String>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let output = runtime
            .block_on(run_pipeline(
                rule_set,
                Arc::default(),
                join(&out_lines),
                join(&err_lines),
            ))
            .unwrap();

        let merged: Vec<&str> = output.stdout.lines().collect();
        prop_assert_eq!(merged.len(), out_lines.len() + err_lines.len());
        let seen_out: Vec<&str> = merged.iter().filter_map(|l| l.strip_prefix("o:")).collect();
        let seen_err: Vec<&str> = merged.iter().filter_map(|l| l.strip_prefix("e:")).collect();
        prop_assert_eq!(seen_out, out_lines.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(seen_err, err_lines.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert!(output.stderr.is_empty());
        prop_assert_eq!(output.stats.lines_evaluated, merged.len() as u64);
    }
}
