//! 파이프라인 오케스트레이션 -- 리더/병합/체인/라이터 태스크를 토폴로지에 맞게 연결합니다.
//!
//! # 내부 아키텍처
//! ```text
//! split:
//!   stdout -> LineReader -> RuleEngine #1 --+--> stdout queue -> Writer -> stdout
//!   stderr -> LineReader -> RuleEngine #2 --+--> stderr queue -> Writer -> stderr
//!
//! shared-commands / shared-streams:
//!   stdout -> LineReader --+
//!                          +-> merge -> RuleEngine -> {stdout, stderr} queue -> Writers
//!   stderr -> LineReader --+
//! ```
//!
//! 모든 태스크는 용량이 작은 bounded 채널로만 통신합니다. 느린 라이터는 체인을,
//! 체인은 리더를, 리더는 자식 프로세스의 파이프를 차례로 막습니다.
//!
//! 큐는 송신측이 모두 사라지면 닫히므로 종료 순서는 채널 drop으로 결정됩니다:
//! 리더 종료 → 병합 종료 → 체인 종료 → 큐 닫힘 → 라이터 종료.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use tea_core::metrics::{FRAGMENTS_WRITTEN_TOTAL, LABEL_STREAM, LINES_EVALUATED_TOTAL};
use tea_core::types::{StreamKind, Topology};

use crate::engine::{Effect, RuleEngine};
use crate::error::PipelineError;
use crate::line::Line;
use crate::reader::LineReader;
use crate::rule::RuleSet;
use crate::style::{AnsiRenderer, StyleRenderer};
use crate::supervisor::ProcessControl;

/// 기본 채널 용량 (슬롯 하나)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// 자식 프로세스의 출력 스트림 쌍
#[derive(Debug)]
pub struct ChildStreams<RO, RE> {
    /// 자식 stdout
    pub stdout: RO,
    /// 자식 stderr
    pub stderr: RE,
}

/// 변환된 라인을 기록할 실제 출력 스트림 쌍
#[derive(Debug)]
pub struct OutputSinks<WO, WE> {
    /// 실제 stdout
    pub stdout: WO,
    /// 실제 stderr
    pub stderr: WE,
}

impl OutputSinks<tokio::io::Stdout, tokio::io::Stderr> {
    /// 현재 프로세스의 stdout/stderr를 사용합니다.
    pub fn stdio() -> Self {
        Self {
            stdout: tokio::io::stdout(),
            stderr: tokio::io::stderr(),
        }
    }
}

/// 파이프라인 실행 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// 자식 stdout에서 읽은 라인 수
    pub stdout_lines_read: u64,
    /// 자식 stderr에서 읽은 라인 수
    pub stderr_lines_read: u64,
    /// 규칙 체인이 평가한 라인 수
    pub lines_evaluated: u64,
    /// stdout에 기록한 조각 수
    pub stdout_fragments: u64,
    /// stderr에 기록한 조각 수
    pub stderr_fragments: u64,
}

/// 태스크 종료 보고
#[derive(Debug)]
enum TaskReport {
    Read { stream: StreamKind, lines: u64 },
    Merged,
    Evaluated { lines: u64 },
    Written { stream: StreamKind, fragments: u64 },
}

impl PipelineStats {
    fn record(&mut self, report: TaskReport) {
        match report {
            TaskReport::Read {
                stream: StreamKind::Stdout,
                lines,
            } => self.stdout_lines_read += lines,
            TaskReport::Read {
                stream: StreamKind::Stderr,
                lines,
            } => self.stderr_lines_read += lines,
            TaskReport::Merged => {}
            TaskReport::Evaluated { lines } => self.lines_evaluated += lines,
            TaskReport::Written {
                stream: StreamKind::Stdout,
                fragments,
            } => self.stdout_fragments += fragments,
            TaskReport::Written {
                stream: StreamKind::Stderr,
                fragments,
            } => self.stderr_fragments += fragments,
        }
    }
}

type TaskResult = Result<TaskReport, PipelineError>;

/// 라인 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let (supervisor, streams) = ProcessSupervisor::spawn(command, rule_set.needs_input())?;
/// let pipeline = LinePipelineBuilder::new(rule_set, Arc::new(supervisor.handle())).build()?;
/// let stats = pipeline.run(streams, OutputSinks::stdio()).await?;
/// let outcome = supervisor.wait().await?;
/// ```
pub struct LinePipeline<C> {
    rule_set: RuleSet,
    control: Arc<C>,
    renderer: Arc<dyn StyleRenderer>,
    channel_capacity: usize,
}

impl<C: ProcessControl> LinePipeline<C> {
    /// 선택된 토폴로지
    pub fn topology(&self) -> Topology {
        self.rule_set.settings().topology
    }

    /// 체인의 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rule_set.len()
    }

    /// 파이프라인을 끝까지 실행합니다.
    ///
    /// 두 라이터가 모두 끝나면 통계를 반환합니다. 태스크 하나라도 실패하면
    /// 나머지를 중단하고 그 에러를 즉시 반환합니다. 자식 프로세스의 종료 대기는
    /// 호출자의 몫입니다.
    pub async fn run<RO, RE, WO, WE>(
        self,
        streams: ChildStreams<RO, RE>,
        sinks: OutputSinks<WO, WE>,
    ) -> Result<PipelineStats, PipelineError>
    where
        RO: AsyncRead + Unpin + Send + 'static,
        RE: AsyncRead + Unpin + Send + 'static,
        WO: AsyncWrite + Unpin + Send + 'static,
        WE: AsyncWrite + Unpin + Send + 'static,
    {
        let topology = self.topology();
        let max_line_length = self.rule_set.settings().max_line_length;
        let capacity = self.channel_capacity;
        info!(%topology, rules = self.rule_set.len(), "starting line pipeline");

        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);
        tasks.spawn(run_writer(sinks.stdout, stdout_rx, StreamKind::Stdout));
        tasks.spawn(run_writer(sinks.stderr, stderr_rx, StreamKind::Stderr));

        // shared-streams에서는 stderr 라인도 stdout 출처로 취급합니다.
        let stderr_origin = match topology {
            Topology::SharedStreams => StreamKind::Stdout,
            Topology::Split | Topology::SharedCommands => StreamKind::Stderr,
        };
        let stdout_reader = LineReader::new(
            streams.stdout,
            StreamKind::Stdout,
            StreamKind::Stdout,
            max_line_length,
        );
        let stderr_reader = LineReader::new(
            streams.stderr,
            StreamKind::Stderr,
            stderr_origin,
            max_line_length,
        );

        let (out_line_tx, out_line_rx) = mpsc::channel(capacity);
        let (err_line_tx, err_line_rx) = mpsc::channel(capacity);
        tasks.spawn(read_stream(stdout_reader, out_line_tx, StreamKind::Stdout));
        tasks.spawn(read_stream(stderr_reader, err_line_tx, StreamKind::Stderr));

        if topology.is_merged() {
            let (merged_tx, merged_rx) = mpsc::channel(capacity);
            tasks.spawn(merge(out_line_rx, err_line_rx, merged_tx));
            tasks.spawn(run_chain(
                RuleEngine::new(&self.rule_set, Arc::clone(&self.renderer)),
                merged_rx,
                stdout_tx,
                stderr_tx,
                self.control,
            ));
        } else {
            tasks.spawn(run_chain(
                RuleEngine::new(&self.rule_set, Arc::clone(&self.renderer)),
                out_line_rx,
                stdout_tx.clone(),
                stderr_tx.clone(),
                Arc::clone(&self.control),
            ));
            tasks.spawn(run_chain(
                RuleEngine::new(&self.rule_set, Arc::clone(&self.renderer)),
                err_line_rx,
                stdout_tx,
                stderr_tx,
                self.control,
            ));
        }

        let stats = join_all(tasks).await?;
        info!(
            stdout_lines = stats.stdout_lines_read,
            stderr_lines = stats.stderr_lines_read,
            evaluated = stats.lines_evaluated,
            "line pipeline finished"
        );
        Ok(stats)
    }
}

/// 모든 태스크를 기다리며 통계를 모읍니다.
///
/// 채널 에러는 다른 태스크 실패의 결과이므로 근본 원인이 도착할 때까지 보류합니다.
async fn join_all(mut tasks: JoinSet<TaskResult>) -> Result<PipelineStats, PipelineError> {
    let mut stats = PipelineStats::default();
    let mut deferred = None;

    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| PipelineError::Task(e.to_string()));
        match result.and_then(|r| r) {
            Ok(report) => stats.record(report),
            Err(e @ PipelineError::Channel(_)) => {
                debug!(error = %e, "pipeline channel closed early");
                if deferred.is_none() {
                    deferred = Some(e);
                }
            }
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    match deferred {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

async fn read_stream<R>(
    reader: LineReader<R>,
    tx: mpsc::Sender<Line>,
    stream: StreamKind,
) -> TaskResult
where
    R: AsyncRead + Unpin,
{
    let lines = reader.run(tx).await?;
    Ok(TaskReport::Read { stream, lines })
}

/// 두 리더의 라인을 도착 순서대로 하나의 큐로 합칩니다.
async fn merge(
    mut stdout_rx: mpsc::Receiver<Line>,
    mut stderr_rx: mpsc::Receiver<Line>,
    tx: mpsc::Sender<Line>,
) -> TaskResult {
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        let (stream, next) = tokio::select! {
            line = stdout_rx.recv(), if stdout_open => (StreamKind::Stdout, line),
            line = stderr_rx.recv(), if stderr_open => (StreamKind::Stderr, line),
        };
        match (stream, next) {
            (_, Some(line)) => tx
                .send(line)
                .await
                .map_err(|_| PipelineError::Channel("merged line queue closed".to_owned()))?,
            (StreamKind::Stdout, None) => stdout_open = false,
            (StreamKind::Stderr, None) => stderr_open = false,
        }
    }

    debug!("merge stage finished");
    Ok(TaskReport::Merged)
}

/// 체인 인스턴스 하나를 입력이 끝날 때까지 구동합니다.
async fn run_chain<C: ProcessControl>(
    mut engine: RuleEngine,
    mut rx: mpsc::Receiver<Line>,
    stdout_tx: mpsc::Sender<Vec<String>>,
    stderr_tx: mpsc::Sender<Vec<String>>,
    control: Arc<C>,
) -> TaskResult {
    debug!(rules = engine.rule_count(), "rule chain started");
    let mut lines = 0u64;

    while let Some(line) = rx.recv().await {
        let evaluation = engine.evaluate(line)?;
        counter!(LINES_EVALUATED_TOTAL).increment(1);
        lines += 1;

        for effect in evaluation.effects {
            apply_effect(control.as_ref(), effect).await?;
        }

        let destination = evaluation.destination;
        let tx = match destination {
            StreamKind::Stdout => &stdout_tx,
            StreamKind::Stderr => &stderr_tx,
        };
        tx.send(evaluation.fragments)
            .await
            .map_err(|_| PipelineError::Channel(format!("{destination} output queue closed")))?;

        if evaluation.close_input {
            control.close_input().await?;
        }
    }

    debug!(lines, "rule chain finished");
    Ok(TaskReport::Evaluated { lines })
}

async fn apply_effect<C: ProcessControl>(control: &C, effect: Effect) -> Result<(), PipelineError> {
    match effect {
        Effect::Signal(signal) => control.signal(signal),
        Effect::Input(text) => control.write_input(Bytes::from(text)).await,
        Effect::InputFile(path) => control.write_input_file(&path).await,
        Effect::SetExitCode(code) => {
            control.set_fixed_exit_code(code);
            Ok(())
        }
        Effect::ClearExitCode => {
            control.clear_fixed_exit_code();
            Ok(())
        }
    }
}

/// 큐의 조각을 실제 출력 스트림에 순서대로 기록합니다.
///
/// 한 라인의 조각은 한 메시지로 전달되므로 두 체인이 같은 큐에 쓰더라도 섞이지 않습니다.
async fn run_writer<W>(
    mut sink: W,
    mut rx: mpsc::Receiver<Vec<String>>,
    stream: StreamKind,
) -> TaskResult
where
    W: AsyncWrite + Unpin,
{
    debug!(%stream, "writer started");
    let output_error = |source: std::io::Error| PipelineError::Output { stream, source };
    let mut fragments = 0u64;

    while let Some(batch) = rx.recv().await {
        for fragment in &batch {
            sink.write_all(fragment.as_bytes())
                .await
                .map_err(output_error)?;
        }
        let written = batch.len() as u64;
        fragments += written;
        counter!(FRAGMENTS_WRITTEN_TOTAL, LABEL_STREAM => stream.as_str()).increment(written);

        if rx.is_empty() {
            sink.flush().await.map_err(output_error)?;
        }
    }

    sink.flush().await.map_err(output_error)?;
    debug!(%stream, fragments, "writer finished");
    Ok(TaskReport::Written { stream, fragments })
}

/// [`LinePipeline`] 빌더
pub struct LinePipelineBuilder<C> {
    rule_set: RuleSet,
    control: Arc<C>,
    renderer: Option<Arc<dyn StyleRenderer>>,
    channel_capacity: usize,
}

impl<C: ProcessControl> LinePipelineBuilder<C> {
    /// 규칙 체인과 프로세스 제어 핸들로 빌더를 생성합니다.
    pub fn new(rule_set: RuleSet, control: Arc<C>) -> Self {
        Self {
            rule_set,
            control,
            renderer: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// 스타일 렌더러를 설정합니다. 기본값은 [`AnsiRenderer`]입니다.
    pub fn renderer(mut self, renderer: Arc<dyn StyleRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// 태스크 간 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// 파이프라인을 생성합니다.
    pub fn build(self) -> Result<LinePipeline<C>, PipelineError> {
        if self.channel_capacity == 0 {
            return Err(PipelineError::Channel(
                "channel capacity must be at least 1".to_owned(),
            ));
        }

        Ok(LinePipeline {
            rule_set: self.rule_set,
            control: self.control,
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(AnsiRenderer)),
            channel_capacity: self.channel_capacity,
        })
    }
}
