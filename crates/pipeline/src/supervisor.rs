//! 프로세스 감독 -- 자식 프로세스 핸들과 규칙 엔진 부수 효과의 실행 창구
//!
//! [`ProcessSupervisor`]는 자식을 실행하고 종료를 기다리며,
//! [`SupervisorHandle`]은 규칙 엔진 쪽에 [`ProcessControl`]을 제공합니다.
//!
//! # stdin 처리
//! 입력 주입이 필요한 규칙이 있을 때만 stdin을 파이프로 연결하고,
//! 전용 writer 태스크가 bounded 채널로 받은 바이트를 순서대로 씁니다.
//! 닫기 요청은 한 번만 전달되며, 그 전에 큐에 들어간 입력이 먼저 기록됩니다.

use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use bytes::Bytes;
use metrics::counter;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tea_core::metrics::SIGNALS_SENT_TOTAL;

use crate::error::PipelineError;
use crate::pipeline::ChildStreams;
use crate::signal::Signal;

/// stdin writer 큐 용량
const INPUT_QUEUE_CAPACITY: usize = 16;

/// 고정 종료 코드 미설정 표시
const UNSET: i32 = -1;

/// 모든 체인 인스턴스가 공유하는 고정 종료 코드
///
/// 마지막 쓰기가 이기는 단일 스칼라이므로 원자 변수 하나로 충분합니다.
#[derive(Debug)]
pub struct FixedExitCode(AtomicI32);

impl FixedExitCode {
    /// 미설정 상태로 생성합니다.
    pub fn new() -> Self {
        Self(AtomicI32::new(UNSET))
    }

    /// 종료 코드를 고정합니다.
    pub fn set(&self, code: u8) {
        self.0.store(i32::from(code), Ordering::SeqCst);
    }

    /// 고정을 해제합니다.
    pub fn clear(&self) {
        self.0.store(UNSET, Ordering::SeqCst);
    }

    /// 현재 고정된 종료 코드를 반환합니다.
    pub fn get(&self) -> Option<u8> {
        u8::try_from(self.0.load(Ordering::SeqCst)).ok()
    }
}

impl Default for FixedExitCode {
    fn default() -> Self {
        Self::new()
    }
}

/// 규칙 엔진이 자식 프로세스에 대해 수행할 수 있는 조작
///
/// 테스트에서는 호출을 기록하는 구현으로 대체합니다.
pub trait ProcessControl: Send + Sync + 'static {
    /// 자식에게 시그널을 보냅니다. 실패는 치명적입니다.
    fn signal(&self, signal: Signal) -> Result<(), PipelineError>;

    /// 자식 stdin에 바이트를 씁니다 (큐에 넣음).
    fn write_input(&self, data: Bytes) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// 파일 내용을 자식 stdin에 씁니다.
    fn write_input_file(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// 자식 stdin을 닫습니다. 두 번째 호출부터는 아무 일도 하지 않습니다.
    fn close_input(&self) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// 최종 종료 코드를 고정합니다.
    fn set_fixed_exit_code(&self, code: u8);

    /// 고정 종료 코드를 해제합니다.
    fn clear_fixed_exit_code(&self);
}

/// stdin writer 태스크로 보내는 명령
#[derive(Debug)]
enum InputCommand {
    Bytes(Bytes),
    Close,
}

/// 규칙 엔진에 넘기는 감독자 핸들
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    pid: u32,
    input_tx: Option<mpsc::Sender<InputCommand>>,
    input_closed: Arc<AtomicBool>,
    exit_code: Arc<FixedExitCode>,
}

impl SupervisorHandle {
    /// 자식 프로세스 ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 현재 고정된 종료 코드
    pub fn fixed_exit_code(&self) -> Option<u8> {
        self.exit_code.get()
    }

    async fn enqueue(&self, data: Bytes) -> Result<(), PipelineError> {
        let Some(tx) = &self.input_tx else {
            return Err(PipelineError::Input(
                "child stdin is not connected".to_owned(),
            ));
        };
        if self.input_closed.load(Ordering::SeqCst) {
            warn!(bytes = data.len(), "child stdin already closed, dropping input");
            return Ok(());
        }
        if tx.send(InputCommand::Bytes(data)).await.is_err() {
            debug!("stdin writer stopped, dropping input");
        }
        Ok(())
    }
}

impl ProcessControl for SupervisorHandle {
    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> Result<(), PipelineError> {
        signal
            .send(self.pid)
            .map_err(|source| PipelineError::Signal {
                signal: signal.to_string(),
                pid: self.pid,
                source,
            })?;
        counter!(SIGNALS_SENT_TOTAL).increment(1);
        info!(pid = self.pid, %signal, "signal delivered to child");
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal(&self, signal: Signal) -> Result<(), PipelineError> {
        Err(PipelineError::Signal {
            signal: signal.to_string(),
            pid: self.pid,
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }

    async fn write_input(&self, data: Bytes) -> Result<(), PipelineError> {
        info!(bytes = data.len(), "injecting input into child");
        self.enqueue(data).await
    }

    async fn write_input_file(&self, path: &Path) -> Result<(), PipelineError> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::Input(format!("failed to read input file {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), bytes = content.len(), "injecting input file into child");
        self.enqueue(Bytes::from(content)).await
    }

    async fn close_input(&self) -> Result<(), PipelineError> {
        if self.input_closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(tx) = &self.input_tx else {
            return Err(PipelineError::Input(
                "child stdin is not connected".to_owned(),
            ));
        };
        info!("closing child stdin");
        if tx.send(InputCommand::Close).await.is_err() {
            debug!("stdin writer already stopped");
        }
        Ok(())
    }

    fn set_fixed_exit_code(&self, code: u8) {
        info!(code, "fixing final exit code");
        self.exit_code.set(code);
    }

    fn clear_fixed_exit_code(&self) {
        info!("clearing fixed exit code");
        self.exit_code.clear();
    }
}

/// 자식 프로세스의 최종 결과
#[derive(Debug, Clone, Copy)]
pub struct ExitOutcome {
    /// 자식의 종료 상태
    pub status: ExitStatus,
    /// 규칙으로 고정된 종료 코드
    pub fixed: Option<u8>,
}

impl ExitOutcome {
    /// 프로세스가 반환할 종료 코드를 계산합니다.
    ///
    /// 고정 코드 → 자식의 종료 코드 → 128 + 시그널 번호 → 1 순서로 결정합니다.
    pub fn code(&self) -> i32 {
        if let Some(code) = self.fixed {
            return i32::from(code);
        }
        if let Some(code) = self.status.code() {
            return code;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.status.signal() {
                return 128 + signal;
            }
        }
        1
    }
}

/// 자식 프로세스 감독자
pub struct ProcessSupervisor {
    child: Child,
    handle: SupervisorHandle,
    stdin_task: Option<JoinHandle<Result<(), PipelineError>>>,
}

impl ProcessSupervisor {
    /// 자식 프로세스를 실행합니다.
    ///
    /// stdout/stderr는 항상 파이프로 연결하고, stdin은 `needs_input`일 때만 파이프로,
    /// 아니면 부모의 stdin을 물려줍니다.
    pub fn spawn(
        mut command: Command,
        needs_input: bool,
    ) -> Result<(Self, ChildStreams<ChildStdout, ChildStderr>), PipelineError> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if needs_input {
                Stdio::piped()
            } else {
                Stdio::inherit()
            });

        let mut child = command.spawn().map_err(|source| PipelineError::Spawn {
            program: program.clone(),
            source,
        })?;

        let pid = child.id().ok_or_else(|| PipelineError::Spawn {
            program: program.clone(),
            source: std::io::Error::other("child exited before its pid was read"),
        })?;

        let missing = |what: &str| PipelineError::Spawn {
            program: program.clone(),
            source: std::io::Error::other(format!("failed to capture child {what}")),
        };
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (input_tx, stdin_task) = match child.stdin.take() {
            Some(stdin) => {
                let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
                (Some(tx), Some(tokio::spawn(stdin_writer(stdin, rx))))
            }
            None => (None, None),
        };

        info!(pid, %program, needs_input, "child process started");

        let handle = SupervisorHandle {
            pid,
            input_tx,
            input_closed: Arc::new(AtomicBool::new(false)),
            exit_code: Arc::new(FixedExitCode::new()),
        };

        Ok((
            Self {
                child,
                handle,
                stdin_task,
            },
            ChildStreams { stdout, stderr },
        ))
    }

    /// 규칙 엔진에 넘길 핸들을 반환합니다.
    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    /// 자식 프로세스 ID
    pub fn pid(&self) -> u32 {
        self.handle.pid
    }

    /// 자식 종료를 기다린 뒤 stdin writer를 정리하고 최종 결과를 반환합니다.
    pub async fn wait(mut self) -> Result<ExitOutcome, PipelineError> {
        let status = self.child.wait().await?;
        debug!(pid = self.handle.pid, %status, "child process exited");

        if let Some(task) = self.stdin_task.take() {
            if self.handle.input_tx.is_some() {
                self.handle.close_input().await?;
            }
            task.await
                .map_err(|e| PipelineError::Task(format!("stdin writer: {e}")))??;
        }

        let outcome = ExitOutcome {
            status,
            fixed: self.handle.exit_code.get(),
        };
        info!(code = outcome.code(), "final exit status resolved");
        Ok(outcome)
    }
}

async fn stdin_writer(
    mut stdin: ChildStdin,
    mut rx: mpsc::Receiver<InputCommand>,
) -> Result<(), PipelineError> {
    debug!("stdin writer started");
    while let Some(command) = rx.recv().await {
        match command {
            InputCommand::Bytes(data) => {
                let result = match stdin.write_all(&data).await {
                    Ok(()) => stdin.flush().await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        warn!("child stdin closed by the child, stopping input forwarding");
                        return Ok(());
                    }
                    Err(e) => {
                        return Err(PipelineError::Input(format!(
                            "failed to write to child stdin: {e}"
                        )));
                    }
                }
            }
            InputCommand::Close => break,
        }
    }
    drop(stdin);
    debug!("stdin writer finished");
    Ok(())
}
