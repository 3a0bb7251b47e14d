//! # tea-pipeline
//!
//! 자식 프로세스의 stdout/stderr를 라인 단위로 읽어 규칙 체인으로 변형한 뒤
//! 실제 출력 스트림에 기록하는 라인 파이프라인입니다.
//!
//! # 모듈 구성
//!
//! - [`reader`]: 바이트 스트림을 라인으로 분할 (`tokio_util` codec)
//! - [`rule`]: 규칙 모델과 컴파일러 (검증, 이름 → 서수 해석)
//! - [`engine`]: 체인 인스턴스 하나로 라인을 평가하는 규칙 엔진
//! - [`style`]: ANSI 스타일 렌더링
//! - [`signal`]: 시그널 이름/번호 테이블
//! - [`supervisor`]: 자식 프로세스 실행, stdin 주입, 종료 코드 결정
//! - [`pipeline`]: 토폴로지별 태스크 연결 및 종료 순서 관리
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! child stdout/stderr -> LineReader -> [merge] -> RuleEngine -> queues -> Writers
//!                                                     |
//!                                              ProcessControl (signal, stdin, exit code)
//! ```

pub mod engine;
pub mod error;
pub mod line;
pub mod pipeline;
pub mod reader;
pub mod rule;
pub mod signal;
pub mod style;
pub mod supervisor;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{
    ChildStreams, DEFAULT_CHANNEL_CAPACITY, LinePipeline, LinePipelineBuilder, OutputSinks,
    PipelineStats,
};

// 규칙
pub use engine::{Effect, Evaluation, RuleEngine};
pub use rule::{ChainSettings, RuleSet};

// 입출력
pub use line::Line;
pub use reader::{LineDecoder, LineReader};
pub use style::{AnsiRenderer, PlainRenderer, Style, StyleRenderer};

// 프로세스
pub use signal::Signal;
pub use supervisor::{ExitOutcome, FixedExitCode, ProcessControl, ProcessSupervisor, SupervisorHandle};

// 에러
pub use error::PipelineError;
