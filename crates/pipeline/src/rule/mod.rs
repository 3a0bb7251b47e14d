//! 규칙 체인 -- 라인 변형 규칙의 모델과 컴파일러
//!
//! 규칙은 `tea.toml`의 `[[rules]]` 항목에서 정의 순서대로 만들어집니다.
//!
//! # 규칙 형식
//! ```toml
//! [[rules]]
//! name = "errors"
//! patterns = ["ERROR", "FATAL"]
//! match = "any"
//! prefix = "[ERR] "
//! send_to = "stderr"
//! style = { fg = "red", attributes = ["bold"] }
//! ```
//!
//! # 아키텍처
//! - [`compiler`]: 설정 검증 및 이름 → 서수 해석, [`RuleSet`] 생성
//! - [`matcher`]: 조건 평가 (negate/any/all)
//! - [`types`]: 컴파일된 규칙 데이터 구조

pub mod compiler;
pub mod matcher;
pub mod types;

pub use compiler::{ChainSettings, RuleSet};
pub use types::{ActionSet, Condition, ControlFlow, ExitCodeAction, LineScope, Rule};
