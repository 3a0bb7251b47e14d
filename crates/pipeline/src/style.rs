//! 출력 스타일 렌더링
//!
//! 규칙 엔진은 [`StyleRenderer`]를 "텍스트에 스타일 적용" 기능으로만 사용합니다.
//! - [`AnsiRenderer`]: `colored` 크레이트 기반 ANSI 이스케이프 출력
//! - [`PlainRenderer`]: 스타일을 무시하고 텍스트를 그대로 반환

use colored::{ColoredString, Colorize};

use tea_core::config::StyleConfig;
use tea_core::types::{Color, TextAttribute};

/// 컴파일된 출력 스타일
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    /// 전경색
    pub fg: Option<Color>,
    /// 배경색
    pub bg: Option<Color>,
    /// 텍스트 속성
    pub attributes: Vec<TextAttribute>,
}

impl Style {
    /// 아무 효과도 없는 스타일인지 확인합니다.
    pub fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.attributes.is_empty()
    }
}

impl From<&StyleConfig> for Style {
    fn from(config: &StyleConfig) -> Self {
        Self {
            fg: config.fg,
            bg: config.bg,
            attributes: config.attributes.clone(),
        }
    }
}

/// 텍스트에 스타일을 적용하는 기능
///
/// 스타일이 `None`이면 항등 함수여야 합니다.
pub trait StyleRenderer: Send + Sync {
    /// 텍스트를 스타일이 적용된 문자열로 변환합니다.
    fn render(&self, text: &str, style: Option<&Style>) -> String;
}

/// ANSI 렌더러
///
/// `colored::control::set_override`로 전역 색상 정책을 따릅니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiRenderer;

impl StyleRenderer for AnsiRenderer {
    fn render(&self, text: &str, style: Option<&Style>) -> String {
        let Some(style) = style else {
            return text.to_owned();
        };
        if style.is_plain() || text.is_empty() {
            return text.to_owned();
        }

        let mut styled: ColoredString = text.normal();
        if let Some(fg) = style.fg {
            styled = styled.color(to_colored(fg));
        }
        if let Some(bg) = style.bg {
            styled = styled.on_color(to_colored(bg));
        }
        for attr in &style.attributes {
            styled = match attr {
                TextAttribute::Bold => styled.bold(),
                TextAttribute::Faint => styled.dimmed(),
                TextAttribute::Italic => styled.italic(),
                TextAttribute::Underline => styled.underline(),
                TextAttribute::Blink => styled.blink(),
                TextAttribute::Reversed => styled.reversed(),
            };
        }
        styled.to_string()
    }
}

/// 스타일을 적용하지 않는 렌더러
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl StyleRenderer for PlainRenderer {
    fn render(&self, text: &str, _style: Option<&Style>) -> String {
        text.to_owned()
    }
}

fn to_colored(color: Color) -> colored::Color {
    match color {
        Color::Black => colored::Color::Black,
        Color::Red => colored::Color::Red,
        Color::Green => colored::Color::Green,
        Color::Yellow => colored::Color::Yellow,
        Color::Blue => colored::Color::Blue,
        Color::Magenta => colored::Color::Magenta,
        Color::Cyan => colored::Color::Cyan,
        Color::White => colored::Color::White,
        Color::HiBlack => colored::Color::BrightBlack,
        Color::HiRed => colored::Color::BrightRed,
        Color::HiGreen => colored::Color::BrightGreen,
        Color::HiYellow => colored::Color::BrightYellow,
        Color::HiBlue => colored::Color::BrightBlue,
        Color::HiMagenta => colored::Color::BrightMagenta,
        Color::HiCyan => colored::Color::BrightCyan,
        Color::HiWhite => colored::Color::BrightWhite,
    }
}
