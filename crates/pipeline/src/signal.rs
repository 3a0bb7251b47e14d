//! 시그널 해석
//!
//! 규칙의 `signal` 액션은 이름(`TERM`, `SIGTERM`) 또는 번호로 지정됩니다.
//! 컴파일 단계에서 [`Signal`]로 해석되어 런타임에는 번호만 사용합니다.
//!
//! 이름과 번호는 플랫폼이 정의한 전체 시그널 집합(`nix::sys::signal::Signal`)을 따릅니다.
//! Linux에서는 실시간 시그널도 번호 또는 `RTMIN+n` / `RTMAX-n` 형태로 허용합니다.

use std::fmt;

use tea_core::config::SignalSpec;

#[cfg(unix)]
use nix::sys::signal::Signal as NixSignal;

/// 해석된 OS 시그널
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(i32);

impl Signal {
    /// 이름으로 시그널을 찾습니다. `SIG` 접두사와 대소문자는 무시합니다.
    #[cfg(unix)]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        if let Ok(signal) = format!("SIG{bare}").parse::<NixSignal>() {
            return Some(Self(signal as i32));
        }
        realtime::from_name(bare).map(Self)
    }

    #[cfg(not(unix))]
    pub fn from_name(_name: &str) -> Option<Self> {
        None
    }

    /// 번호로 시그널을 찾습니다. 플랫폼에 정의된 번호만 허용합니다.
    #[cfg(unix)]
    pub fn from_number(number: i32) -> Option<Self> {
        if NixSignal::try_from(number).is_ok() || realtime::contains(number) {
            Some(Self(number))
        } else {
            None
        }
    }

    #[cfg(not(unix))]
    pub fn from_number(_number: i32) -> Option<Self> {
        None
    }

    /// 설정값을 해석합니다.
    pub fn resolve(spec: &SignalSpec) -> Option<Self> {
        match spec {
            SignalSpec::Number(n) => Self::from_number(*n),
            SignalSpec::Name(name) => match name.trim().parse::<i32>() {
                Ok(n) => Self::from_number(n),
                Err(_) => Self::from_name(name),
            },
        }
    }

    /// 시그널 번호
    pub fn number(&self) -> i32 {
        self.0
    }

    /// `SIG` 접두사를 뺀 이름 (실시간 시그널은 None)
    #[cfg(unix)]
    pub fn name(&self) -> Option<&'static str> {
        NixSignal::try_from(self.0)
            .ok()
            .map(|s| s.as_str().trim_start_matches("SIG"))
    }

    #[cfg(not(unix))]
    pub fn name(&self) -> Option<&'static str> {
        None
    }

    /// 이름이 있는 모든 시그널을 번호 순으로 반환합니다.
    #[cfg(unix)]
    pub fn all() -> Vec<(&'static str, i32)> {
        let mut all: Vec<(&'static str, i32)> = NixSignal::iterator()
            .map(|s| (s.as_str().trim_start_matches("SIG"), s as i32))
            .collect();
        all.sort_by_key(|(_, num)| *num);
        all
    }

    #[cfg(not(unix))]
    pub fn all() -> Vec<(&'static str, i32)> {
        Vec::new()
    }

    /// 프로세스에 시그널을 보냅니다.
    #[cfg(unix)]
    pub(crate) fn send(&self, pid: u32) -> std::io::Result<()> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let pid = i32::try_from(pid)
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
        match NixSignal::try_from(self.0) {
            Ok(signal) => kill(Pid::from_raw(pid), signal).map_err(std::io::Error::from),
            Err(_) => realtime::send(pid, self.0),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return write!(f, "SIG{name}");
        }
        #[cfg(unix)]
        if let Some(offset) = realtime::offset(self.0) {
            return write!(f, "SIGRTMIN+{offset}");
        }
        write!(f, "signal {}", self.0)
    }
}

/// 실시간 시그널 (`SIGRTMIN..=SIGRTMAX`)
///
/// `nix`의 `Signal` 열거형에는 실시간 시그널이 없으므로 번호로 직접 다룹니다.
#[cfg(all(unix, any(target_os = "linux", target_os = "android")))]
mod realtime {
    fn bounds() -> (i32, i32) {
        (libc::SIGRTMIN(), libc::SIGRTMAX())
    }

    pub(super) fn contains(number: i32) -> bool {
        let (min, max) = bounds();
        (min..=max).contains(&number)
    }

    pub(super) fn offset(number: i32) -> Option<i32> {
        contains(number).then(|| number - bounds().0)
    }

    /// `RTMIN`, `RTMIN+n`, `RTMAX`, `RTMAX-n`
    pub(super) fn from_name(bare: &str) -> Option<i32> {
        let (min, max) = bounds();
        let number = if let Some(rest) = bare.strip_prefix("RTMIN") {
            match rest.strip_prefix('+') {
                Some(n) => min.checked_add(n.parse().ok()?)?,
                None if rest.is_empty() => min,
                None => return None,
            }
        } else if let Some(rest) = bare.strip_prefix("RTMAX") {
            match rest.strip_prefix('-') {
                Some(n) => max.checked_sub(n.parse().ok()?)?,
                None if rest.is_empty() => max,
                None => return None,
            }
        } else {
            return None;
        };
        contains(number).then_some(number)
    }

    pub(super) fn send(pid: i32, number: i32) -> std::io::Result<()> {
        // SAFETY: kill(2)은 메모리 안전성에 영향을 주지 않는 시스템 콜입니다.
        if unsafe { libc::kill(pid, number) } == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
mod realtime {
    pub(super) fn contains(_number: i32) -> bool {
        false
    }

    pub(super) fn offset(_number: i32) -> Option<i32> {
        None
    }

    pub(super) fn from_name(_bare: &str) -> Option<i32> {
        None
    }

    pub(super) fn send(_pid: i32, _number: i32) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }
}
