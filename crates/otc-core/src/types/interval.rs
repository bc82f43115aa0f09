//! 캔들 간격 정의 및 정규화.
//!
//! 지원 간격은 `1m`, `5m`, `15m`, `30m`, `1h` 입니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// 캔들 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
}

impl Interval {
    /// 지원하는 모든 간격.
    pub const ALL: [Interval; 5] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
    ];

    /// 초 단위 길이.
    pub fn as_secs(&self) -> i64 {
        match self {
            Interval::M1 => 60,
            Interval::M5 => 5 * 60,
            Interval::M15 => 15 * 60,
            Interval::M30 => 30 * 60,
            Interval::H1 => 60 * 60,
        }
    }

    /// 표준 간격 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
        }
    }

    /// 주어진 시각(초)이 속한 봉의 시작 시각.
    pub fn floor(&self, epoch_secs: i64) -> i64 {
        epoch_secs.div_euclid(self.as_secs()) * self.as_secs()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            "1h" | "60m" => Ok(Interval::H1),
            _ => Err(FetchError::InvalidInterval(format!(
                "unsupported interval '{}', expected one of 1m, 5m, 15m, 30m, 1h",
                s.trim().chars().take(16).collect::<String>()
            ))),
        }
    }
}

/// 간격 정규화 정책.
///
/// `fallback`이 설정되면 인식할 수 없는 간격을 에러 대신 대체합니다.
/// 기본값은 대체 없음입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    pub default: Interval,
    pub fallback: Option<Interval>,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            default: Interval::M1,
            fallback: None,
        }
    }
}

impl IntervalPolicy {
    /// 간격 문자열을 정규화합니다.
    ///
    /// 입력이 없거나 공백이면 기본 간격을 사용합니다.
    pub fn normalize_interval(&self, raw: Option<&str>) -> Result<Interval, FetchError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(self.default),
            Some(raw) => raw,
        };

        match raw.parse::<Interval>() {
            Ok(interval) => Ok(interval),
            Err(err) => match self.fallback {
                Some(fallback) => {
                    tracing::debug!(raw, fallback = %fallback, "Unrecognised interval, using fallback");
                    Ok(fallback)
                }
                None => Err(err),
            },
        }
    }
}
