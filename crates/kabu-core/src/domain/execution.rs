//! 배치 실행 상태.
//!
//! 메모리 집계와 영속 레코드가 같은 상태 문자열을 사용하도록 공유합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 배치 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// 생성됨, 아직 시작 전
    Pending,
    /// 실행 중
    Running,
    /// 일시정지
    Paused,
    /// 모든 작업 성공
    Completed,
    /// 하나 이상 실패 또는 중단
    Failed,
    /// 취소됨
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    /// 종료 상태인지 확인합니다. 종료 상태에서는 더 이상 전이하지 않습니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// 상태 전이 허용 여부.
    ///
    /// - Pending → Running | Cancelled
    /// - Running → Paused | Completed | Failed | Cancelled
    /// - Paused → Running | Completed | Failed | Cancelled
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Completed)
                | (Paused, Failed)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "paused" => Ok(ExecutionStatus::Paused),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "cancelled" => Ok(ExecutionStatus::Cancelled),
            _ => Err(format!("Unknown execution status: {}", s)),
        }
    }
}

/// 종목별 상세 레코드 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DetailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailStatus::Pending => "pending",
            DetailStatus::Processing => "processing",
            DetailStatus::Completed => "completed",
            DetailStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_never_reenter_running() {
        for status in [
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(!status.can_transition_to(ExecutionStatus::Running));
            assert!(!status.can_transition_to(ExecutionStatus::Paused));
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Paused));
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Paused));
        assert!(ExecutionStatus::Paused.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Completed));
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!("RUNNING".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Running);
        assert_eq!(ExecutionStatus::Cancelled.to_string(), "cancelled");
        assert!("done".parse::<ExecutionStatus>().is_err());
    }
}
