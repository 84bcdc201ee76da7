use std::any::{Any, type_name};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use thiserror::Error;

/// 失败来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 方法体 panic（assert! / assert_eq! 等）
    Panic,
    /// 方法体返回了 Err
    Error,
}

/// 一次调用失败的真正原因
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// panic 位置或错误链，可能附带 backtrace
    pub trace: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace,
        }
    }

    /// 从方法体返回的错误构造
    pub fn from_error(err: anyhow::Error) -> Self {
        let backtrace = err.backtrace();
        let trace = if backtrace.status() == BacktraceStatus::Captured {
            Some(backtrace.to_string())
        } else {
            let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
            if causes.is_empty() {
                None
            } else {
                Some(format!("caused by: {}", causes.join(": ")))
            }
        };

        Self::new(FailureKind::Error, err.to_string(), trace)
    }

    /// 从 panic payload 构造
    fn from_panic(payload: &(dyn Any + Send), site: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panicked with a non-string payload".to_string()
        };

        Self::new(FailureKind::Panic, message, site)
    }
}

/// 调用机制本身的包装错误
///
/// `Raised` 包着方法体抛出的真正原因，`TargetMismatch` 没有内层原因。
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("invocation of `{method}` raised a failure")]
    Raised {
        method: String,
        #[source]
        cause: Failure,
    },

    #[error("target of `{method}` is not a `{expected}`")]
    TargetMismatch {
        method: String,
        expected: &'static str,
    },
}

impl InvocationError {
    pub(crate) fn mismatch<T>(method: &str) -> Self {
        InvocationError::TargetMismatch {
            method: method.to_string(),
            expected: type_name::<T>(),
        }
    }

    pub fn method(&self) -> &str {
        match self {
            InvocationError::Raised { method, .. } => method,
            InvocationError::TargetMismatch { method, .. } => method,
        }
    }

    /// 剥掉一层包装，返回真正的失败原因
    pub fn inner(&self) -> Option<&Failure> {
        match self {
            InvocationError::Raised { cause, .. } => Some(cause),
            InvocationError::TargetMismatch { .. } => None,
        }
    }
}

/// 方法体返回值到执行结果的转换：支持 `()` 和 `Result<(), E>`
pub trait IntoOutcome {
    fn into_outcome(self) -> anyhow::Result<()>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> IntoOutcome for Result<(), E> {
    fn into_outcome(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

thread_local! {
    static CAPTURE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PANIC_SITE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// 安装一次全局 panic hook。
/// 只有处于 `catch_failure` 中的线程会被截获，其它线程仍走原来的 hook。
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURE_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }

            let mut site = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                let _ = write!(site, "\n{}", backtrace);
            }
            PANIC_SITE.with(|s| *s.borrow_mut() = Some(site));
        }));
    });
}

/// 在失败边界内执行 `f`，panic 转成 `Failure`
pub fn catch_failure<R>(f: impl FnOnce() -> R) -> Result<R, Failure> {
    install_hook();

    // resume_unwind 不经过 hook，旧位置不能留到这次
    PANIC_SITE.with(|s| s.borrow_mut().take());
    CAPTURE_DEPTH.with(|d| d.set(d.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURE_DEPTH.with(|d| d.set(d.get() - 1));

    result.map_err(|payload| {
        let site = PANIC_SITE.with(|s| s.borrow_mut().take());
        Failure::from_panic(payload.as_ref(), site)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_failure_passes_value_through() {
        assert_eq!(catch_failure(|| 41 + 1).unwrap(), 42);
    }

    #[test]
    fn test_catch_failure_captures_panic_message_and_location() {
        let failure = catch_failure::<()>(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "boom 7");
        assert!(failure.trace.unwrap().contains("invoke.rs"));
    }

    #[test]
    fn test_catch_failure_static_str_payload() {
        let failure = catch_failure::<()>(|| std::panic::panic_any("static")).unwrap_err();
        assert_eq!(failure.message, "static");
    }

    #[test]
    fn test_resumed_unwind_does_not_reuse_stale_location() {
        // 方法体自己吞掉的 panic 也会经过 hook
        catch_failure(|| {
            let _ = std::panic::catch_unwind(|| panic!("inner caught"));
        })
        .unwrap();

        let failure =
            catch_failure::<()>(|| std::panic::resume_unwind(Box::new("resumed"))).unwrap_err();
        assert_eq!(failure.message, "resumed");
        assert!(failure.trace.is_none());
    }

    #[test]
    fn test_failure_from_error_with_context() {
        let err = anyhow::anyhow!("disk full").context("writing report");
        let failure = Failure::from_error(err);
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "writing report");
    }

    #[test]
    fn test_invocation_error_inner() {
        let raised = InvocationError::Raised {
            method: "m".to_string(),
            cause: Failure::new(FailureKind::Error, "bad", None),
        };
        assert_eq!(raised.inner().unwrap().message, "bad");

        let mismatch = InvocationError::mismatch::<String>("m");
        assert!(mismatch.inner().is_none());
        assert_eq!(mismatch.method(), "m");
    }
}
