pub mod webdriver;

use std::panic::AssertUnwindSafe;
use std::time::Duration;
use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use crate::error::Result;

/// A live page in an isolated browser session.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Resolves once `selector` matches an element attached to the document,
    /// visible or not.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Runs `script` as a function body in the page with `args` bound to
    /// `arguments` and returns its JSON result.
    async fn evaluate(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Tears the session down. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Launches browser sessions.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;
}

/// Work performed against one page session.
#[async_trait]
pub trait PageTask: Send + Sync {
    type Output: Send;

    async fn run(&self, session: &mut dyn PageSession) -> Result<Self::Output>;
}

/// Launch a session, run `task` and close the session on every exit path.
///
/// A close failure is logged and does not mask the task's own result. A
/// panic inside the task is re-raised after teardown.
pub async fn with_session<T: PageTask>(driver: &dyn PageDriver, task: &T) -> Result<T::Output> {
    let mut session = driver.launch().await?;

    let outcome = AssertUnwindSafe(task.run(session.as_mut()))
        .catch_unwind()
        .await;

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Browser session teardown failed");
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use super::*;
    use crate::error::Error;

    /// Scripted page behaviour for one launched session.
    #[derive(Clone, Debug)]
    pub enum FakePage {
        Ready(Value),
        NeverReady,
        LaunchFails,
        Panics,
    }

    /// Driver that hands out sessions following a script and counts launches
    /// and closes.
    #[derive(Clone)]
    pub struct FakeDriver {
        pages: Arc<std::sync::Mutex<Vec<FakePage>>>,
        pub launches: Arc<AtomicUsize>,
        pub closes: Arc<AtomicUsize>,
    }

    impl FakeDriver {
        /// Pages are served in order; the last one repeats.
        pub fn new(pages: Vec<FakePage>) -> Self {
            FakeDriver {
                pages: Arc::new(std::sync::Mutex::new(pages)),
                launches: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn launch_count(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    struct FakeSession {
        page: FakePage,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
            match self.page {
                FakePage::NeverReady => Err(Error::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
                _ => Ok(()),
            }
        }

        async fn evaluate(&mut self, _script: &str, _args: Vec<Value>) -> Result<Value> {
            match &self.page {
                FakePage::Ready(value) => Ok(value.clone()),
                FakePage::Panics => panic!("page script crashed"),
                _ => Err(Error::Evaluation("no page".to_string())),
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn launch(&self) -> Result<Box<dyn PageSession>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let page = {
                let mut pages = self.pages.lock().unwrap();
                if pages.len() > 1 { pages.remove(0) } else { pages[0].clone() }
            };
            if matches!(page, FakePage::LaunchFails) {
                return Err(Error::BrowserLaunch("chrome not found".to_string()));
            }
            Ok(Box::new(FakeSession { page, closes: self.closes.clone() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeDriver, FakePage};
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct ReadTitle;

    #[async_trait]
    impl PageTask for ReadTitle {
        type Output = Value;

        async fn run(&self, session: &mut dyn PageSession) -> Result<Value> {
            session.navigate("https://example.test", Duration::from_secs(1)).await?;
            session.wait_for_selector("title", Duration::from_secs(1)).await?;
            session.evaluate("return document.title;", vec![]).await
        }
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let driver = FakeDriver::new(vec![FakePage::Ready(json!("hello"))]);

        let value = with_session(&driver, &ReadTitle).await.unwrap();

        assert_eq!(value, json!("hello"));
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_failure() {
        let driver = FakeDriver::new(vec![FakePage::NeverReady]);

        let result = with_session(&driver, &ReadTitle).await;

        assert!(matches!(result, Err(Error::SelectorTimeout { .. })));
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_panic() {
        let driver = FakeDriver::new(vec![FakePage::Panics]);
        let closes = driver.closes.clone();

        let handle = tokio::spawn(async move { with_session(&driver, &ReadTitle).await });

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_has_nothing_to_close() {
        let driver = FakeDriver::new(vec![FakePage::LaunchFails]);

        assert!(matches!(with_session(&driver, &ReadTitle).await, Err(Error::BrowserLaunch(_))));
        assert_eq!(driver.close_count(), 0);
    }
}
