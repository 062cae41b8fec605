use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use super::docx::ZipDocxReader;
use super::pdf::LopdfTextLayer;
use super::types::{DocxTextReader, PdfTextLayer};
use super::NormalizeError;

/// Default bound on how long a caller waits for backend initialization.
pub const DEFAULT_EXTRACTOR_INIT_TIMEOUT_SECS: u64 = 30;

/// Loaded document extraction backends.
#[derive(Clone)]
pub struct ExtractionBackends {
    pub pdf: Arc<dyn PdfTextLayer>,
    pub docx: Arc<dyn DocxTextReader>,
}

/// Produces the extraction backends (allows mocking slow or failing loads).
#[async_trait]
pub trait ExtractorLoader: Send + Sync {
    async fn load(&self) -> Result<ExtractionBackends, String>;
}

/// Loads the built-in lopdf and zip backends on the blocking pool.
pub struct BuiltinLoader;

#[async_trait]
impl ExtractorLoader for BuiltinLoader {
    async fn load(&self) -> Result<ExtractionBackends, String> {
        tokio::task::spawn_blocking(|| ExtractionBackends {
            pdf: Arc::new(LopdfTextLayer),
            docx: Arc::new(ZipDocxReader::new()),
        })
        .await
        .map_err(|e| format!("extractor loader task failed: {e}"))
    }
}

/// Lazily initialized, process-wide extraction backends.
///
/// Concurrent first callers share one in-flight initialization. A failed or
/// timed-out initialization leaves the cell empty, so the next caller retries.
pub struct LazyExtractors {
    cell: OnceCell<ExtractionBackends>,
    loader: Arc<dyn ExtractorLoader>,
    init_timeout: Duration,
}

impl LazyExtractors {
    pub fn new(loader: Arc<dyn ExtractorLoader>, init_timeout: Duration) -> Self {
        Self {
            cell: OnceCell::new(),
            loader,
            init_timeout,
        }
    }

    pub fn builtin(init_timeout: Duration) -> Self {
        Self::new(Arc::new(BuiltinLoader), init_timeout)
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Wait for the backends, starting initialization if nobody has yet.
    pub async fn get(&self) -> Result<&ExtractionBackends, NormalizeError> {
        if let Some(backends) = self.cell.get() {
            return Ok(backends);
        }

        let init = self.cell.get_or_try_init(|| {
            let loader = Arc::clone(&self.loader);
            async move {
                tracing::info!("Initializing document extraction backends");
                loader.load().await
            }
        });

        match tokio::time::timeout(self.init_timeout, init).await {
            Ok(Ok(backends)) => Ok(backends),
            Ok(Err(reason)) => {
                tracing::warn!(error = %reason, "Extraction backend initialization failed");
                Err(NormalizeError::ExtractorNotReady(reason))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.init_timeout.as_secs_f64(),
                    "Extraction backend initialization timed out"
                );
                Err(NormalizeError::ExtractorNotReady(format!(
                    "initialization did not finish within {:?}",
                    self.init_timeout
                )))
            }
        }
    }

    /// Start initialization in the background.
    pub fn prewarm(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.get().await {
                Ok(_) => tracing::info!("Document extraction backends ready"),
                Err(e) => tracing::warn!(error = %e, "Extraction backend prewarm failed"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts loads; fails the first `failures` of them; sleeps `delay` each time.
    struct CountingLoader {
        loads: AtomicUsize,
        failures: usize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(failures: usize, delay: Duration) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                failures,
                delay,
            }
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractorLoader for CountingLoader {
        async fn load(&self) -> Result<ExtractionBackends, String> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                return Err("model files missing".into());
            }
            BuiltinLoader.load().await
        }
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_load() {
        let loader = Arc::new(CountingLoader::new(0, Duration::from_millis(50)));
        let extractors = Arc::new(LazyExtractors::new(loader.clone(), Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let extractors = Arc::clone(&extractors);
                tokio::spawn(async move { extractors.get().await.is_ok() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(loader.loads(), 1);
        assert!(extractors.is_ready());
    }

    #[tokio::test]
    async fn failed_load_is_not_ready_then_retried() {
        let loader = Arc::new(CountingLoader::new(1, Duration::ZERO));
        let extractors = LazyExtractors::new(loader.clone(), Duration::from_secs(5));

        let err = extractors.get().await.err().unwrap();
        assert!(matches!(err, NormalizeError::ExtractorNotReady(_)));
        assert!(!extractors.is_ready());

        assert!(extractors.get().await.is_ok());
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn slow_load_times_out_as_not_ready() {
        let loader = Arc::new(CountingLoader::new(0, Duration::from_secs(10)));
        let extractors = LazyExtractors::new(loader, Duration::from_millis(20));

        let err = extractors.get().await.err().unwrap();
        assert!(matches!(err, NormalizeError::ExtractorNotReady(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn prewarm_initializes_in_background() {
        let extractors = Arc::new(LazyExtractors::builtin(Duration::from_secs(5)));
        assert!(!extractors.is_ready());
        extractors.prewarm().await.unwrap();
        assert!(extractors.is_ready());
    }
}
