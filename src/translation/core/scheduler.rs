//! 请求调度器
//!
//! 限制同时进行的远程翻译请求数量。许可按先来先得的顺序发放，
//! 排队长度不设上限，已排队的任务不会被取消。

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::translation::config::VocabConfig;
use crate::translation::error::TranslationResult;

/// 计数器守卫，离开作用域时减一
struct Gauge(Arc<AtomicUsize>);

impl Gauge {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Gauge {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 有界并发的请求调度器，克隆后共享同一组许可
#[derive(Clone)]
pub struct RequestScheduler {
    semaphore: Arc<Semaphore>,
    limit: usize,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl RequestScheduler {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            active: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &VocabConfig) -> Self {
        Self::new(config.max_concurrent_requests)
    }

    /// 等待许可后运行任务
    ///
    /// 任务无论成功失败都会释放许可，下一个排队的任务随即获得执行机会。
    pub async fn run_limited<F, T>(&self, task: F) -> TranslationResult<T>
    where
        F: Future<Output = T>,
    {
        let permit = {
            let _waiting = Gauge::enter(&self.queued);
            self.semaphore.acquire().await?
        };

        let _running = Gauge::enter(&self.active);
        tracing::trace!("请求已获得许可，当前并发 {}", self.active());
        let output = task.await;
        drop(permit);
        Ok(output)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 正在执行的任务数
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 等待许可的任务数
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(crate::translation::config::constants::DEFAULT_MAX_CONCURRENT_REQUESTS)
    }
}
