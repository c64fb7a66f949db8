use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 并发执行一组future，同时运行的数量不超过max_parallels；结果顺序与输入一致
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_parallels: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(max_parallels.max(1)));

    let controlled = futures.into_iter().map(|future| {
        let semaphore = semaphore.clone();
        async move {
            // 信号量不会被关闭，acquire失败时直接执行
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(controlled).await
}
