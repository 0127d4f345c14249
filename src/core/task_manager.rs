use std::future::Future;

use tokio::task::JoinHandle;

/// Spawn a background task that logs when it finishes
pub fn spawn_task<F>(label: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let label = label.into();
    tokio::task::spawn(async move {
        future.await;
        log::debug!("Task {label} finished");
    })
}
