use log::warn;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Execute a future until it succeeds, sleeping a fixed delay between
/// attempts. This never gives up: it is for startup work the agent cannot
/// run without, such as establishing the database connection.
pub async fn retry_indefinitely<F, Fut, T, E>(operation: F, delay: Duration, context: &str) -> T
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempts: u64 = 0;

    loop {
        match operation().await {
            Ok(value) => return value,
            Err(err) => {
                attempts += 1;
                warn!(
                    "{} (attempt {}): {}. Retrying in {:?}",
                    context, attempts, err, delay
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicUsize::new(0);
        let value = retry_indefinitely(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(7)
            },
            Duration::from_millis(1),
            "op",
        )
        .await;

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keeps_trying_until_success() {
        let calls = AtomicUsize::new(0);
        let value = retry_indefinitely(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(std::io::Error::other("still down"))
                } else {
                    Ok(n)
                }
            },
            Duration::from_millis(1),
            "connect",
        )
        .await;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
