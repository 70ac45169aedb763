//! Listener-triggered conversion.
//!
//! Binds a TCP listener and starts the conversion as soon as the listener is
//! ready. The listener serves no routes: every request gets a `404` until
//! the process is interrupted.

use crate::{
    error::{Error, Result},
    pipeline::{Pipeline, PipelineStats},
};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, error, info, trace, warn};

const NOT_FOUND: &[u8] =
    b"HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\ncontent-length: 9\r\nconnection: close\r\n\r\nNot Found";

/// A bound listener that kicks off one conversion.
pub struct Trigger {
    listener: TcpListener,
}

impl Trigger {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind {addr}: {e}")))?;
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::config(format!("Listener has no local address: {e}")))
    }

    /// Runs `pipeline` while answering connections, then keeps listening
    /// until the first `shutdown` future resolves.
    ///
    /// If that happens before the conversion is done, the listener closes and
    /// the conversion is awaited. A second `shutdown` abandons it.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error if the conversion fails, or
    /// [`Error::Interrupted`] if it was abandoned. The listener stays up after
    /// a failure until `shutdown` resolves.
    pub async fn serve<S, F>(self, pipeline: Pipeline, mut shutdown: S) -> Result<PipelineStats>
    where
        S: FnMut() -> F,
        F: std::future::Future<Output = ()>,
    {
        info!("Listening on {} - converting sql to csv", self.local_addr()?);

        let conversion = pipeline.run();
        tokio::pin!(conversion);
        let first = shutdown();
        tokio::pin!(first);

        let mut outcome = None;
        loop {
            tokio::select! {
                result = &mut conversion, if outcome.is_none() => {
                    if let Err(ref e) = result {
                        error!("Conversion failed: {}", e);
                    }
                    outcome = Some(result);
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection from {}", peer);
                        tokio::spawn(reject(stream));
                    }
                    Err(e) => error!("Accept error: {}", e),
                },
                () = &mut first => break,
            }
        }

        drop(self.listener);
        info!("Listener stopped");

        if let Some(result) = outcome {
            return result;
        }

        warn!("Shutdown requested; waiting for the conversion to finish (interrupt again to abandon it)");
        tokio::select! {
            result = &mut conversion => result,
            () = shutdown() => {
                error!("Conversion abandoned");
                Err(Error::Interrupted)
            }
        }
    }
}

async fn reject(mut stream: TcpStream) {
    let mut buf = [0_u8; 1024];
    // the request itself is irrelevant; read what arrived and answer
    if let Err(e) = stream.read(&mut buf).await {
        trace!("Failed to read request: {}", e);
    }
    if let Err(e) = stream.write_all(NOT_FOUND).await {
        debug!("Failed to answer connection: {}", e);
    }
    if let Err(e) = stream.shutdown().await {
        trace!("Failed to close connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cleaner::RecordCleaner, config::Config, processor::tests::ScriptedCleaner};
    use assert_fs::prelude::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Cleaner whose calls never complete.
    struct Stalled;

    #[async_trait]
    impl RecordCleaner for Stalled {
        async fn clean(&self, _record: &str) -> Result<String> {
            std::future::pending().await
        }
    }

    fn config(temp: &assert_fs::TempDir) -> Config {
        let input = temp.child("dump.sql");
        input.write_str("a\nb\n").unwrap();
        Config::builder()
            .input_path(input.path())
            .output_path(temp.child("output.csv").path())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_conversion_runs_once_listener_is_bound() {
        let temp = assert_fs::TempDir::new().unwrap();
        let trigger = Trigger::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = trigger.local_addr().unwrap();
        let stop = Arc::new(Notify::new());
        let signal = Arc::clone(&stop);
        let pipeline = Pipeline::with_cleaner(config(&temp), ScriptedCleaner::echo());

        let server = tokio::spawn(trigger.serve(pipeline, move || {
            let signal = Arc::clone(&signal);
            async move { signal.notified().await }
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nhost: x\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 404"));

        let output = temp.child("output.csv");
        stop.notify_one();
        let stats = server.await.unwrap().unwrap();

        assert_eq!(stats.records_written, 2);
        output.assert("clean:a\nclean:b\n");
    }

    #[tokio::test]
    async fn test_second_shutdown_abandons_conversion() {
        let temp = assert_fs::TempDir::new().unwrap();
        let trigger = Trigger::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let pipeline = Pipeline::with_cleaner(config(&temp), Stalled);
        let signals = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&signals);

        let err = trigger
            .serve(pipeline, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert_eq!(signals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = Trigger::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = first.local_addr().unwrap();

        assert!(Trigger::bind(addr).await.is_err());
    }
}
