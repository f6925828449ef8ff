use super::{report, ProgressListener};
use futures::{Stream, StreamExt};
use reqwest::RequestBuilder;
use thiserror::Error;

use std::{io, sync::Arc};

#[derive(Error, Debug)]
pub enum Error {
    #[error("The reqwest error: {0:?}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("The IO error: {0:?}")]
    IOError(#[from] io::Error),
}

/// Streams a response body into the next writer.
pub struct Downloader<W: io::Write> {
    progress_listener: Option<ProgressListener>,
    next_writer: W,
}

impl<W: io::Write> Downloader<W> {
    pub fn new(progress_listener: Option<ProgressListener>, next_writer: W) -> Self {
        Downloader {
            progress_listener,
            next_writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.next_writer
    }

    /// Sends `request` and writes the body. Returns the number of bytes written.
    pub async fn download(
        &mut self,
        name: Arc<String>,
        part: usize,
        request: RequestBuilder,
    ) -> Result<usize, Error> {
        let resp = request.send().await?.error_for_status()?;
        let total_len = resp.content_length().unwrap_or(0) as usize;
        self.pump(name, part, total_len, resp.bytes_stream()).await
    }

    async fn pump<S, B, E>(
        &mut self,
        name: Arc<String>,
        part: usize,
        total_len: usize,
        chunks: S,
    ) -> Result<usize, Error>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        Error: From<E>,
    {
        futures::pin_mut!(chunks);
        let mut written_len = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            self.next_writer.write_all(chunk.as_ref())?;
            written_len += chunk.as_ref().len();

            report(
                self.progress_listener.as_ref(),
                &name,
                part,
                written_len,
                total_len,
            );
        }
        self.next_writer.flush()?;

        Ok(written_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;

    #[tokio::test]
    async fn writes_all_chunks() {
        let positions = Arc::new(Mutex::new(vec![]));
        let recorded = positions.clone();
        let listener: ProgressListener = Arc::new(Mutex::new(move |_: Arc<String>, part: usize, pos: usize, total: usize| {
            recorded.lock().unwrap().push((part, pos, total));
        }));

        let mut downloader = Downloader::new(Some(listener), vec![]);
        let chunks = stream::iter(vec![
            Ok::<_, io::Error>(b"abc".to_vec()),
            Ok(b"defg".to_vec()),
        ]);
        let written = downloader
            .pump(Arc::new("scan".to_owned()), 2, 7, chunks)
            .await
            .unwrap();

        assert_eq!(written, 7);
        assert_eq!(downloader.into_inner(), b"abcdefg");
        assert_eq!(*positions.lock().unwrap(), vec![(2, 3, 7), (2, 7, 7)]);
    }

    #[tokio::test]
    async fn stream_errors_abort() {
        let mut downloader = Downloader::new(None, vec![]);
        let chunks = stream::iter(vec![
            Ok(b"abc".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = downloader
            .pump(Arc::new("scan".to_owned()), 0, 0, chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IOError(_)));
    }
}
