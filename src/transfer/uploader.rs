use super::{report, ProgressListener};
use core::task::Poll;
use reqwest::{multipart, Body};
use std::{cmp, io, sync::Arc};

const CHUNK_SIZE: usize = 1024 * 32;

/// Builds the multipart form the `/upload` endpoint expects: a single `file`
/// field carrying `data` under `file_name`.
pub fn upload_form(
    file_name: String,
    data: Vec<u8>,
    progress_listener: Option<ProgressListener>,
) -> multipart::Form {
    let len = data.len() as u64;
    let stream = ProgressStream::new(Arc::new(file_name.clone()), 0, Arc::new(data), progress_listener);
    let part = multipart::Part::stream_with_length(Body::wrap_stream(stream), len)
        .file_name(file_name);
    multipart::Form::new().part("file", part)
}

/// Yields `data` in 32K chunks and reports the position after each one.
#[derive(Clone)]
pub struct ProgressStream {
    name: Arc<String>,
    part: usize,
    data: Arc<Vec<u8>>,
    cursor: usize,
    progress_listener: Option<ProgressListener>,
}

impl ProgressStream {
    pub fn new(
        name: Arc<String>,
        part: usize,
        data: Arc<Vec<u8>>,
        progress_listener: Option<ProgressListener>,
    ) -> Self {
        ProgressStream {
            name,
            part,
            data,
            cursor: 0,
            progress_listener,
        }
    }
}

impl futures::Stream for ProgressStream {
    type Item = io::Result<Vec<u8>>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        _: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let total_len = self.data.len();
        let remain_len = total_len - self.cursor;

        if remain_len == 0 {
            Poll::Ready(None)
        } else {
            let start_index = self.cursor;
            self.cursor += cmp::min(remain_len, CHUNK_SIZE);
            let result = self.data[start_index..self.cursor].to_vec();

            report(
                self.progress_listener.as_ref(),
                &self.name,
                self.part,
                self.cursor,
                total_len,
            );

            Poll::Ready(Some(Ok(result)))
        }
    }
}
