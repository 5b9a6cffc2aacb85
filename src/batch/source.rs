use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, Lines};

/// Where a run pulls candidate addresses from, one at a time.
pub trait AddressSource: Send {
    /// `Ok(None)` once the input is exhausted.
    fn next_address(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

impl<R> AddressSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_address(&mut self) -> io::Result<Option<String>> {
        self.next_line().await
    }
}

/// Adapts an in-memory list.
pub struct IterSource<I>(pub I);

impl<I> AddressSource for IterSource<I>
where
    I: Iterator<Item = String> + Send,
{
    async fn next_address(&mut self) -> io::Result<Option<String>> {
        Ok(self.0.next())
    }
}
