//! Line-level protocol handling and command transmission

use std::time::Duration;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::time;
use crate::{
    cmd::CmdSet,
    response::CommandError,
};

pub(crate) struct Executor<T>
{
    line_ending: &'static str,
    io_handle: T,
    read_buf: Vec<u8>,
    read_timeout: Duration,
}

impl <T> Executor<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    pub fn with(line_ending: &'static str, read_timeout: Duration, io_handle: T) -> Self
    {
        Self {
            line_ending: line_ending,
            io_handle: io_handle,
            read_buf: Vec::with_capacity(128),
            read_timeout: read_timeout,
        }
    }

    /// Drops the first `n` bytes from the read buffer
    ///
    /// Drops all bytes if `n >= self.read_buf.len()`
    fn drop_first(&mut self, n: usize)
    {
        if n >= self.read_buf.len() {
            self.read_buf.clear();
        }
        else {
            // relocate any bytes after the Nth byte to index 0
            self.read_buf.rotate_left(n);
            // chop off the bytes we just consumed
            self.read_buf.truncate(self.read_buf.len() - n);
            // shrink the buffer's allocation to keep memory usage down
            self.read_buf.shrink_to(128);
        }
    }

    /// Returns the index of the first linefeed in the read buffer if any, attempting to start
    /// looking at the suggested index.
    ///
    /// If the suggested index is out of bounds, then `None` is returned.
    fn find_line_ending(&self, start_hint: usize) -> Option<usize>
    {
        for index in start_hint..self.read_buf.len() {
            if self.read_buf[index] == 0x0A {
                return Some(index);
            }
        }

        None
    }

    /// Reads a line (series of bytes terminated by `LF` / 0x0A) into the read buffer and returns
    /// how many bytes are in the line
    ///
    /// On error all bytes buffered are destroyed
    async fn read_line(&mut self) -> Result<usize, std::io::Error>
    {
        let mut total_bytes_read = 0;
        // try to find the ending in already-buffered data first
        let mut end_index = self.find_line_ending(0);

        while end_index.is_none() {
            let mut temp_buf = [0u8; 64];

            match self.io_handle.read(&mut temp_buf[..]).await {
                Ok(0) => {
                    self.read_buf.clear();
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
                }
                Ok(bytes_read) => {
                    let prior_end = total_bytes_read;
                    total_bytes_read += bytes_read;
                    self.read_buf.extend_from_slice(&temp_buf[..bytes_read]);
                    end_index = self.find_line_ending(prior_end);
                }
                Err(err) => {
                    self.read_buf.clear();
                    return Err(err);
                }
            }
        }

        return Ok(end_index.unwrap() + 1);
    }

    /// Pulls the first `size` bytes out of the read buffer as a string, terminator stripped
    fn take_line(&mut self, size: usize) -> Result<String, CommandError>
    {
        let line = String::from_utf8(self.read_buf[..size].to_vec());
        self.drop_first(size);
        let line = line?;

        Ok(line.trim_end_matches(|ch| ch == '\r' || ch == '\n').to_string())
    }

    /// Transmits a set command, which this instrument never answers
    pub async fn send(&mut self, cmd: CmdSet) -> Result<(), CommandError>
    {
        // discard leftovers from any earlier exchange so the next reply lines up
        self.read_buf.clear();

        let serialized = format!("{}{}", cmd, self.line_ending);
        self.io_handle.write_all(serialized.as_bytes()).await?;

        Ok(())
    }

    /// Transmits a query command and returns its single reply line
    ///
    /// Fails with [`CommandError::Timeout`] when no complete line arrives within the read
    /// window. The instrument is half duplex: the reply must be consumed before the next
    /// command goes out, which this method guarantees by construction.
    pub async fn query(&mut self, cmd: CmdSet) -> Result<String, CommandError>
    {
        self.read_buf.clear();

        let serialized = format!("{}{}", cmd, self.line_ending);
        self.io_handle.write_all(serialized.as_bytes()).await?;

        let response_len = match time::timeout(self.read_timeout, self.read_line()).await {
            Ok(read_result) => read_result?,
            Err(_elapsed) => return Err(CommandError::Timeout),
        };

        self.take_line(response_len)
    }
}
