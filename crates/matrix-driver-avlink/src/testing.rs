//! Scriptable mock matrix switch for tests.
//!
//! [`MockMatrix`] plays the device end of an in-memory duplex pipe: tests
//! attach the driver to one half and script the other, reading the fixed
//! 12-byte command frames the driver writes and answering with status
//! replies (complete, fragmented, or deliberately broken). Dropping the mock
//! closes the pipe and looks like the switch going away.

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Command frames are fixed-format: `MT00<OP><P1><P2>NT`.
const COMMAND_LEN: usize = 12;

/// The device end of a mock switch connection.
pub struct MockMatrix {
    stream: DuplexStream,
}

impl MockMatrix {
    /// Create a mock switch.
    ///
    /// Returns the stream to attach the driver to, and the mock that scripts
    /// the device side.
    pub fn pair() -> (DuplexStream, MockMatrix) {
        let (driver_side, device_side) = tokio::io::duplex(1024);
        (
            driver_side,
            MockMatrix {
                stream: device_side,
            },
        )
    }

    /// Read the next command frame written by the driver.
    pub async fn expect_command(&mut self) -> Result<String> {
        let mut buf = [0u8; COMMAND_LEN];
        self.stream
            .read_exact(&mut buf)
            .await
            .context("reading command frame from driver")?;
        String::from_utf8(buf.to_vec()).context("command frame is not ASCII")
    }

    /// Send a complete status reply for the given `(output, input)` records.
    pub async fn send_status(&mut self, records: &[(&str, &str)]) -> Result<()> {
        let body = records
            .iter()
            .map(|(output, input)| format!("{}{}", output, input))
            .collect::<Vec<_>>()
            .join(";");
        self.send_raw(format!("LINK{};END", body).as_bytes()).await
    }

    /// Send raw bytes, e.g. a partial fragment or a malformed reply.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .context("writing to driver")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripts_both_directions() {
        let (mut driver_side, mut mock) = MockMatrix::pair();

        driver_side.write_all(b"MT00RD0000NT").await.unwrap();
        assert_eq!(mock.expect_command().await.unwrap(), "MT00RD0000NT");

        mock.send_status(&[("01", "02")]).await.unwrap();
        let mut buf = [0u8; 12];
        driver_side.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"LINK0102;END");
    }
}
