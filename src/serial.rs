//! Desktop serial-port link using the serialport crate

use crate::transport::SerialLink;
use std::time::Duration;

pub struct SerialPortLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialPortLink {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        std::thread::sleep(Duration::from_millis(500));
        port.clear(serialport::ClearBuffer::Input)?;

        log::info!("Serial link open on {} at {} baud", port_name, baud_rate);
        Ok(Self { port })
    }
}

impl SerialLink for SerialPortLink {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.port, data)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.port
            .set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(|e| std::io::Error::other(e))?;
        match std::io::Read::read(&mut self.port, buf) {
            Ok(n) => Ok(n),
            // A timeout with nothing received is an empty read, not a fault
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| std::io::Error::other(e))
    }
}
