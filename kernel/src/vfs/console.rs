//! Console device behind the standard descriptors.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

/// Byte-stream console shared by every process.
///
/// Output accumulates until taken; input is a queue fed by the host. Reads
/// never wait for input.
#[derive(Default)]
pub struct Console {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for stdin.
    pub fn push_input(&self, data: &[u8]) {
        self.input.lock().extend(data.iter().copied());
    }

    /// Drain up to `buf.len()` queued input bytes.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut input = self.input.lock();
        let count = buf.len().min(input.len());
        for (slot, byte) in buf.iter_mut().zip(input.drain(..count)) {
            *slot = byte;
        }
        count
    }

    /// Append to stdout.
    pub fn write(&self, data: &[u8]) -> usize {
        self.output.lock().extend_from_slice(data);
        data.len()
    }

    /// Copy of everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    /// Take and clear the output buffer.
    pub fn take_output(&self) -> Vec<u8> {
        core::mem::take(&mut *self.output.lock())
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }
}
