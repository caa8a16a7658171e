//! Controllable in-memory MBPU double for dispatcher tests.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use mdlx_chip::frames::{
    METRIC_SET_SIZE, RESPONSE_SIZE, RESPONSE_R_OFFSET, RESPONSE_SLOT_OFFSET, RESPONSE_S_OFFSET,
};
use mdlx_driver::{DeviceIo, MdlxError, Result};

/// Metric block whose decoded reference values are known.
pub const METRIC_BYTES: [u8; METRIC_SET_SIZE] = [
    0xEC, 0xA0, 0x00, 0x00, // temperature 41.486725
    0xDA, 0x45, 0x00, 0x00, // vccint 0.818573
    0x7A, 0x9A, 0x00, 0x00, // vccaux 1.810272
    0xE2, 0x45, 0x00, 0x00, // vccbram 0.818939
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00,
];

/// How the mock completes written frames.
#[derive(Debug, Clone, Copy)]
pub enum Responder {
    /// Complete immediately, echoing the first two payload fields as (r, s).
    Echo,
    /// Complete immediately with this fixed signature.
    Fixed([u8; 32], [u8; 32]),
    /// Park written frames until the test releases them.
    Hold,
}

#[derive(Debug)]
enum Pending {
    Frame([u8; RESPONSE_SIZE]),
    ShortRead,
}

#[derive(Debug, Default)]
struct State {
    writes: usize,
    held: VecDeque<Vec<u8>>,
    readable: VecDeque<Pending>,
}

/// In-memory device: frames go in, responses come out under test control.
#[derive(Debug)]
pub struct MockDevice {
    mode: Responder,
    state: Mutex<State>,
    wakeup: Condvar,
}

impl MockDevice {
    pub fn new(mode: Responder) -> Self {
        Self {
            mode,
            state: Mutex::new(State::default()),
            wakeup: Condvar::new(),
        }
    }

    /// Frames written so far.
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Complete the oldest parked frame.
    pub fn release_next(&self) {
        let mut state = self.state.lock().unwrap();
        let frame = state.held.pop_front().expect("no parked frame to release");
        let response = self.response_for(&frame);
        state.readable.push_back(Pending::Frame(response));
        self.wakeup.notify_one();
    }

    /// Complete every parked frame, newest first.
    pub fn release_all_reversed(&self) {
        let mut state = self.state.lock().unwrap();
        while let Some(frame) = state.held.pop_back() {
            let response = self.response_for(&frame);
            state.readable.push_back(Pending::Frame(response));
        }
        self.wakeup.notify_all();
    }

    /// Make the next poll fail like a 48-byte short read.
    pub fn fail_next_read(&self) {
        let mut state = self.state.lock().unwrap();
        state.readable.push_back(Pending::ShortRead);
        self.wakeup.notify_one();
    }

    fn response_for(&self, frame: &[u8]) -> [u8; RESPONSE_SIZE] {
        let (r, s) = match self.mode {
            Responder::Fixed(r, s) => (r, s),
            Responder::Echo | Responder::Hold => {
                let mut r = [0u8; 32];
                let mut s = [0u8; 32];
                r.copy_from_slice(&frame[16..48]);
                s.copy_from_slice(&frame[48..80]);
                (r, s)
            }
        };

        let mut response = [0u8; RESPONSE_SIZE];
        // status stays 0
        response[RESPONSE_SLOT_OFFSET..RESPONSE_SLOT_OFFSET + 8]
            .copy_from_slice(&frame[8..16]);
        response[RESPONSE_R_OFFSET..RESPONSE_R_OFFSET + 32].copy_from_slice(&r);
        response[RESPONSE_S_OFFSET..RESPONSE_S_OFFSET + 32].copy_from_slice(&s);
        response
    }
}

impl DeviceIo for MockDevice {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        match self.mode {
            Responder::Hold => state.held.push_back(frame.to_vec()),
            Responder::Echo | Responder::Fixed(..) => {
                let response = self.response_for(frame);
                state.readable.push_back(Pending::Frame(response));
                self.wakeup.notify_one();
            }
        }
        Ok(())
    }

    fn read_response(&self) -> Result<[u8; RESPONSE_SIZE]> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(pending) = state.readable.pop_front() {
                return match pending {
                    Pending::Frame(frame) => Ok(frame),
                    Pending::ShortRead => Err(MdlxError::ShortIo {
                        op: "read",
                        node: "c2h",
                        expected: RESPONSE_SIZE,
                        got: 48,
                    }),
                };
            }
            state = self.wakeup.wait(state).unwrap();
        }
    }

    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    fn read_metrics(&self) -> Result<[u8; METRIC_SET_SIZE]> {
        Ok(METRIC_BYTES)
    }

    fn reset(&self) -> Result<()> {
        Ok(())
    }

    fn version(&self) -> Result<String> {
        Ok("20113000".into())
    }
}
