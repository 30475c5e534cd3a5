//! Scripted AUX transfer mock shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dp_aux::msg::{
    AUX_I2C_REPLY_DEFER, AUX_I2C_REPLY_NACK, AUX_NATIVE_REPLY_ACK, AUX_NATIVE_REPLY_NACK,
};
use dp_aux::{AuxData, AuxError, AuxMessage, AuxTransfer};

/// One recorded hardware exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub request: u8,
    pub address: u32,
    pub size: usize,
    /// Bytes carried by a write request, if any.
    pub payload: Option<Vec<u8>>,
}

/// Scripted outcome of one exchange.
#[derive(Debug, Clone)]
pub enum Step {
    /// Complete the exchange with `reply`, serving `data` into read
    /// buffers and reporting `ret` bytes moved (`None` = the natural
    /// count).
    Reply {
        reply: u8,
        data: Vec<u8>,
        ret: Option<usize>,
    },
    /// Fail the exchange outright.
    Fail(AuxError),
}

impl Step {
    pub fn ack() -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_ACK,
            data: Vec::new(),
            ret: None,
        }
    }

    pub fn ack_data(data: &[u8]) -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_ACK,
            data: data.to_vec(),
            ret: None,
        }
    }

    /// Acknowledge but claim only `ret` bytes were moved.
    pub fn ack_short(ret: usize) -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_ACK,
            data: Vec::new(),
            ret: Some(ret),
        }
    }

    pub fn native_nack() -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_NACK,
            data: Vec::new(),
            ret: None,
        }
    }

    /// Native ACK carrying an I2C-level DEFER.
    pub fn i2c_defer() -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_ACK | AUX_I2C_REPLY_DEFER,
            data: Vec::new(),
            ret: None,
        }
    }

    /// Native ACK carrying an I2C-level NACK.
    pub fn i2c_nack() -> Self {
        Step::Reply {
            reply: AUX_NATIVE_REPLY_ACK | AUX_I2C_REPLY_NACK,
            data: Vec::new(),
            ret: None,
        }
    }
}

#[derive(Default)]
pub struct MockState {
    pub steps: VecDeque<Step>,
    pub fallback: Option<Step>,
    pub calls: Vec<Call>,
}

/// Cloneable handle; the clone given to the channel and the one kept by the
/// test share the same state.
#[derive(Clone, Default)]
pub struct ScriptedAux(pub Arc<Mutex<MockState>>);

impl ScriptedAux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: Step) {
        self.0.lock().unwrap().steps.push_back(step);
    }

    pub fn push_n(&self, step: Step, n: usize) {
        let mut state = self.0.lock().unwrap();
        for _ in 0..n {
            state.steps.push_back(step.clone());
        }
    }

    /// Outcome served once the scripted steps run out.
    pub fn set_fallback(&self, step: Step) {
        self.0.lock().unwrap().fallback = Some(step);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.0.lock().unwrap().calls.len()
    }
}

impl AuxTransfer for ScriptedAux {
    fn transfer(&mut self, msg: &mut AuxMessage<'_>) -> dp_aux::Result<usize> {
        let mut state = self.0.lock().unwrap();

        let payload = match &msg.data {
            AuxData::Write(buf) => Some(buf.to_vec()),
            _ => None,
        };
        state.calls.push(Call {
            request: msg.request,
            address: msg.address,
            size: msg.data.len(),
            payload,
        });

        let step = state
            .steps
            .pop_front()
            .or_else(|| state.fallback.clone())
            .expect("mock script exhausted");

        match step {
            Step::Fail(err) => Err(err),
            Step::Reply { reply, data, ret } => {
                msg.reply = reply;
                let n = match &mut msg.data {
                    AuxData::Read(buf) => {
                        let n = data.len().min(buf.len());
                        buf[..n].copy_from_slice(&data[..n]);
                        ret.unwrap_or(n)
                    }
                    AuxData::Write(buf) => ret.unwrap_or(buf.len()),
                    AuxData::None => ret.unwrap_or(0),
                };
                Ok(n)
            }
        }
    }
}
