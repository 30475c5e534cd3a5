//! Retry and reply semantics of the native DPCD engine.

mod util;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dp_aux::msg::{AUX_NATIVE_READ, AUX_NATIVE_WRITE};
use dp_aux::{dpcd, AuxChannel, AuxError, MstTransport};
use util::{ScriptedAux, Step};

fn channel(mock: &ScriptedAux) -> AuxChannel {
    AuxChannel::new("dp-aux-0", Box::new(mock.clone()))
}

#[test]
fn dpcd_read_returns_canned_link_status() {
    let mock = ScriptedAux::new();
    mock.push(Step::ack_data(&[0x11])); // throw-away read
    mock.push(Step::ack_data(&[1, 2, 3, 4, 5, 6]));
    let aux = channel(&mock);

    let mut buf = [0u8; 6];
    assert_eq!(aux.dpcd_read(0x202, &mut buf), Ok(6));
    assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    // The defensive throw-away read goes to DPCD_REV for a single byte.
    assert_eq!(calls[0].address, dpcd::DPCD_REV);
    assert_eq!(calls[0].size, 1);
    assert_eq!(calls[0].request, AUX_NATIVE_READ);
    assert_eq!(calls[1].address, 0x202);
    assert_eq!(calls[1].size, 6);
    assert_eq!(calls[1].request, AUX_NATIVE_READ);
}

#[test]
fn busy_is_retried_immediately_without_delay() {
    let mock = ScriptedAux::new();
    mock.push_n(Step::Fail(AuxError::Busy), 31);
    mock.push(Step::ack());
    let aux = channel(&mock);

    let start = Instant::now();
    assert_eq!(aux.dpcd_write(0x100, &[0x0a]), Ok(1));
    let elapsed = start.elapsed();

    assert_eq!(mock.call_count(), 32);
    // 31 sleeping retries would cost at least ~15.5 ms; the busy path must
    // not sleep at all.
    assert!(elapsed < Duration::from_millis(12), "spent {elapsed:?}");
}

#[test]
fn first_error_is_reported_after_exhaustion() {
    let mock = ScriptedAux::new();
    // First attempt: acknowledged but short. Every retry after that fails
    // differently; the short reply is the root cause and must win.
    mock.push(Step::ack_short(3));
    mock.set_fallback(Step::Fail(AuxError::Io));
    let aux = channel(&mock);

    let err = aux.dpcd_write(0x100, &[0; 6]).unwrap_err();
    assert_eq!(err, AuxError::Protocol { expected: 6, got: 3 });
    assert_eq!(mock.call_count(), 32);
}

#[test]
fn nack_reply_exhausts_retries_as_io() {
    let mock = ScriptedAux::new();
    mock.set_fallback(Step::native_nack());
    let aux = channel(&mock);

    assert_eq!(aux.dpcd_write(0x100, &[0x0a]), Err(AuxError::Io));
    assert_eq!(mock.call_count(), 32);
}

#[test]
fn transfer_timeouts_propagate_after_retrying() {
    let mock = ScriptedAux::new();
    mock.set_fallback(Step::Fail(AuxError::Timeout));
    let aux = channel(&mock);

    let mut buf = [0u8; 2];
    // The throw-away read itself exhausts the budget; the real read is
    // never attempted.
    assert_eq!(aux.dpcd_read(0x202, &mut buf), Err(AuxError::Timeout));
    let calls = mock.calls();
    assert_eq!(calls.len(), 32);
    assert!(calls.iter().all(|c| c.address == dpcd::DPCD_REV));
}

#[test]
fn write_payload_reaches_the_wire() {
    let mock = ScriptedAux::new();
    mock.push(Step::ack());
    let aux = channel(&mock);

    assert_eq!(aux.dpcd_write(0x270, &[0xde, 0xad]), Ok(2));
    let calls = mock.calls();
    assert_eq!(calls[0].request, AUX_NATIVE_WRITE);
    assert_eq!(calls[0].payload, Some(vec![0xde, 0xad]));
}

#[derive(Default)]
struct RecordingMst {
    reads: Arc<Mutex<Vec<(u32, usize)>>>,
    writes: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
}

impl MstTransport for RecordingMst {
    fn dpcd_read(&mut self, offset: u32, buffer: &mut [u8]) -> dp_aux::Result<usize> {
        self.reads.lock().unwrap().push((offset, buffer.len()));
        buffer.fill(0xee);
        Ok(buffer.len())
    }

    fn dpcd_write(&mut self, offset: u32, buffer: &[u8]) -> dp_aux::Result<usize> {
        self.writes.lock().unwrap().push((offset, buffer.to_vec()));
        Ok(buffer.len())
    }
}

#[test]
fn remote_channel_routes_through_mst_without_throwaway_read() {
    let mst = RecordingMst::default();
    let reads = Arc::clone(&mst.reads);
    let writes = Arc::clone(&mst.writes);
    let aux = AuxChannel::new_remote("dp-mst-0", Box::new(mst));
    assert!(aux.is_remote());

    let mut buf = [0u8; 6];
    assert_eq!(aux.dpcd_read(0x202, &mut buf), Ok(6));
    assert_eq!(buf, [0xee; 6]);
    // Exactly one read, no DPCD_REV probe: the power-save workaround only
    // applies to directly attached channels.
    assert_eq!(reads.lock().unwrap().as_slice(), &[(0x202, 6)]);

    assert_eq!(aux.dpcd_write(0x100, &[1, 2]), Ok(2));
    assert_eq!(writes.lock().unwrap().as_slice(), &[(0x100, vec![1, 2])]);
}

#[test]
fn read_link_status_fetches_the_six_status_bytes() {
    let mock = ScriptedAux::new();
    mock.push(Step::ack_data(&[0x11]));
    mock.push(Step::ack_data(&[0x77, 0x77, 0x81, 0, 0, 0]));
    let aux = channel(&mock);

    let status = aux.read_link_status().unwrap();
    assert_eq!(status, [0x77, 0x77, 0x81, 0, 0, 0]);
    assert_eq!(mock.calls()[1].address, dpcd::LANE0_1_STATUS);
    assert_eq!(mock.calls()[1].size, dpcd::LINK_STATUS_SIZE);
}
