//! Provider Protocol Machine (spec §3, §4.C): the per-CR cyclic-data
//! provider state machine.
//!
//! Grounded on the teacher's top-level ownership style (`Pcapng<R>` owning
//! a `BlockReader` and a `Section`), adapted from the read path to the
//! write path: a [`PpmInstance`] owns a [`FrameBuffer`](crate::codec::FrameBuffer)
//! and a [`CyclicTimer`], and the process-wide `ppm_buf_lock` singleton
//! (spec §3/§5/§9) is modeled as [`PpmPool`], a lazily-materialized shared
//! mutex behind an atomic refcount rather than a crate-level `static`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::codec::FrameBuffer;
use crate::collaborators::{Ar, ArTable, RawEthernet};
use crate::error::{Error, Result};
use crate::timer::{CyclicTimer, TimerAction};
use crate::types::{data_status_bits, ArHandle, DataStatus, EthAddr, PpmState, ethertype};

/// A per-subslot data/IOPS/IOCS descriptor: offsets and lengths within the
/// `c_sdu_length`-sized staging region (spec §3's `buffer_data`).
#[derive(Clone, Copy, Debug)]
pub struct SubslotDescriptor {
    pub api: u32,
    pub slot: u16,
    pub subslot: u16,
    pub data_offset: usize,
    pub data_length: usize,
    pub iops_offset: usize,
    pub iops_length: usize,
    pub iocs_offset: usize,
    pub iocs_length: usize,
    /// Whether this subslot is an input or multicast-provider IOCR, i.e.
    /// one whose problem indicator participates in `data_status` bit 5
    /// (spec §4.C `set_problem_indicator`).
    pub is_input_or_mc_provider: bool,
}

/// Static parameters fixed at `activate` time (spec §4.C step 2-3).
#[derive(Clone, Debug)]
pub struct PpmParams {
    pub send_clock_factor: u32,
    pub reduction_ratio: u32,
    pub c_sdu_length: usize,
    pub frame_id: u16,
    pub vlan_priority: u8,
    pub vlan_id: u16,
    pub descriptors: Vec<SubslotDescriptor>,
}

/// The process-wide PPM state (spec §3): a refcounted, lazily-created
/// mutex guarding every PPM instance's staging-region reads and writes.
///
/// Invariant: the mutex exists exactly when `count >= 1`; it is created on
/// the 0→1 edge and destroyed on the 1→0 edge. The host constructs one
/// `PpmPool` and shares it (via `Arc`) across every `PpmInstance`.
pub struct PpmPool {
    count: AtomicUsize,
    lock: Mutex<Option<Arc<Mutex<()>>>>,
}

impl PpmPool {
    pub fn new() -> PpmPool {
        PpmPool {
            count: AtomicUsize::new(0),
            lock: Mutex::new(None),
        }
    }

    pub fn active_instance_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn has_lock(&self) -> bool {
        self.lock.lock().expect("ppm pool poisoned").is_some()
    }

    fn acquire(&self) -> Arc<Mutex<()>> {
        let prev = self.count.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.lock.lock().expect("ppm pool poisoned");
        if prev == 0 {
            debug!("creating ppm_buf_lock on 0->1 instance edge");
            *guard = Some(Arc::new(Mutex::new(())));
        }
        guard
            .clone()
            .expect("ppm_buf_lock must exist once an instance is active")
    }

    fn release(&self) {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            let mut guard = self.lock.lock().expect("ppm pool poisoned");
            debug!("destroying ppm_buf_lock on 1->0 instance edge");
            *guard = None;
        }
    }
}

impl Default for PpmPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A provider state indication sent to the AR via the external CMSU entry
/// point (spec §4.C / §7). The host's `ArTable`/CMSU glue is expected to
/// route this; the core only produces the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderStateIndication {
    pub handle: ArHandle,
    pub error: bool,
}

/// One Provider Protocol Machine instance: the cyclic sender for a single
/// CR on an AR (spec §3).
pub struct PpmInstance {
    handle: ArHandle,
    state: PpmState,
    params: PpmParams,
    pool: Arc<PpmPool>,
    buf_lock: Option<Arc<Mutex<()>>>,
    staging: Vec<u8>,
    send_buffer: Option<FrameBuffer>,
    buffer_pos: usize,
    cycle_counter_offset: usize,
    data_status_offset: usize,
    transfer_status_offset: usize,
    da: EthAddr,
    sa: EthAddr,
    control_interval_us: u64,
    compensated_control_interval_us: u64,
    cycle: u16,
    data_status: DataStatus,
    transfer_status: u8,
    ci_running: bool,
    first_transmit: bool,
    timer: Option<CyclicTimer>,
}

impl PpmInstance {
    /// Construct a PPM instance in state `W_START`. `activate` must be
    /// called before any setter/getter succeeds.
    pub fn new(handle: ArHandle, pool: Arc<PpmPool>, params: PpmParams) -> PpmInstance {
        let staging_len = params.c_sdu_length;
        PpmInstance {
            handle,
            state: PpmState::WStart,
            params,
            pool,
            buf_lock: None,
            staging: vec![0u8; staging_len],
            send_buffer: None,
            buffer_pos: 0,
            cycle_counter_offset: 0,
            data_status_offset: 0,
            transfer_status_offset: 0,
            da: EthAddr::default(),
            sa: EthAddr::default(),
            control_interval_us: 0,
            compensated_control_interval_us: 0,
            cycle: 0,
            data_status: DataStatus::default(),
            transfer_status: 0,
            ci_running: false,
            first_transmit: true,
            timer: None,
        }
    }

    pub fn state(&self) -> PpmState {
        self.state
    }

    pub fn handle(&self) -> ArHandle {
        self.handle
    }

    /// Compute `control_interval = send_clock_factor * reduction_ratio *
    /// 1000 / 32` microseconds (spec §3/§4.C step 6).
    fn control_interval_us(&self) -> u64 {
        u64::from(self.params.send_clock_factor) * u64::from(self.params.reduction_ratio) * 1000
            / 32
    }

    /// Activate the PPM instance for the given AR (spec §4.C).
    ///
    /// `stack_cycle_time_us` and `timing_class` feed the §4.B compensation
    /// rule; `responder_mac`/`initiator_mac` come from the AR's
    /// result/param records (spec §4.C step 2).
    pub fn activate(
        &mut self,
        responder_mac: EthAddr,
        initiator_mac: EthAddr,
        stack_cycle_time_us: u64,
        timing_class: crate::timer::HostTimingClass,
    ) -> Result<Option<ProviderStateIndication>> {
        if self.state == PpmState::Run {
            return Err(Error::InvalidState);
        }

        self.sa = responder_mac;
        self.da = initiator_mac;

        // buffer_pos = 2*6 (two MACs) + 4 (VLAN TPID+VID word) + 2
        // (EtherType) + 2 (Frame ID) (spec §4.C step 3).
        self.buffer_pos = 2 * 6 + 4 + 2 + 2;
        self.cycle_counter_offset = self.buffer_pos + self.params.c_sdu_length;
        self.data_status_offset = self.cycle_counter_offset + 2;
        self.transfer_status_offset = self.data_status_offset + 1;
        let buffer_length = self.transfer_status_offset + 1;

        let mut buf = FrameBuffer::zeroed(buffer_length);
        buf.put_bytes(self.da.as_bytes())?;
        buf.put_bytes(self.sa.as_bytes())?;
        buf.put_u16_be(ethertype::VLAN_TPID)?;
        let pcp_vid = (u16::from(self.params.vlan_priority) << 13) | (self.params.vlan_id & 0x0FFF);
        buf.put_u16_be(pcp_vid)?;
        buf.put_u16_be(ethertype::PROFINET)?;
        buf.put_u16_be(self.params.frame_id)?;
        debug_assert_eq!(buf.position(), self.buffer_pos);

        self.send_buffer = Some(buf);
        self.data_status = DataStatus::initial();
        self.transfer_status = 0;

        self.control_interval_us = self.control_interval_us();
        self.compensated_control_interval_us = crate::timer::compensate(
            self.control_interval_us,
            stack_cycle_time_us,
            timing_class,
        );

        self.buf_lock = Some(self.pool.acquire());
        self.state = PpmState::Run;
        self.ci_running = true;
        self.first_transmit = true;
        info!(
            crep = self.handle.crep,
            interval_us = self.compensated_control_interval_us,
            "ppm instance activated"
        );
        Ok(None)
    }

    /// Compute the 16-bit frame cycle counter from the monotonic clock
    /// (spec §4.C cyclic-send step 1).
    pub fn compute_cycle(&self, now_us: u64) -> u16 {
        let cycle_raw = now_us * 4 / 125;
        let ratio = u64::from(self.params.send_clock_factor) * u64::from(self.params.reduction_ratio);
        let cycle = if cycle_raw < ratio {
            ratio
        } else {
            cycle_raw - (cycle_raw % ratio)
        };
        (cycle & 0xFFFF) as u16
    }

    /// Run one cyclic-send iteration (spec §4.C "Cyclic send callback").
    /// Returns `Ok(Some(indication))` with `error: false` on the first-ever
    /// successful send (spec §4.C step 5's one-shot "provider OK" state
    /// indication); `Ok(None)` on every other outcome, including a no-op
    /// when `ci_running` is false (teardown in progress) or a failed send
    /// (non-fatal; the next cycle still fires).
    pub fn cyclic_send(
        &mut self,
        now_us: u64,
        eth: &dyn RawEthernet,
    ) -> Result<Option<ProviderStateIndication>> {
        if !self.ci_running {
            return Ok(None);
        }

        self.cycle = self.compute_cycle(now_us);

        let buf = self
            .send_buffer
            .as_mut()
            .expect("send buffer exists while ci_running");

        {
            let lock = Arc::clone(
                self.buf_lock
                    .as_ref()
                    .expect("buf_lock exists while ci_running"),
            );
            let _guard = lock.lock().expect("ppm_buf_lock poisoned");
            buf.seek(self.buffer_pos)?;
            buf.put_bytes(&self.staging[..self.params.c_sdu_length])?;
        }

        buf.seek(self.cycle_counter_offset)?;
        buf.put_u16_be(self.cycle)?;
        buf.seek(self.data_status_offset)?;
        buf.put_u8(self.data_status.0)?;
        buf.put_u8(self.transfer_status)?;

        match eth.send(buf.as_slice()) {
            Ok(_) => {
                if self.first_transmit {
                    self.first_transmit = false;
                    info!(crep = self.handle.crep, "provider OK: first cyclic frame sent");
                    return Ok(Some(ProviderStateIndication {
                        handle: self.handle,
                        error: false,
                    }));
                }
                Ok(None)
            }
            Err(e) => {
                warn!(crep = self.handle.crep, error = %e, "cyclic send failed, counted as interface out-error");
                Ok(None)
            }
        }
    }

    /// Close the PPM instance (spec §4.C "Close").
    pub fn close(&mut self) {
        self.ci_running = false;
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.send_buffer = None;
        self.state = PpmState::WStart;
        if self.buf_lock.take().is_some() {
            self.pool.release();
        }
        self.data_status = DataStatus::default();
    }

    /// Install the already-created cyclic timer (kept separate from
    /// `activate` so the timer-creation failure path can carry its own
    /// provider state indication, spec §4.C step 7). On failure, the timer
    /// is not installed and the returned indication has `error: true`; the
    /// caller routes it to the AR exactly like the one from `cyclic_send`.
    pub fn arm_timer(&mut self, mut timer: CyclicTimer) -> Result<Option<ProviderStateIndication>> {
        if let Err(e) = timer.start() {
            warn!(crep = self.handle.crep, error = %e, "timer creation failed, reporting provider state indication");
            return Ok(Some(ProviderStateIndication {
                handle: self.handle,
                error: true,
            }));
        }
        self.timer = Some(timer);
        Ok(None)
    }

    fn descriptor(&self, api: u32, slot: u16, subslot: u16) -> Result<&SubslotDescriptor> {
        self.params
            .descriptors
            .iter()
            .find(|d| d.api == api && d.slot == slot && d.subslot == subslot)
            .ok_or(Error::NoDescriptor { api, slot, subslot })
    }

    pub fn set_data_and_iops(
        &mut self,
        api: u32,
        slot: u16,
        subslot: u16,
        data: &[u8],
        iops: &[u8],
    ) -> Result<()> {
        if self.state != PpmState::Run {
            return Err(Error::InvalidState);
        }
        let d = *self.descriptor(api, slot, subslot)?;
        if data.len() != d.data_length {
            return Err(Error::LengthMismatch {
                expected: d.data_length,
                supplied: data.len(),
            });
        }
        if iops.len() != d.iops_length {
            return Err(Error::LengthMismatch {
                expected: d.iops_length,
                supplied: iops.len(),
            });
        }
        let lock = Arc::clone(self.buf_lock.as_ref().ok_or(Error::InvalidState)?);
        let _guard = lock.lock().expect("ppm_buf_lock poisoned");
        self.staging[d.data_offset..d.data_offset + d.data_length].copy_from_slice(data);
        self.staging[d.iops_offset..d.iops_offset + d.iops_length].copy_from_slice(iops);
        Ok(())
    }

    pub fn set_iocs(&mut self, api: u32, slot: u16, subslot: u16, iocs: &[u8]) -> Result<()> {
        if self.state != PpmState::Run {
            return Err(Error::InvalidState);
        }
        let d = *self.descriptor(api, slot, subslot)?;
        if d.iocs_length == 0 {
            return Ok(());
        }
        if iocs.len() != d.iocs_length {
            return Err(Error::LengthMismatch {
                expected: d.iocs_length,
                supplied: iocs.len(),
            });
        }
        let lock = Arc::clone(self.buf_lock.as_ref().ok_or(Error::InvalidState)?);
        let _guard = lock.lock().expect("ppm_buf_lock poisoned");
        self.staging[d.iocs_offset..d.iocs_offset + d.iocs_length].copy_from_slice(iocs);
        Ok(())
    }

    pub fn get_data_and_iops(
        &self,
        api: u32,
        slot: u16,
        subslot: u16,
        data_out: &mut [u8],
        iops_out: &mut [u8],
    ) -> Result<()> {
        let d = *self.descriptor(api, slot, subslot)?;
        if data_out.len() < d.data_length {
            return Err(Error::BufferTooSmall {
                expected: d.data_length,
                supplied: data_out.len(),
            });
        }
        if iops_out.len() < d.iops_length {
            return Err(Error::BufferTooSmall {
                expected: d.iops_length,
                supplied: iops_out.len(),
            });
        }
        let lock = Arc::clone(self.buf_lock.as_ref().ok_or(Error::InvalidState)?);
        let _guard = lock.lock().expect("ppm_buf_lock poisoned");
        data_out[..d.data_length].copy_from_slice(&self.staging[d.data_offset..d.data_offset + d.data_length]);
        iops_out[..d.iops_length].copy_from_slice(&self.staging[d.iops_offset..d.iops_offset + d.iops_length]);
        Ok(())
    }

    pub fn get_iocs(&self, api: u32, slot: u16, subslot: u16, iocs_out: &mut [u8]) -> Result<()> {
        let d = *self.descriptor(api, slot, subslot)?;
        if iocs_out.len() < d.iocs_length {
            return Err(Error::BufferTooSmall {
                expected: d.iocs_length,
                supplied: iocs_out.len(),
            });
        }
        let lock = Arc::clone(self.buf_lock.as_ref().ok_or(Error::InvalidState)?);
        let _guard = lock.lock().expect("ppm_buf_lock poisoned");
        iocs_out[..d.iocs_length].copy_from_slice(&self.staging[d.iocs_offset..d.iocs_offset + d.iocs_length]);
        Ok(())
    }

    pub fn set_data_status_state(&mut self, primary: bool) {
        self.data_status.set_state_primary(primary);
    }

    pub fn set_data_status_redundancy(&mut self, value: bool) {
        self.data_status.set_redundancy(value);
    }

    pub fn set_data_status_provider(&mut self, value: bool) {
        self.data_status.set_provider_state(value);
    }

    /// Set bit 5 of `data_status` across all input/MC-provider IOCRs of an
    /// AR (spec §4.C `set_problem_indicator`): `problem == true` clears the
    /// bit, `problem == false` (OK) sets it.
    pub fn set_problem_indicator(&mut self, problem: bool) {
        let any_input_or_mc = self
            .params
            .descriptors
            .iter()
            .any(|d| d.is_input_or_mc_provider);
        if any_input_or_mc {
            self.data_status.set_station_ok(!problem);
        }
    }

    pub fn data_status(&self) -> DataStatus {
        self.data_status
    }

    pub fn cycle(&self) -> u16 {
        self.cycle
    }

    pub fn send_clock_factor(&self) -> u32 {
        self.params.send_clock_factor
    }

    pub fn reduction_ratio(&self) -> u32 {
        self.params.reduction_ratio
    }

    pub fn compensated_control_interval_us(&self) -> u64 {
        self.compensated_control_interval_us
    }

    pub fn send_buffer(&self) -> Option<&[u8]> {
        self.send_buffer.as_ref().map(|b| b.as_slice())
    }
}

impl Drop for PpmInstance {
    fn drop(&mut self) {
        if self.state == PpmState::Run {
            self.close();
        }
    }
}

/// Across every input/MC-provider IOCR belonging to `ar`, set bit 5 of
/// `data_status` (spec §4.C `set_problem_indicator`, AR-wide form).
pub fn set_problem_indicator_for_ar(instances: &mut [&mut PpmInstance], ar: &Ar, problem: bool) {
    if !ar.in_use {
        return;
    }
    for instance in instances {
        instance.set_problem_indicator(problem);
    }
}

/// A stub timer-action wrapper for wiring `PpmInstance::cyclic_send` into a
/// [`CyclicTimer`] callback; hosts typically close over an `Arc<Mutex<PpmInstance>>`
/// directly instead, this helper documents the expected shape.
pub fn always_continue() -> TimerAction {
    TimerAction::Continue
}

#[allow(dead_code)]
fn _assert_ar_table_object_safe(_: &dyn ArTable) {}
