//! Fake collaborators shared by the integration tests, standing in for the
//! platform-specific AR table, raw Ethernet socket, and diagnostic registry
//! a real host would supply (spec.md §6).

use std::sync::Mutex;

use pn_rt_core::collaborators::{
    AddressSource, Ar, ArTable, DiagnosticItem, DiagnosticRegistry, RawEthernet,
};

pub struct FakeEth {
    pub cyclic: Mutex<Vec<Vec<u8>>>,
    pub lldp: Mutex<Vec<Vec<u8>>>,
}

impl FakeEth {
    pub fn new() -> FakeEth {
        FakeEth {
            cyclic: Mutex::new(Vec::new()),
            lldp: Mutex::new(Vec::new()),
        }
    }
}

impl RawEthernet for FakeEth {
    fn send(&self, frame: &[u8]) -> std::io::Result<usize> {
        self.cyclic.lock().unwrap().push(frame.to_vec());
        Ok(frame.len())
    }

    fn send_lldp(&self, frame: &[u8]) -> std::io::Result<usize> {
        self.lldp.lock().unwrap().push(frame.to_vec());
        Ok(frame.len())
    }
}

pub struct FakeAddressSource(pub u32);

impl AddressSource for FakeAddressSource {
    fn ipv4(&self) -> u32 {
        self.0
    }
}

pub struct FakeArTable {
    pub ars: Vec<Ar>,
}

impl ArTable for FakeArTable {
    fn ars(&self) -> &[Ar] {
        &self.ars
    }
}

#[derive(Default)]
pub struct FakeDiagnosticRegistry {
    pub updates: Mutex<Vec<(usize, DiagnosticItem)>>,
    pub adds: Mutex<Vec<(usize, DiagnosticItem)>>,
    pub notifications: Mutex<Vec<usize>>,
}

impl DiagnosticRegistry for FakeDiagnosticRegistry {
    fn diag_update(
        &self,
        ar_index: usize,
        _api: u32,
        _slot: u16,
        _subslot: u16,
        item: &DiagnosticItem,
    ) -> bool {
        self.updates.lock().unwrap().push((ar_index, *item));
        false
    }

    fn diag_add(&self, ar_index: usize, _api: u32, _slot: u16, _subslot: u16, item: &DiagnosticItem) {
        self.adds.lock().unwrap().push((ar_index, *item));
    }

    fn alarm_send_port_change_notification(
        &self,
        ar_index: usize,
        _api: u32,
        _slot: u16,
        _subslot: u16,
        _module_ident: u32,
        _submodule_ident: u32,
        _item: &DiagnosticItem,
    ) {
        self.notifications.lock().unwrap().push(ar_index);
    }
}
