//! Device registry: bidirectional PhysicalID/ICCID ↔ session index.
//!
//! The registry answers "which connection speaks for device X" with O(1)
//! lookups in both directions. Re-registration is last-writer-wins: a new
//! session binding a PhysicalID silently displaces the old session's
//! binding (the old transport keeps running until it closes; only its
//! registry linkage is gone). Binding never fails and lookups of absent
//! devices are a normal case, not an error.
//!
//! The registry is a plain struct owned by the driver; the driver sits
//! behind the runtime's lock, so rebind and snapshot are atomic relative
//! to every reader.

use std::collections::HashMap;

use dny_proto::{Iccid, PhysicalId};

/// The identifiers bound to one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Registered device id, if the session got that far
    pub physical_id: Option<PhysicalId>,
    /// ICCID from the prelude, if one was sent
    pub iccid: Option<Iccid>,
}

/// Bidirectional index of device identifiers to session ids.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    by_physical: HashMap<PhysicalId, u64>,
    by_iccid: HashMap<Iccid, u64>,
    by_session: HashMap<u64, DeviceIdentity>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a PhysicalID to a session, displacing any previous binding.
    ///
    /// Returns the displaced session id when a DIFFERENT session held the
    /// binding; rebinding the same session is a no-op returning `None`.
    pub fn bind_physical(&mut self, physical_id: PhysicalId, session_id: u64) -> Option<u64> {
        let displaced = match self.by_physical.insert(physical_id, session_id) {
            Some(old) if old != session_id => {
                if let Some(identity) = self.by_session.get_mut(&old) {
                    identity.physical_id = None;
                }
                Some(old)
            },
            _ => None,
        };

        self.by_session.entry(session_id).or_default().physical_id = Some(physical_id);
        displaced
    }

    /// Bind an ICCID to a session, displacing any previous binding.
    pub fn bind_iccid(&mut self, iccid: Iccid, session_id: u64) -> Option<u64> {
        let displaced = match self.by_iccid.insert(iccid, session_id) {
            Some(old) if old != session_id => {
                if let Some(identity) = self.by_session.get_mut(&old) {
                    identity.iccid = None;
                }
                Some(old)
            },
            _ => None,
        };

        self.by_session.entry(session_id).or_default().iccid = Some(iccid);
        displaced
    }

    /// Session currently speaking for a device. Total: absent is `None`.
    #[must_use]
    pub fn resolve(&self, physical_id: PhysicalId) -> Option<u64> {
        self.by_physical.get(&physical_id).copied()
    }

    /// Session currently bound to an ICCID.
    #[must_use]
    pub fn resolve_iccid(&self, iccid: Iccid) -> Option<u64> {
        self.by_iccid.get(&iccid).copied()
    }

    /// Identifiers bound to a session.
    #[must_use]
    pub fn identity(&self, session_id: u64) -> Option<DeviceIdentity> {
        self.by_session.get(&session_id).copied()
    }

    /// Remove every mapping that points at a closed session.
    ///
    /// Guarded: entries displaced to another session stay put.
    pub fn unbind_session(&mut self, session_id: u64) -> Option<DeviceIdentity> {
        let identity = self.by_session.remove(&session_id)?;

        if let Some(physical_id) = identity.physical_id {
            if self.by_physical.get(&physical_id) == Some(&session_id) {
                self.by_physical.remove(&physical_id);
            }
        }
        if let Some(iccid) = identity.iccid {
            if self.by_iccid.get(&iccid) == Some(&session_id) {
                self.by_iccid.remove(&iccid);
            }
        }

        Some(identity)
    }

    /// Number of currently bound devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.by_physical.len()
    }

    /// Iterate bound `(PhysicalId, session id)` pairs.
    pub fn bound_devices(&self) -> impl Iterator<Item = (PhysicalId, u64)> + '_ {
        self.by_physical.iter().map(|(&physical_id, &session_id)| (physical_id, session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: u32) -> PhysicalId {
        PhysicalId::new(raw)
    }

    fn iccid() -> Iccid {
        Iccid::parse(b"89860449162390488297").unwrap()
    }

    #[test]
    fn bind_and_resolve() {
        let mut registry = DeviceRegistry::new();

        assert_eq!(registry.bind_physical(pid(0x04A2_6CF3), 1), None);
        assert_eq!(registry.resolve(pid(0x04A2_6CF3)), Some(1));
        assert_eq!(registry.resolve(pid(0xDEAD)), None);
        assert_eq!(registry.device_count(), 1);
    }

    #[test]
    fn rebind_same_session_is_noop() {
        let mut registry = DeviceRegistry::new();
        registry.bind_physical(pid(1), 1);
        assert_eq!(registry.bind_physical(pid(1), 1), None);
        assert_eq!(registry.resolve(pid(1)), Some(1));
    }

    #[test]
    fn rebind_displaces_previous_session() {
        let mut registry = DeviceRegistry::new();
        registry.bind_physical(pid(0x04A2_28CD), 1);

        let displaced = registry.bind_physical(pid(0x04A2_28CD), 2);
        assert_eq!(displaced, Some(1));
        assert_eq!(registry.resolve(pid(0x04A2_28CD)), Some(2));

        // Session 1 no longer reaches the registry through the device.
        assert_eq!(registry.identity(1).unwrap().physical_id, None);
        assert_eq!(registry.identity(2).unwrap().physical_id, Some(pid(0x04A2_28CD)));
    }

    #[test]
    fn unbind_removes_both_directions() {
        let mut registry = DeviceRegistry::new();
        registry.bind_iccid(iccid(), 1);
        registry.bind_physical(pid(7), 1);

        let identity = registry.unbind_session(1).unwrap();
        assert_eq!(identity.physical_id, Some(pid(7)));
        assert_eq!(identity.iccid, Some(iccid()));

        assert_eq!(registry.resolve(pid(7)), None);
        assert_eq!(registry.resolve_iccid(iccid()), None);
        assert_eq!(registry.device_count(), 0);
    }

    #[test]
    fn unbind_displaced_session_leaves_new_binding() {
        let mut registry = DeviceRegistry::new();
        registry.bind_physical(pid(7), 1);
        registry.bind_physical(pid(7), 2);

        registry.unbind_session(1);
        assert_eq!(registry.resolve(pid(7)), Some(2));
    }

    #[test]
    fn unbind_unknown_session_is_none() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.unbind_session(99), None);
    }

    #[test]
    fn bound_devices_iterates_current_bindings() {
        let mut registry = DeviceRegistry::new();
        registry.bind_physical(pid(1), 10);
        registry.bind_physical(pid(2), 20);

        let mut devices: Vec<_> = registry.bound_devices().collect();
        devices.sort_unstable();
        assert_eq!(devices, vec![(pid(1), 10), (pid(2), 20)]);
    }
}
