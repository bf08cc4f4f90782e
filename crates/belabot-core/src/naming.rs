// ── Interface display names ──
//
// Operators label interfaces ("usb0" → "Verizon") either by interface id or
// by IP address, since some modems come back under a new id after a
// reconnect but keep their address.

use std::collections::{BTreeMap, HashMap};

use crate::model::Interface;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceNames {
    custom: HashMap<String, String>,
}

impl InterfaceNames {
    pub fn new(custom: HashMap<String, String>) -> Self {
        Self { custom }
    }

    /// Display name for an interface. A label keyed by id wins over one
    /// keyed by IP; without either the raw id is used.
    pub fn display(&self, id: &str, ip: Option<&str>) -> String {
        self.custom
            .get(id)
            .or_else(|| ip.and_then(|ip| self.custom.get(ip)))
            .cloned()
            .unwrap_or_else(|| id.to_owned())
    }

    pub fn display_interface(&self, iface: &Interface) -> String {
        self.display(&iface.id, Some(&iface.ip))
    }

    /// Resolve a chat token (raw id or custom label, case-insensitive) to an
    /// interface.
    pub fn resolve<'a>(
        &self,
        token: &str,
        interfaces: &'a BTreeMap<String, Interface>,
    ) -> Option<&'a Interface> {
        let token = token.to_lowercase();

        if let Some(iface) = interfaces
            .values()
            .find(|iface| iface.id.to_lowercase() == token)
        {
            return Some(iface);
        }

        self.custom
            .iter()
            .filter(|(_, label)| label.to_lowercase() == token)
            .find_map(|(key, _)| {
                interfaces
                    .get(key)
                    .or_else(|| interfaces.values().find(|iface| &iface.ip == key))
            })
    }
}
