// ── Network domain types ──

use serde::{Deserialize, Serialize};

/// A network interface bonded by SRTLA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Kernel interface name, e.g. `usb0`.
    pub id: String,
    pub ip: String,
    pub enabled: bool,
    /// Current throughput in bytes per second.
    pub throughput: u64,
    /// Bytes waiting in the send queue.
    pub queued: u64,
}

impl Interface {
    /// Throughput in kbps, the unit belaUI shows.
    pub fn kbps(&self) -> u64 {
        self.throughput.saturating_mul(8) / 1024
    }

    /// Carrying traffic right now.
    pub fn is_reachable(&self) -> bool {
        self.enabled && self.throughput > 0
    }
}

/// A cellular modem managed by belaUI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modem {
    pub id: String,
    /// Network interface the modem exposes, once known.
    pub ifname: Option<String>,
    pub name: Option<String>,
    pub link: Option<ModemLink>,
}

impl Modem {
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(ModemLink::is_connected)
    }
}

/// Radio link state of a modem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemLink {
    /// `connected`, `connecting`, `disconnected`, ...
    pub connection: String,
    pub network: Option<String>,
    pub network_type: Option<String>,
    pub signal: u32,
    pub roaming: bool,
}

impl ModemLink {
    pub fn is_connected(&self) -> bool {
        self.connection.eq_ignore_ascii_case("connected")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kbps_uses_binary_kilo() {
        let iface = Interface {
            throughput: 128_000,
            enabled: true,
            ..Interface::default()
        };
        assert_eq!(iface.kbps(), 1000);
    }

    #[test]
    fn disabled_interface_is_never_reachable() {
        let iface = Interface {
            throughput: 10,
            enabled: false,
            ..Interface::default()
        };
        assert!(!iface.is_reachable());
    }

    #[test]
    fn modem_without_link_is_disconnected() {
        assert!(!Modem::default().is_connected());

        let modem = Modem {
            link: Some(ModemLink {
                connection: "Connected".into(),
                ..ModemLink::default()
            }),
            ..Modem::default()
        };
        assert!(modem.is_connected());
    }
}
