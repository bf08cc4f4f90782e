// ── Read-only replies ──

use std::fmt::Write as _;

use crate::error::CoreError;
use crate::model::{EncoderState, Modem};
use crate::naming::InterfaceNames;

/// `!bbs`: per-interface throughput, a total when there is more than one
/// interface, and the UPS charge state when a UPS is attached.
pub fn stats(state: &EncoderState, names: &InterfaceNames) -> Result<String, CoreError> {
    let interfaces = state
        .interfaces
        .as_ref()
        .filter(|ifaces| !ifaces.is_empty())
        .ok_or_else(|| CoreError::unavailable("Interfaces"))?;

    let mut total = 0;
    let mut parts: Vec<String> = interfaces
        .values()
        .map(|iface| {
            let name = names.display_interface(iface);
            if iface.enabled {
                total += iface.kbps();
                format!("{name}: {} kbps", iface.kbps())
            } else {
                format!("{name}: disabled")
            }
        })
        .collect();
    parts.sort();

    let mut reply = parts.join(", ");
    if parts.len() > 1 {
        let _ = write!(reply, ", Total: {total} kbps");
    }
    if let Some(ups) = state.ups.filter(|ups| ups.present) {
        reply.push_str(if ups.charging {
            ", UPS: charging"
        } else {
            ", UPS: not charging"
        });
    }

    Ok(reply)
}

/// `!bbsensor`
pub fn sensors(state: &EncoderState) -> Result<String, CoreError> {
    let sensors = state
        .sensors
        .as_ref()
        .ok_or_else(|| CoreError::unavailable("Sensors"))?;

    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_owned());

    Ok(format!(
        "Temp: {}, Voltage: {}, Amps: {}",
        show(&sensors.temperature),
        show(&sensors.voltage),
        show(&sensors.current),
    ))
}

/// `!bbm`: one segment per modem with a link report.
pub fn modems(state: &EncoderState, names: &InterfaceNames) -> Result<String, CoreError> {
    let modems = state
        .modems
        .as_ref()
        .filter(|modems| !modems.is_empty())
        .ok_or_else(|| CoreError::unavailable("Modems"))?;

    let segments: Vec<String> = modems
        .values()
        .filter_map(|modem| modem_segment(state, names, modem))
        .collect();

    if segments.is_empty() {
        return Err(CoreError::unavailable("Modem status"));
    }

    Ok(segments.join(" - "))
}

fn modem_segment(state: &EncoderState, names: &InterfaceNames, modem: &Modem) -> Option<String> {
    let link = modem.link.as_ref()?;

    let label = match &modem.ifname {
        Some(ifname) => {
            let ip = state.interface(ifname).map(|iface| iface.ip.as_str());
            names.display(ifname, ip)
        }
        None => modem.name.clone().unwrap_or_else(|| modem.id.clone()),
    };

    let mut segment = format!(
        "{label}: {} on {}, {}, signal {}",
        link.network_type.as_deref().unwrap_or("?G"),
        link.network.as_deref().unwrap_or("Unknown Network"),
        link.connection,
        link.signal,
    );
    if link.roaming {
        segment.push_str(", roaming");
    }

    Some(segment)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Interface, ModemLink, Sensors, Ups};

    fn iface(id: &str, enabled: bool, throughput: u64) -> (String, Interface) {
        let iface = Interface {
            id: id.into(),
            ip: format!("10.0.0.{}", id.len()),
            enabled,
            throughput,
            queued: 0,
        };
        (id.to_owned(), iface)
    }

    #[test]
    fn stats_lists_sorted_interfaces_with_total() {
        let state = EncoderState {
            interfaces: Some(BTreeMap::from([
                iface("wlan0", true, 64_000),
                iface("usb0", true, 128_000),
                iface("eth0", false, 0),
            ])),
            ups: Some(Ups {
                present: true,
                charging: false,
                ..Ups::default()
            }),
            ..EncoderState::default()
        };
        let names = InterfaceNames::new(HashMap::from([("usb0".into(), "Verizon".into())]));

        assert_eq!(
            stats(&state, &names).unwrap(),
            "Verizon: 1000 kbps, eth0: disabled, wlan0: 500 kbps, Total: 1500 kbps, UPS: not charging"
        );
    }

    #[test]
    fn stats_single_interface_has_no_total() {
        let state = EncoderState {
            interfaces: Some(BTreeMap::from([iface("usb0", true, 128_000)])),
            ..EncoderState::default()
        };

        assert_eq!(
            stats(&state, &InterfaceNames::default()).unwrap(),
            "usb0: 1000 kbps"
        );
    }

    #[test]
    fn stats_without_interfaces_is_unavailable() {
        let err = stats(&EncoderState::default(), &InterfaceNames::default()).unwrap_err();
        assert_eq!(err.to_string(), "Interfaces not available");
    }

    #[test]
    fn sensors_reply() {
        let state = EncoderState {
            sensors: Some(Sensors {
                temperature: Some("45.2 °C".into()),
                voltage: Some("5.12 V".into()),
                current: None,
            }),
            ..EncoderState::default()
        };

        assert_eq!(
            sensors(&state).unwrap(),
            "Temp: 45.2 °C, Voltage: 5.12 V, Amps: N/A"
        );
        assert_eq!(
            sensors(&EncoderState::default()).unwrap_err().to_string(),
            "Sensors not available"
        );
    }

    #[test]
    fn modems_reply_uses_labels_and_fallbacks() {
        let linked = |network: Option<&str>, roaming| {
            Some(ModemLink {
                connection: "connected".into(),
                network: network.map(Into::into),
                network_type: network.map(|_| "5G".into()),
                signal: 70,
                roaming,
            })
        };
        let state = EncoderState {
            modems: Some(BTreeMap::from([
                (
                    "1".to_string(),
                    Modem {
                        id: "1".into(),
                        ifname: Some("usb0".into()),
                        name: Some("Quectel".into()),
                        link: linked(Some("Verizon"), true),
                    },
                ),
                (
                    "2".to_string(),
                    Modem {
                        id: "2".into(),
                        ifname: None,
                        name: Some("Huawei".into()),
                        link: linked(None, false),
                    },
                ),
                (
                    "3".to_string(),
                    Modem {
                        id: "3".into(),
                        ..Modem::default()
                    },
                ),
            ])),
            ..EncoderState::default()
        };
        let names = InterfaceNames::new(HashMap::from([("usb0".into(), "Phone".into())]));

        assert_eq!(
            modems(&state, &names).unwrap(),
            "Phone: 5G on Verizon, connected, signal 70, roaming - Huawei: ?G on Unknown Network, connected, signal 70"
        );
    }
}
