//! Automatic chat notifications.
//!
//! The [`NotificationEngine`] looks at consecutive snapshots and turns state
//! transitions into chat lines. Boolean signals only speak on an edge, never
//! on the first observation, and every (signal, edge) pair is rate limited
//! by an [`EdgeGate`].

mod gate;

use tokio::time::Instant;

pub use gate::{Edge, EdgeGate};

use crate::command::format;
use crate::config::MonitorConfig;
use crate::model::power::truncate_centivolts;
use crate::model::{EncoderState, Interface, Modem, SubObject};
use crate::naming::InterfaceNames;
use crate::store::StateDiff;

/// Prefix of every automatic message, so chat can tell them from replies.
pub const PREFIX: &str = "BB: ";

pub struct NotificationEngine {
    config: MonitorConfig,
    names: InterfaceNames,
    gate: EdgeGate,
    /// Last declared UPS plugged-in state.
    ups_latch: Option<bool>,
    /// UPS state chat last heard about; trails the latch while gated.
    ups_announced: Option<bool>,
    /// Next periodic network report, while streaming.
    stats_due: Option<Instant>,
}

impl NotificationEngine {
    pub fn new(config: MonitorConfig, names: InterfaceNames) -> Self {
        Self {
            config,
            names,
            gate: EdgeGate::default(),
            ups_latch: None,
            ups_announced: None,
            stats_due: None,
        }
    }

    /// Chat lines for one diff, in rule order.
    pub fn evaluate(&mut self, diff: &StateDiff, now: Instant) -> Vec<String> {
        let mut lines = Vec::new();

        if self.config.modems {
            if diff.touched(SubObject::Interfaces) {
                self.interface_presence(diff, now, &mut lines);
                self.interface_enabled(diff, now, &mut lines);
            }
            if diff.touched(SubObject::Modems) {
                self.modem_links(diff, now, &mut lines);
            }
        }

        if self.config.ups && diff.touched(SubObject::Ups) {
            self.ups(diff, now, &mut lines);
        }

        if self.config.notifications && diff.touched(SubObject::Notifications) {
            self.notifications(diff, now, &mut lines);
        }

        if self.config.network {
            if diff.touched(SubObject::Online) {
                self.encoder_online(diff, now, &mut lines);
            }
            if diff.touched(SubObject::Interfaces) {
                self.reachability(diff, now, &mut lines);
            }
            if diff.touched(SubObject::Interfaces) || diff.touched(SubObject::Stream) {
                self.network_stats(diff, now, &mut lines);
            }
        }

        lines
    }

    // ── Modems ───────────────────────────────────────────────────────

    /// "BB: usb0, usb1 are now connected, wlan0 has disconnected"
    fn interface_presence(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let (Some(prev), Some(cur)) = (&diff.previous.interfaces, &diff.current.interfaces) else {
            return;
        };
        let window = self.config.notification_timeout;

        let mut added = Vec::new();
        for iface in cur.values().filter(|i| !prev.contains_key(&i.id)) {
            if self.gate.allow(&iface.id, Edge::Rising, window, now) {
                added.push(self.names.display_interface(iface));
            }
        }

        let mut removed = Vec::new();
        for iface in prev.values().filter(|i| !cur.contains_key(&i.id)) {
            if self.gate.allow(&iface.id, Edge::Falling, window, now) {
                removed.push(self.names.display_interface(iface));
            }
        }

        let mut parts = Vec::new();
        if !added.is_empty() {
            let verb = if added.len() > 1 { "are" } else { "is" };
            parts.push(format!("{} {verb} now connected", added.join(", ")));
        }
        if !removed.is_empty() {
            let verb = if removed.len() > 1 { "have" } else { "has" };
            parts.push(format!("{} {verb} disconnected", removed.join(", ")));
        }

        if !parts.is_empty() {
            lines.push(format!("{PREFIX}{}", parts.join(", ")));
        }
    }

    fn interface_enabled(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let window = self.config.notification_timeout;

        for (before, after) in common_interfaces(&diff.previous, &diff.current) {
            if before.enabled == after.enabled {
                continue;
            }
            let (edge, state) = if after.enabled {
                (Edge::Rising, "enabled")
            } else {
                (Edge::Falling, "disabled")
            };
            if self.gate.allow(&format!("{}:enabled", after.id), edge, window, now) {
                let name = self.names.display_interface(after);
                lines.push(format!("{PREFIX}{name} has been {state}"));
            }
        }
    }

    fn modem_links(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let (Some(prev), Some(cur)) = (&diff.previous.modems, &diff.current.modems) else {
            return;
        };
        let window = self.config.notification_timeout;

        for (id, after) in cur {
            let Some(before) = prev.get(id) else { continue };
            if before.link.is_none() || before.is_connected() == after.is_connected() {
                continue;
            }

            let label = self.modem_label(after, &diff.current);
            let (edge, line) = if after.is_connected() {
                let network = after
                    .link
                    .as_ref()
                    .and_then(|l| l.network.as_deref())
                    .unwrap_or("unknown network");
                (
                    Edge::Rising,
                    format!("{PREFIX}Modem {label} connected to {network}"),
                )
            } else {
                (Edge::Falling, format!("{PREFIX}Modem {label} lost its connection"))
            };

            if self.gate.allow(&format!("modem:{id}"), edge, window, now) {
                lines.push(line);
            }
        }
    }

    fn modem_label(&self, modem: &Modem, state: &EncoderState) -> String {
        match &modem.ifname {
            Some(ifname) => {
                let ip = state.interface(ifname).map(|i| i.ip.as_str());
                self.names.display(ifname, ip)
            }
            None => modem.name.clone().unwrap_or_else(|| modem.id.clone()),
        }
    }

    // ── UPS ──────────────────────────────────────────────────────────

    fn ups(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let Some(ups) = diff.current.ups else { return };
        let window = self.config.notification_timeout;

        if let Some(before) = diff.previous.ups {
            if before.present != ups.present {
                let (edge, line) = if ups.present {
                    (Edge::Rising, "UPS detected")
                } else {
                    (Edge::Falling, "UPS no longer detected")
                };
                if self.gate.allow("ups:present", edge, window, now) {
                    lines.push(format!("{PREFIX}{line}"));
                }
            }
        }

        let Some(voltage) = ups.voltage else {
            self.ups_latch = None;
            self.ups_announced = None;
            return;
        };

        let voltage = truncate_centivolts(voltage);
        let threshold = self.config.ups_plugged_in;
        let plugged_in = match self.ups_latch {
            None => {
                self.ups_latch = Some(voltage >= threshold);
                self.ups_announced = self.ups_latch;
                return;
            }
            Some(false) if voltage >= threshold => true,
            Some(true) if voltage < threshold - self.config.ups_hysteresis => false,
            Some(latched) => latched,
        };
        self.ups_latch = Some(plugged_in);

        // A change swallowed by the gate is announced once the window
        // reopens, so chat does not keep the stale state.
        if self.ups_announced == Some(plugged_in) {
            return;
        }
        let (edge, line) = if plugged_in {
            (Edge::Rising, "UPS plugged in")
        } else {
            (Edge::Falling, "UPS unplugged")
        };
        if self.gate.allow("ups", edge, window, now) {
            self.ups_announced = Some(plugged_in);
            lines.push(format!("{PREFIX}{line}"));
        }
    }

    // ── belaUI notifications ─────────────────────────────────────────

    fn notifications(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let Some(shown) = &diff.current.notifications else {
            return;
        };
        let window = self.config.notification_timeout;

        for notification in shown {
            if notification.message.is_empty() {
                continue;
            }
            let signal = format!("notification:{}", notification.name);
            if self.gate.allow(&signal, Edge::Rising, window, now) {
                tracing::info!(name = %notification.name, msg = %notification.message, "belaUI notification");
                lines.push(format!("{PREFIX}{}", notification.message));
            }
        }
    }

    // ── Network ──────────────────────────────────────────────────────

    fn encoder_online(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        let (Some(before), Some(after)) = (diff.previous.online, diff.current.online) else {
            return;
        };
        if before == after {
            return;
        }

        let (edge, window, line) = if after {
            (Edge::Rising, self.config.notification_timeout, "BELABOX is back online")
        } else {
            (Edge::Falling, self.config.network_timeout, "BELABOX went offline")
        };
        if self.gate.allow("encoder", edge, window, now) {
            lines.push(format!("{PREFIX}{line}"));
        }
    }

    /// Enabled interfaces that stop or resume carrying traffic mid-stream.
    fn reachability(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        if !(diff.previous.is_streaming() && diff.current.is_streaming()) {
            return;
        }

        for (before, after) in common_interfaces(&diff.previous, &diff.current) {
            if !(before.enabled && after.enabled) || before.is_reachable() == after.is_reachable() {
                continue;
            }

            let name = self.names.display_interface(after);
            let (edge, window, line) = if after.is_reachable() {
                (
                    Edge::Rising,
                    self.config.notification_timeout,
                    format!("{PREFIX}{name} connection restored"),
                )
            } else {
                (
                    Edge::Falling,
                    self.config.network_timeout,
                    format!("{PREFIX}{name} lost connection"),
                )
            };
            if self.gate.allow(&format!("{}:reachable", after.id), edge, window, now) {
                lines.push(line);
            }
        }
    }

    /// Throughput report every `network_timeout` while streaming, the first
    /// one a full window after the stream is seen running.
    fn network_stats(&mut self, diff: &StateDiff, now: Instant, lines: &mut Vec<String>) {
        if !diff.current.is_streaming() {
            self.stats_due = None;
            return;
        }
        let due = *self
            .stats_due
            .get_or_insert(now + self.config.network_timeout);
        if now < due || !diff.touched(SubObject::Interfaces) {
            return;
        }

        match format::stats(&diff.current, &self.names) {
            Ok(report) => {
                self.stats_due = Some(now + self.config.network_timeout);
                lines.push(format!("{PREFIX}{report}"));
            }
            Err(e) => tracing::debug!(error = %e, "no network report"),
        }
    }
}

/// Interfaces present in both snapshots, paired up.
fn common_interfaces<'a>(
    previous: &'a EncoderState,
    current: &'a EncoderState,
) -> Vec<(&'a Interface, &'a Interface)> {
    let (Some(prev), Some(cur)) = (&previous.interfaces, &current.interfaces) else {
        return Vec::new();
    };

    cur.values()
        .filter_map(|after| prev.get(&after.id).map(|before| (before, after)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use belabot_api::Push;
    use belabot_api::protocol::push::{
        Modem as RawModem, ModemStatus, Netif, NotificationMessage, Notifications, RemoteEncoder,
        Sensors, Status,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::StateStore;

    struct Harness {
        store: StateStore,
        engine: NotificationEngine,
        t0: Instant,
    }

    impl Harness {
        fn new(config: MonitorConfig) -> Self {
            let names = InterfaceNames::new([("usb1".to_string(), "Verizon".to_string())].into());
            Self {
                store: StateStore::new(config.ups_plugged_in),
                engine: NotificationEngine::new(config, names),
                t0: Instant::now(),
            }
        }

        fn push(&mut self, push: Push, at_secs: u64) -> Vec<String> {
            let diff = self.store.apply(&push);
            self.engine
                .evaluate(&diff, self.t0 + Duration::from_secs(at_secs))
        }
    }

    fn only(flag: impl FnOnce(&mut MonitorConfig)) -> MonitorConfig {
        let mut config = MonitorConfig {
            modems: false,
            notifications: false,
            ups: false,
            network: false,
            ..MonitorConfig::default()
        };
        flag(&mut config);
        config
    }

    fn volts(v: &str) -> Push {
        Push::Sensors(Sensors {
            soc_voltage: Some(format!("{v} V")),
            ..Sensors::default()
        })
    }

    fn netif(entries: &[(&str, bool, u64)]) -> Push {
        Push::Netif(
            entries
                .iter()
                .map(|&(id, enabled, tp)| {
                    let netif = Netif {
                        ip: format!("10.0.0.{}", id.len()),
                        enabled,
                        tp,
                        ..Netif::default()
                    };
                    (id.to_string(), netif)
                })
                .collect(),
        )
    }

    fn streaming(running: bool) -> Push {
        Push::Status(Status {
            is_streaming: Some(running),
            ..Status::default()
        })
    }

    fn online(online: bool) -> Push {
        Push::Encoder(RemoteEncoder {
            is_encoder_online: online,
            version: None,
        })
    }

    // ── UPS ──────────────────────────────────────────────────────────

    #[test]
    fn ups_plugged_in_after_crossing_threshold() {
        let mut h = Harness::new(only(|c| c.ups = true));

        assert!(h.push(volts("4.9"), 0).is_empty());
        assert_eq!(h.push(volts("5.3"), 1), vec!["BB: UPS plugged in"]);
        assert!(h.push(volts("5.3"), 2).is_empty());
    }

    #[test]
    fn first_ups_reading_never_emits() {
        let mut h = Harness::new(only(|c| c.ups = true));
        assert!(h.push(volts("5.3"), 0).is_empty());
        assert!(h.push(volts("5.25"), 1).is_empty());
    }

    #[test]
    fn noise_inside_hysteresis_band_is_silent() {
        let mut h = Harness::new(only(|c| c.ups = true));

        h.push(volts("5.2"), 0);
        for (i, v) in ["5.09", "5.11", "5.06", "5.10", "5.07"].iter().enumerate() {
            let at = 100 * (u64::try_from(i).unwrap() + 1);
            assert!(h.push(volts(v), at).is_empty(), "voltage {v} should be inside the band");
        }
        assert_eq!(h.push(volts("4.9"), 1000), vec!["BB: UPS unplugged"]);
    }

    #[test]
    fn ups_flapping_inside_window_emits_once_per_direction() {
        let mut h = Harness::new(only(|c| c.ups = true));

        h.push(volts("4.9"), 0);
        assert_eq!(h.push(volts("5.3"), 1), vec!["BB: UPS plugged in"]);
        assert_eq!(h.push(volts("4.9"), 2), vec!["BB: UPS unplugged"]);
        assert!(h.push(volts("5.3"), 3).is_empty());
        assert!(h.push(volts("4.9"), 4).is_empty());
    }

    #[test]
    fn gated_ups_change_is_announced_when_window_reopens() {
        let mut h = Harness::new(only(|c| c.ups = true));

        h.push(volts("4.9"), 0);
        assert_eq!(h.push(volts("5.3"), 1), vec!["BB: UPS plugged in"]);
        assert_eq!(h.push(volts("4.9"), 2), vec!["BB: UPS unplugged"]);
        assert!(h.push(volts("5.3"), 3).is_empty());

        // Power stays on; chat last heard "unplugged".
        assert!(h.push(volts("5.3"), 20).is_empty());
        assert_eq!(h.push(volts("5.3"), 31), vec!["BB: UPS plugged in"]);
        assert!(h.push(volts("5.3"), 62).is_empty());
    }

    #[test]
    fn ups_rule_disabled_stays_silent() {
        let mut h = Harness::new(only(|_| {}));
        h.push(volts("4.9"), 0);
        assert!(h.push(volts("5.3"), 1).is_empty());
    }

    // ── Modems ───────────────────────────────────────────────────────

    #[test]
    fn interface_changes_are_aggregated() {
        let mut h = Harness::new(only(|c| c.modems = true));

        assert!(h.push(netif(&[("wlan0", true, 0)]), 0).is_empty());
        let lines = h.push(netif(&[("usb0", true, 0), ("usb1", true, 0)]), 1);

        assert_eq!(
            lines,
            vec!["BB: usb0, Verizon are now connected, wlan0 has disconnected"]
        );
    }

    #[test]
    fn identical_interface_pushes_are_silent() {
        let mut h = Harness::new(only(|c| c.modems = true));
        let table = [("usb0", true, 100), ("wlan0", true, 200)];

        h.push(netif(&table), 0);
        for at in 1..5 {
            assert!(h.push(netif(&table), at).is_empty());
        }
    }

    #[test]
    fn interface_enable_edges() {
        let mut h = Harness::new(only(|c| c.modems = true));

        h.push(netif(&[("usb0", true, 0), ("usb1", true, 0)]), 0);
        let lines = h.push(netif(&[("usb0", true, 0), ("usb1", false, 0)]), 1);
        assert_eq!(lines, vec!["BB: Verizon has been disabled"]);
    }

    #[test]
    fn modem_connection_edges() {
        let mut h = Harness::new(only(|c| c.modems = true));
        let table = |connection: &str| {
            Push::Modems(BTreeMap::from([(
                "3".to_string(),
                RawModem {
                    ifname: Some("usb1".into()),
                    name: Some("Quectel EG25".into()),
                    status: Some(ModemStatus {
                        connection: connection.into(),
                        network: Some("Verizon Wireless".into()),
                        ..ModemStatus::default()
                    }),
                },
            )]))
        };

        assert!(h.push(table("connected"), 0).is_empty());
        assert_eq!(
            h.push(table("disconnected"), 1),
            vec!["BB: Modem Verizon lost its connection"]
        );
        assert_eq!(
            h.push(table("connected"), 2),
            vec!["BB: Modem Verizon connected to Verizon Wireless"]
        );
        assert!(h.push(table("connected"), 3).is_empty());
    }

    // ── belaUI notifications ─────────────────────────────────────────

    #[test]
    fn notifications_are_rate_limited_per_name() {
        let mut h = Harness::new(only(|c| c.notifications = true));
        let show = |name: &str, msg: &str| {
            Push::Notification(Notifications {
                show: vec![NotificationMessage {
                    name: name.into(),
                    msg: msg.into(),
                    kind: "error".into(),
                    ..NotificationMessage::default()
                }],
                remove: Vec::new(),
            })
        };

        assert_eq!(h.push(show("netif", "usb0 lost"), 0), vec!["BB: usb0 lost"]);
        assert!(h.push(show("netif", "usb0 lost"), 10).is_empty());
        assert_eq!(h.push(show("srt", "SRT timeout"), 11), vec!["BB: SRT timeout"]);
        assert_eq!(h.push(show("netif", "usb0 lost"), 31), vec!["BB: usb0 lost"]);
    }

    // ── Network ──────────────────────────────────────────────────────

    #[test]
    fn encoder_online_edges() {
        let mut h = Harness::new(only(|c| c.network = true));

        assert!(h.push(online(true), 0).is_empty());
        assert!(h.push(online(true), 1).is_empty());
        assert_eq!(h.push(online(false), 2), vec!["BB: BELABOX went offline"]);
        assert_eq!(h.push(online(true), 3), vec!["BB: BELABOX is back online"]);
    }

    #[test]
    fn reachability_only_while_streaming() {
        let mut h = Harness::new(only(|c| c.network = true));
        let table = |usb0_tp: u64| netif(&[("usb0", true, usb0_tp), ("wlan0", true, 500)]);

        h.push(table(500), 0);
        assert!(h.push(table(0), 1).is_empty());

        h.push(streaming(true), 2);
        assert_eq!(h.push(table(500), 3), vec!["BB: usb0 connection restored"]);
        assert_eq!(h.push(table(0), 4), vec!["BB: usb0 lost connection"]);

        // Flapping inside the windows stays quiet.
        assert!(h.push(table(500), 5).is_empty());
        assert!(h.push(table(0), 6).is_empty());
        assert_eq!(
            h.push(table(500), 40),
            vec![
                "BB: usb0 connection restored",
                "BB: usb0: 3 kbps, wlan0: 3 kbps, Total: 6 kbps",
            ]
        );
    }

    #[test]
    fn network_report_every_window_while_streaming() {
        let mut h = Harness::new(only(|c| c.network = true));
        let table = |tp: u64| netif(&[("usb0", true, tp), ("usb1", true, 1024)]);

        assert!(h.push(table(2048), 0).is_empty());
        assert!(h.push(table(2048), 40).is_empty(), "idle encoder");

        h.push(streaming(true), 50);
        assert!(h.push(table(2048), 60).is_empty());
        assert_eq!(
            h.push(table(4096), 80),
            vec!["BB: Verizon: 8 kbps, usb0: 32 kbps, Total: 40 kbps"]
        );
        assert!(h.push(table(4096), 100).is_empty());
        assert_eq!(h.push(table(2048), 110).len(), 1);

        // Stopping resets the schedule.
        h.push(streaming(false), 120);
        h.push(streaming(true), 130);
        assert!(h.push(table(2048), 150).is_empty());
        assert_eq!(h.push(table(2048), 160).len(), 1);
    }
}
