use std::sync::Arc;

use belabot_api::Push;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::merge;
use crate::model::{EncoderState, SubObject};

/// Result of applying one push: the snapshots on both sides and which
/// sub-objects the push replaced.
#[derive(Debug, Clone)]
pub struct StateDiff {
    pub previous: Arc<EncoderState>,
    pub current: Arc<EncoderState>,
    pub changed: Vec<SubObject>,
}

impl StateDiff {
    pub fn touched(&self, sub: SubObject) -> bool {
        self.changed.contains(&sub)
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Canonical encoder snapshot.
///
/// Written only through [`apply`](Self::apply) from the link's receive
/// path. Readers always see a whole snapshot.
pub struct StateStore {
    state: watch::Sender<Arc<EncoderState>>,
    last_push: watch::Sender<Option<DateTime<Utc>>>,
    ups_plugged_in: f64,
}

impl StateStore {
    /// `ups_plugged_in` is the voltage used to derive `Ups::charging`.
    pub fn new(ups_plugged_in: f64) -> Self {
        let (state, _) = watch::channel(Arc::new(EncoderState::default()));
        let (last_push, _) = watch::channel(None);

        Self {
            state,
            last_push,
            ups_plugged_in,
        }
    }

    /// Merge a push into the snapshot.
    pub fn apply(&self, push: &Push) -> StateDiff {
        let current = self.snapshot();
        let mut diff = StateDiff {
            previous: Arc::clone(&current),
            current,
            changed: Vec::new(),
        };

        self.state.send_if_modified(|state| {
            let mut next = EncoderState::clone(state);
            let changed = merge::apply(&mut next, push, self.ups_plugged_in);
            if changed.is_empty() {
                return false;
            }

            let next = Arc::new(next);
            diff = StateDiff {
                previous: std::mem::replace(state, Arc::clone(&next)),
                current: next,
                changed,
            };
            true
        });

        self.last_push.send_replace(Some(Utc::now()));
        tracing::trace!(kind = push.kind(), changed = ?diff.changed, "push applied");
        diff
    }

    // ── Readers ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<EncoderState> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver that wakes on every applied push.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EncoderState>> {
        self.state.subscribe()
    }

    /// When the last push arrived, if any.
    pub fn last_push(&self) -> Option<DateTime<Utc>> {
        *self.last_push.borrow()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use belabot_api::protocol::push::{
        Bitrate, EncoderConfig, Modem, ModemStatus, Netif, RemoteEncoder, Sensors, Status,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn store() -> StateStore {
        StateStore::new(5.1)
    }

    fn modem(ifname: Option<&str>, connection: &str) -> Modem {
        Modem {
            ifname: ifname.map(str::to_owned),
            name: ifname.map(|_| "Quectel".to_owned()),
            status: Some(ModemStatus {
                connection: connection.into(),
                signal: 70,
                ..ModemStatus::default()
            }),
        }
    }

    #[test]
    fn fields_start_unknown() {
        let store = store();
        let snapshot = store.snapshot();

        assert!(snapshot.online.is_none());
        assert!(snapshot.interfaces.is_none());
        assert!(snapshot.ups.is_none());
        assert!(store.last_push().is_none());
    }

    #[test]
    fn apply_reports_previous_and_current() {
        let store = store();
        let diff = store.apply(&Push::Encoder(RemoteEncoder {
            is_encoder_online: true,
            version: None,
        }));

        assert_eq!(diff.changed, vec![SubObject::Online]);
        assert_eq!(diff.previous.online, None);
        assert_eq!(diff.current.online, Some(true));
        assert_eq!(store.snapshot().online, Some(true));
        assert!(store.last_push().is_some());
    }

    #[test]
    fn netif_replaces_whole_table() {
        let store = store();
        let table = |ids: &[&str]| {
            ids.iter()
                .map(|id| {
                    let netif = Netif {
                        ip: "10.0.0.1".into(),
                        enabled: true,
                        ..Netif::default()
                    };
                    ((*id).to_string(), netif)
                })
                .collect::<BTreeMap<_, _>>()
        };

        store.apply(&Push::Netif(table(&["usb0", "wlan0"])));
        let diff = store.apply(&Push::Netif(table(&["usb0"])));

        assert_eq!(diff.previous.interfaces.as_ref().unwrap().len(), 2);
        let current = diff.current.interfaces.as_ref().unwrap();
        assert_eq!(current.keys().collect::<Vec<_>>(), vec!["usb0"]);
    }

    #[test]
    fn sensors_update_ups_with_threshold() {
        let store = store();
        let diff = store.apply(&Push::Sensors(Sensors {
            soc_voltage: Some("5.12 V".into()),
            soc_current: Some("1.2 A".into()),
            soc_temperature: Some("45.0 °C".into()),
        }));

        assert!(diff.touched(SubObject::Ups));
        assert!(diff.touched(SubObject::Sensors));
        let ups = diff.current.ups.unwrap();
        assert!(ups.present);
        assert!(ups.charging);
        assert_eq!(ups.voltage, Some(5.12));
    }

    #[test]
    fn bitrate_and_status_update_stream_settings() {
        let store = store();
        store.apply(&Push::Config(EncoderConfig {
            max_br: 5000,
            srt_latency: 2000,
            ..EncoderConfig::default()
        }));
        store.apply(&Push::Bitrate(Bitrate { max_br: 3250 }));
        let diff = store.apply(&Push::Status(Status {
            is_streaming: Some(true),
            asrcs: Some(vec!["HDMI".into(), "USB audio".into()]),
            available_updates: None,
        }));

        let state = diff.current;
        assert!(state.is_streaming());
        assert_eq!(state.settings().unwrap().max_bitrate, 3250);
        assert_eq!(state.settings().unwrap().latency, 2000);
        assert_eq!(state.audio_sources(), ["HDMI", "USB audio"]);
    }

    #[test]
    fn bitrate_before_config_leaves_settings_unknown() {
        let store = store();
        let diff = store.apply(&Push::Bitrate(Bitrate { max_br: 3250 }));

        assert!(diff.touched(SubObject::Stream));
        assert!(diff.current.settings().is_none());

        let diff = store.apply(&Push::Config(EncoderConfig {
            max_br: 5000,
            ..EncoderConfig::default()
        }));
        assert_eq!(diff.current.settings().unwrap().max_bitrate, 5000);
    }

    #[test]
    fn partial_status_keeps_other_stream_fields() {
        let store = store();
        store.apply(&Push::Status(Status {
            is_streaming: Some(true),
            asrcs: Some(vec!["HDMI".into()]),
            available_updates: None,
        }));
        let diff = store.apply(&Push::Status(Status {
            is_streaming: Some(false),
            ..Status::default()
        }));

        assert!(!diff.current.is_streaming());
        assert_eq!(diff.current.audio_sources(), ["HDMI"]);
    }

    #[test]
    fn status_without_stream_fields_changes_nothing() {
        let store = store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        let diff = store.apply(&Push::Status(Status::default()));

        assert!(diff.is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn modem_status_updates_merge_into_known_modems() {
        let store = store();
        store.apply(&Push::Modems(BTreeMap::from([
            ("1".to_string(), modem(Some("usb0"), "connected")),
            ("2".to_string(), modem(Some("usb1"), "connected")),
        ])));

        let diff = store.apply(&Push::Modems(BTreeMap::from([(
            "2".to_string(),
            modem(None, "disconnected"),
        )])));

        let modems = diff.current.modems.as_ref().unwrap();
        assert_eq!(modems.len(), 2);
        assert_eq!(modems["2"].ifname.as_deref(), Some("usb1"));
        assert_eq!(modems["2"].name.as_deref(), Some("Quectel"));
        assert!(!modems["2"].is_connected());
        assert!(modems["1"].is_connected());
    }

    #[test]
    fn full_modem_table_drops_missing_modems() {
        let store = store();
        store.apply(&Push::Modems(BTreeMap::from([
            ("1".to_string(), modem(Some("usb0"), "connected")),
            ("2".to_string(), modem(Some("usb1"), "connected")),
        ])));

        let diff = store.apply(&Push::Modems(BTreeMap::from([(
            "1".to_string(),
            modem(Some("usb0"), "connected"),
        )])));

        assert_eq!(diff.current.modems.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_whole_snapshots() {
        let store = Arc::new(store());
        let mut rx = store.subscribe();

        store.apply(&Push::Bitrate(Bitrate { max_br: 1000 }));
        rx.changed().await.unwrap();

        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen, store.snapshot());
    }
}
