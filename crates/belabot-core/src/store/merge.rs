// ── Push merging ──
//
// Each push replaces the sub-object(s) it targets. The returned list names
// what was replaced, whether or not the value differs.

use std::collections::BTreeMap;

use belabot_api::Push;
use belabot_api::protocol::push;

use crate::convert;
use crate::model::{EncoderState, Modem, Notification, Sensors, Stream, SubObject, Ups};

pub(super) fn apply(state: &mut EncoderState, push: &Push, ups_plugged_in: f64) -> Vec<SubObject> {
    match push {
        Push::Config(config) => {
            let mut stream = state.stream.clone().unwrap_or_default();
            stream.settings = Some(config.into());
            state.stream = Some(stream);
            vec![SubObject::Stream]
        }
        Push::Encoder(remote) => {
            state.online = Some(remote.is_encoder_online);
            vec![SubObject::Online]
        }
        Push::Netif(netif) => {
            state.interfaces = Some(convert::interfaces(netif));
            vec![SubObject::Interfaces]
        }
        Push::Modems(modems) => {
            state.modems = Some(merge_modems(state.modems.as_ref(), modems));
            vec![SubObject::Modems]
        }
        Push::Sensors(sensors) => {
            let parsed = |raw: &Option<String>| raw.as_deref().and_then(push::parse_reading);
            state.ups = Some(Ups::from_readings(
                parsed(&sensors.soc_voltage),
                parsed(&sensors.soc_current),
                ups_plugged_in,
            ));
            state.sensors = Some(Sensors::from(sensors));
            vec![SubObject::Sensors, SubObject::Ups]
        }
        Push::Status(status) => {
            if status.is_streaming.is_none() && status.asrcs.is_none() {
                return Vec::new();
            }
            let mut stream = state.stream.clone().unwrap_or_default();
            if let Some(running) = status.is_streaming {
                stream.running = running;
            }
            if let Some(asrcs) = &status.asrcs {
                stream.audio_sources.clone_from(asrcs);
            }
            state.stream = Some(stream);
            vec![SubObject::Stream]
        }
        Push::Notification(notifications) => {
            state.notifications = Some(
                notifications
                    .show
                    .iter()
                    .map(Notification::from)
                    .collect(),
            );
            vec![SubObject::Notifications]
        }
        Push::Bitrate(bitrate) => {
            let mut stream: Stream = state.stream.clone().unwrap_or_default();
            match stream.settings.as_mut() {
                Some(settings) => settings.max_bitrate = bitrate.max_br,
                // The next config push carries max_br as well.
                None => tracing::debug!(max_br = bitrate.max_br, "bitrate before config, ignored"),
            }
            state.stream = Some(stream);
            vec![SubObject::Stream]
        }
        Push::Pipelines(pipelines) => {
            state.pipelines = Some(
                pipelines
                    .iter()
                    .map(|(id, p)| (id.clone(), convert::pipeline(id, p)))
                    .collect(),
            );
            vec![SubObject::Pipelines]
        }
        Push::Revisions(revisions) => {
            state.revisions = Some(revisions.clone());
            vec![SubObject::Revisions]
        }
    }
}

/// belaUI sends the full modem table (every entry carries `ifname`) on
/// connect and when modems come or go, and status-only entries in between.
fn merge_modems(
    current: Option<&BTreeMap<String, Modem>>,
    incoming: &BTreeMap<String, push::Modem>,
) -> BTreeMap<String, Modem> {
    let full_table = incoming.values().all(|m| m.ifname.is_some());
    let mut next = if full_table {
        BTreeMap::new()
    } else {
        current.cloned().unwrap_or_default()
    };

    for (id, raw) in incoming {
        let update = convert::modem(id, raw);
        match next.get_mut(id) {
            Some(existing) if raw.ifname.is_none() => {
                if update.name.is_some() {
                    existing.name = update.name;
                }
                if update.link.is_some() {
                    existing.link = update.link;
                }
            }
            _ => {
                next.insert(id.clone(), update);
            }
        }
    }

    next
}
