//! Inbound/outbound JSON message schema (spec.md §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtoError, Result};
use crate::init_config::InitConfig;
use crate::time::{format_iso8601, parse_iso8601};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteRef {
    #[serde(rename = "Station")]
    pub station: String,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "Network")]
    pub network: String,
    #[serde(rename = "Location")]
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Beam {
    #[serde(rename = "BackAzimuth")]
    pub back_azimuth_deg: Option<f64>,
    #[serde(rename = "Slowness")]
    pub slowness_sec_per_deg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HypocenterRef {
    #[serde(rename = "Latitude")]
    pub latitude_deg: f64,
    #[serde(rename = "Longitude")]
    pub longitude_deg: f64,
    #[serde(rename = "Depth")]
    pub depth_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteListEntry {
    #[serde(flatten)]
    pub site: SiteRef,
    #[serde(rename = "Latitude")]
    pub latitude_deg: f64,
    #[serde(rename = "Longitude")]
    pub longitude_deg: f64,
    #[serde(rename = "Elevation", default)]
    pub elevation_km: f64,
    #[serde(rename = "Enable", default = "default_true")]
    pub enable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct SiteListPayload {
    #[serde(rename = "SiteList")]
    sites: Vec<SiteListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct PickPayload {
    #[serde(rename = "Site")]
    site: SiteRef,
    #[serde(rename = "Time", alias = "T")]
    time: String,
    #[serde(rename = "ID", alias = "Pid")]
    id: String,
    #[serde(rename = "Beam", default)]
    beam: Option<Beam>,
}

#[derive(Debug, Clone, Deserialize)]
struct CorrelationPayload {
    #[serde(rename = "Site")]
    site: SiteRef,
    #[serde(rename = "Time", alias = "T")]
    time: String,
    #[serde(rename = "ID", alias = "Pid")]
    id: String,
    #[serde(rename = "Hypocenter")]
    hypocenter: HypocenterRef,
    #[serde(rename = "Correlation", default)]
    correlation_value: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DetectionPayload {
    #[serde(rename = "Hypocenter")]
    hypocenter: HypocenterRef,
    #[serde(rename = "PickData", default)]
    pick_data: Vec<PickPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReqHypoPayload {
    #[serde(rename = "Pid")]
    pid: String,
}

/// A fully-parsed, time-resolved phase pick ready for
/// `Glass::add_pick` (spec.md §6).
#[derive(Debug, Clone)]
pub struct PickInput {
    pub external_id: String,
    pub site: SiteRef,
    pub time_sec: f64,
    pub backazimuth_deg: Option<f64>,
    pub slowness_sec_per_deg: Option<f64>,
}

impl TryFrom<PickPayload> for PickInput {
    type Error = ProtoError;
    fn try_from(p: PickPayload) -> Result<Self> {
        Ok(PickInput {
            external_id: p.id,
            site: p.site,
            time_sec: parse_iso8601(&p.time)?,
            backazimuth_deg: p.beam.and_then(|b| b.back_azimuth_deg),
            slowness_sec_per_deg: p.beam.and_then(|b| b.slowness_sec_per_deg),
        })
    }
}

/// A fully-parsed correlation observation (spec.md §6).
#[derive(Debug, Clone)]
pub struct CorrelationInput {
    pub external_id: String,
    pub site: SiteRef,
    pub time_sec: f64,
    pub hypocenter: HypocenterRef,
    pub correlation_value: f64,
}

impl TryFrom<CorrelationPayload> for CorrelationInput {
    type Error = ProtoError;
    fn try_from(c: CorrelationPayload) -> Result<Self> {
        Ok(CorrelationInput {
            external_id: c.id,
            site: c.site,
            time_sec: parse_iso8601(&c.time)?,
            hypocenter: c.hypocenter,
            correlation_value: c.correlation_value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DetectionInput {
    pub hypocenter: HypocenterRef,
    pub picks: Vec<PickInput>,
}

/// Every inbound message shape the wire format defines (spec.md §6).
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Initialize(InitConfig),
    SiteList(Vec<SiteListEntry>),
    Site(SiteListEntry),
    Pick(PickInput),
    Correlation(CorrelationInput),
    Detection(DetectionInput),
    ReqHypo { pid: String },
}

impl InboundMessage {
    /// Parses one newline-delimited JSON message, dispatching on the
    /// `Cmd` or `Type` discriminator (spec.md §6). Unknown discriminators
    /// and schema mismatches are reported as `ProtoError`, never panics —
    /// callers log and drop per spec.md §7's "malformed input" policy.
    pub fn parse(line: &str) -> Result<InboundMessage> {
        let value: Value = serde_json::from_str(line)?;
        if let Some(cmd) = value.get("Cmd").and_then(Value::as_str) {
            let cmd = cmd.to_string();
            return Self::parse_by_cmd(&cmd, value);
        }
        if let Some(kind) = value.get("Type").and_then(Value::as_str) {
            let kind = kind.to_string();
            return Self::parse_by_type(&kind, value);
        }
        Err(ProtoError::UnknownDiscriminator)
    }

    fn parse_by_cmd(cmd: &str, value: Value) -> Result<InboundMessage> {
        match cmd {
            "Initialize" => Ok(InboundMessage::Initialize(serde_json::from_value(value)?)),
            "SiteList" => {
                let payload: SiteListPayload = serde_json::from_value(value)?;
                Ok(InboundMessage::SiteList(payload.sites))
            }
            "Site" => Ok(InboundMessage::Site(serde_json::from_value(value)?)),
            other => Err(ProtoError::Malformed(format!("unrecognized Cmd: {other}"))),
        }
    }

    fn parse_by_type(kind: &str, value: Value) -> Result<InboundMessage> {
        match kind {
            "Pick" => {
                let payload: PickPayload = serde_json::from_value(value)?;
                Ok(InboundMessage::Pick(payload.try_into()?))
            }
            "Correlation" => {
                let payload: CorrelationPayload = serde_json::from_value(value)?;
                Ok(InboundMessage::Correlation(payload.try_into()?))
            }
            "Detection" => {
                let payload: DetectionPayload = serde_json::from_value(value)?;
                let picks = payload.pick_data.into_iter().map(PickInput::try_from).collect::<Result<Vec<_>>>()?;
                Ok(InboundMessage::Detection(DetectionInput { hypocenter: payload.hypocenter, picks }))
            }
            "ReqHypo" => {
                let payload: ReqHypoPayload = serde_json::from_value(value)?;
                Ok(InboundMessage::ReqHypo { pid: payload.pid })
            }
            other => Err(ProtoError::Malformed(format!("unrecognized Type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OutboundHypoPayload {
    #[serde(rename = "Cmd")]
    cmd: &'static str,
    #[serde(rename = "Pid")]
    pid: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Depth")]
    depth: f64,
    #[serde(rename = "Bayes")]
    bayes: f64,
    #[serde(rename = "NumberOfAssociatedData")]
    number_of_associated_data: usize,
    #[serde(rename = "Data")]
    data: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OutboundCancelPayload {
    #[serde(rename = "Cmd")]
    cmd: &'static str,
    #[serde(rename = "Pid")]
    pid: String,
    #[serde(rename = "Reason")]
    reason: String,
}

/// Every outbound message shape the wire format defines (spec.md §6).
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Hypo { pid: String, time_sec: f64, latitude_deg: f64, longitude_deg: f64, depth_km: f64, bayes: f64, data_ids: Vec<String> },
    Cancel { pid: String, reason: String },
}

impl OutboundMessage {
    /// Serializes to the single-line JSON the wire format expects.
    pub fn to_json_line(&self) -> Result<String> {
        let value = match self {
            OutboundMessage::Hypo { pid, time_sec, latitude_deg, longitude_deg, depth_km, bayes, data_ids } => {
                serde_json::to_string(&OutboundHypoPayload {
                    cmd: "Hypo",
                    pid: pid.clone(),
                    time: format_iso8601(*time_sec),
                    latitude: *latitude_deg,
                    longitude: *longitude_deg,
                    depth: *depth_km,
                    bayes: *bayes,
                    number_of_associated_data: data_ids.len(),
                    data: data_ids.clone(),
                })?
            }
            OutboundMessage::Cancel { pid, reason } => {
                serde_json::to_string(&OutboundCancelPayload { cmd: "Cancel", pid: pid.clone(), reason: reason.clone() })?
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_pick_message() {
        let line = r#"{"Type":"Pick","Site":{"Station":"AAA","Channel":"HHZ","Network":"XX","Location":"00"},"Time":"2024-01-01T00:00:00.000Z","ID":"p1"}"#;
        let msg = InboundMessage::parse(line).unwrap();
        match msg {
            InboundMessage::Pick(p) => {
                assert_eq!(p.external_id, "p1");
                assert_eq!(p.site.station, "AAA");
            }
            other => panic!("expected Pick, got {other:?}"),
        }
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        let line = r#"{"Foo":"Bar"}"#;
        assert!(matches!(InboundMessage::parse(line), Err(ProtoError::UnknownDiscriminator)));
    }

    #[test]
    fn req_hypo_roundtrip() {
        let line = r#"{"Type":"ReqHypo","Pid":"g1"}"#;
        match InboundMessage::parse(line).unwrap() {
            InboundMessage::ReqHypo { pid } => assert_eq!(pid, "g1"),
            other => panic!("expected ReqHypo, got {other:?}"),
        }
    }

    #[test]
    fn hypo_message_serializes_with_wire_field_names() {
        let msg = OutboundMessage::Hypo {
            pid: "g1".into(),
            time_sec: 0.0,
            latitude_deg: 1.0,
            longitude_deg: 2.0,
            depth_km: 10.0,
            bayes: 5.0,
            data_ids: vec!["1".into(), "2".into()],
        };
        let json = msg.to_json_line().unwrap();
        assert!(json.contains("\"Cmd\":\"Hypo\""));
        assert!(json.contains("\"NumberOfAssociatedData\":2"));
    }
}
