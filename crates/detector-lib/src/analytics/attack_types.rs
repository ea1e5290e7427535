//! Rule-based attack pattern tagging
//!
//! Tags a validated feature vector with the named traffic patterns its
//! standardized values exceed. Tags describe the connection; they do not
//! change the model verdict. Features absent from the vector read as 0.

use crate::models::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named traffic pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttackType {
    DoS,
    Fuzzer,
    #[serde(rename = "Port_Scan")]
    PortScan,
    #[serde(rename = "Brute_Force")]
    BruteForce,
    Reconnaissance,
    #[serde(rename = "Anomalous_IP")]
    AnomalousIp,
    #[serde(rename = "High_Bandwidth")]
    HighBandwidth,
    #[serde(rename = "Suspicious_TCP")]
    SuspiciousTcp,
    #[serde(rename = "Replay_Attack")]
    ReplayAttack,
    #[serde(rename = "Abnormal_Packet")]
    AbnormalPacket,
    #[serde(rename = "Session_Hijacking")]
    SessionHijacking,
    #[serde(rename = "Jitter_Anomaly")]
    JitterAnomaly,
    Slowloris,
    #[serde(rename = "Service_Abuse")]
    ServiceAbuse,
    #[serde(rename = "Traffic_Correlation")]
    TrafficCorrelation,
    #[serde(rename = "Worm_Spread")]
    WormSpread,
    #[serde(rename = "Timing_Attack")]
    TimingAttack,
    /// Attack verdict with no matching pattern
    Other,
}

impl AttackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::DoS => "DoS",
            AttackType::Fuzzer => "Fuzzer",
            AttackType::PortScan => "Port_Scan",
            AttackType::BruteForce => "Brute_Force",
            AttackType::Reconnaissance => "Reconnaissance",
            AttackType::AnomalousIp => "Anomalous_IP",
            AttackType::HighBandwidth => "High_Bandwidth",
            AttackType::SuspiciousTcp => "Suspicious_TCP",
            AttackType::ReplayAttack => "Replay_Attack",
            AttackType::AbnormalPacket => "Abnormal_Packet",
            AttackType::SessionHijacking => "Session_Hijacking",
            AttackType::JitterAnomaly => "Jitter_Anomaly",
            AttackType::Slowloris => "Slowloris",
            AttackType::ServiceAbuse => "Service_Abuse",
            AttackType::TrafficCorrelation => "Traffic_Correlation",
            AttackType::WormSpread => "Worm_Spread",
            AttackType::TimingAttack => "Timing_Attack",
            AttackType::Other => "Other",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strong deviation from the training mean
const HIGH: f64 = 1.5;
/// Moderate deviation from the training mean
const ELEVATED: f64 = 1.0;
/// Binary flags are standardized around 0
const FLAG_SET: f64 = 0.5;

/// Patterns matched by `features`, in declaration order
///
/// Magnitudes are compared on absolute values. The two checks on a low value
/// (`response_body_len`, `dur`) use the signed value.
pub fn detect_attack_types(features: &FeatureVector) -> Vec<AttackType> {
    let signed = |name: &str| features.get(name).unwrap_or(0.0);
    let abs = |name: &str| signed(name).abs();

    let sload = abs("sload");
    let dload = abs("dload");
    let dur = abs("dur");
    let trans_depth = abs("trans_depth");

    let rules = [
        (
            AttackType::DoS,
            sload > HIGH || dload > HIGH || abs("spkts") > HIGH || abs("dpkts") > HIGH,
        ),
        (
            AttackType::Fuzzer,
            trans_depth > HIGH || signed("response_body_len") < -HIGH,
        ),
        (
            AttackType::PortScan,
            abs("ct_src_dport_ltm") > HIGH || abs("ct_dst_sport_ltm") > HIGH,
        ),
        (
            AttackType::BruteForce,
            abs("is_ftp_login") > FLAG_SET && abs("ct_ftp_cmd") > FLAG_SET,
        ),
        (AttackType::Reconnaissance, abs("ct_dst_ltm") > HIGH),
        (AttackType::AnomalousIp, abs("is_sm_ips_ports") > HIGH),
        (AttackType::HighBandwidth, sload > ELEVATED || dload > ELEVATED),
        (
            AttackType::SuspiciousTcp,
            abs("tcprtt") > ELEVATED || abs("synack") > ELEVATED || abs("ackdat") > ELEVATED,
        ),
        (
            AttackType::ReplayAttack,
            abs("stcpb") > HIGH || abs("dtcpb") > HIGH,
        ),
        (
            AttackType::AbnormalPacket,
            abs("smean") > HIGH || abs("dmean") > HIGH,
        ),
        (
            AttackType::SessionHijacking,
            abs("state") > ELEVATED && signed("dur") < -ELEVATED,
        ),
        (
            AttackType::JitterAnomaly,
            abs("sjit") > ELEVATED || abs("djit") > ELEVATED,
        ),
        (AttackType::Slowloris, dur > ELEVATED && trans_depth > ELEVATED),
        (
            AttackType::ServiceAbuse,
            abs("ct_srv_src") > ELEVATED || abs("ct_srv_dst") > ELEVATED,
        ),
        (
            AttackType::TrafficCorrelation,
            abs("ct_dst_src_ltm") > ELEVATED && abs("ct_src_ltm") > ELEVATED,
        ),
        (
            AttackType::WormSpread,
            sload > ELEVATED && dload > ELEVATED && dur > ELEVATED,
        ),
        (
            AttackType::TimingAttack,
            abs("sinpkt") > ELEVATED || abs("dinpkt") > ELEVATED,
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(kind, matched)| matched.then_some(kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureSchema, RawFeatureMap, RawValue};
    use crate::predictor::validate;

    fn vector(pairs: &[(&str, f64)]) -> FeatureVector {
        let schema = FeatureSchema::new(pairs.iter().map(|(k, _)| *k));
        let raw: RawFeatureMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RawValue::Number(*v)))
            .collect();
        validate(&raw, &schema).unwrap()
    }

    #[test]
    fn test_quiet_traffic_has_no_patterns() {
        let features = vector(&[("sload", 0.2), ("dur", -0.3), ("tcprtt", 0.9)]);
        assert!(detect_attack_types(&features).is_empty());
        assert!(detect_attack_types(&vector(&[])).is_empty());
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert!(detect_attack_types(&vector(&[("ct_dst_ltm", 1.5)])).is_empty());
        assert_eq!(
            detect_attack_types(&vector(&[("ct_dst_ltm", 1.51)])),
            vec![AttackType::Reconnaissance]
        );

        assert!(detect_attack_types(&vector(&[("sinpkt", 1.0)])).is_empty());
        assert_eq!(
            detect_attack_types(&vector(&[("sinpkt", -1.01)])),
            vec![AttackType::TimingAttack]
        );
    }

    #[test]
    fn test_load_spike_tags_dos_and_bandwidth() {
        assert_eq!(
            detect_attack_types(&vector(&[("sload", 1.2)])),
            vec![AttackType::HighBandwidth]
        );
        assert_eq!(
            detect_attack_types(&vector(&[("sload", -1.8)])),
            vec![AttackType::DoS, AttackType::HighBandwidth]
        );
        assert_eq!(
            detect_attack_types(&vector(&[("sload", 1.2), ("dload", 1.1), ("dur", 1.3)])),
            vec![AttackType::HighBandwidth, AttackType::WormSpread]
        );
    }

    #[test]
    fn test_conjunctive_rules_need_every_feature() {
        assert!(detect_attack_types(&vector(&[("is_ftp_login", 0.6)])).is_empty());
        assert_eq!(
            detect_attack_types(&vector(&[("is_ftp_login", 0.6), ("ct_ftp_cmd", 0.6)])),
            vec![AttackType::BruteForce]
        );

        assert!(detect_attack_types(&vector(&[("ct_dst_src_ltm", 1.2)])).is_empty());
        assert_eq!(
            detect_attack_types(&vector(&[("ct_dst_src_ltm", 1.2), ("ct_src_ltm", -1.2)])),
            vec![AttackType::TrafficCorrelation]
        );
    }

    #[test]
    fn test_low_value_checks_use_sign() {
        assert!(detect_attack_types(&vector(&[("response_body_len", 1.8)])).is_empty());
        assert_eq!(
            detect_attack_types(&vector(&[("response_body_len", -1.8)])),
            vec![AttackType::Fuzzer]
        );

        assert_eq!(
            detect_attack_types(&vector(&[("state", 1.2), ("dur", -1.2)])),
            vec![AttackType::SessionHijacking]
        );
        assert!(detect_attack_types(&vector(&[("state", 1.2), ("dur", 0.8)])).is_empty());
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&AttackType::PortScan).unwrap(),
            "\"Port_Scan\""
        );
        assert_eq!(AttackType::SuspiciousTcp.to_string(), "Suspicious_TCP");
    }
}
