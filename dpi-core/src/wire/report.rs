//! Sideband match-report UDP payload (§6): a fixed magic number, a report
//! count, the sequence key of the data packet being described, a flow
//! offset, and an array of `{rule_id, start_index}` pairs.

/// Fixed magic number identifying a sideband report UDP payload, network
/// order, at offset 0.
pub const MAGIC: u16 = 0xDEE4;

const OFFSET_MAGIC: usize = 0;
const OFFSET_COUNT: usize = 2;
const OFFSET_SEQNUM: usize = 4;
const OFFSET_FLOW_OFF: usize = 8;
const OFFSET_REPORTS_START: usize = 12;
const REPORT_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchReport {
    pub rule_id: u16,
    /// Byte offset within the flow where the rule matched.
    pub start_index: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebandPacket {
    pub flow_seq_key: u32,
    pub flow_offset: u32,
    pub reports: Vec<MatchReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportParseError {
    TooShort,
    BadMagic,
    TruncatedReports,
}

impl SidebandPacket {
    /// True when `payload`'s first two bytes equal the sideband magic
    /// number (§4.2 classification step).
    pub fn looks_like_sideband(payload: &[u8]) -> bool {
        payload.len() >= 2 && u16::from_be_bytes([payload[0], payload[1]]) == MAGIC
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ReportParseError> {
        if payload.len() < OFFSET_REPORTS_START {
            return Err(ReportParseError::TooShort);
        }
        let magic = u16::from_be_bytes([payload[OFFSET_MAGIC], payload[OFFSET_MAGIC + 1]]);
        if magic != MAGIC {
            return Err(ReportParseError::BadMagic);
        }
        let count = u16::from_be_bytes([payload[OFFSET_COUNT], payload[OFFSET_COUNT + 1]]) as usize;
        let flow_seq_key = u32::from_be_bytes(payload[OFFSET_SEQNUM..OFFSET_SEQNUM + 4].try_into().unwrap());
        let flow_offset = u32::from_be_bytes(payload[OFFSET_FLOW_OFF..OFFSET_FLOW_OFF + 4].try_into().unwrap());

        let need = OFFSET_REPORTS_START + count * REPORT_SIZE;
        if payload.len() < need {
            return Err(ReportParseError::TruncatedReports);
        }

        let mut reports = Vec::with_capacity(count);
        for i in 0..count {
            let base = OFFSET_REPORTS_START + i * REPORT_SIZE;
            let rule_id = u16::from_be_bytes([payload[base], payload[base + 1]]);
            let start_index = i16::from_be_bytes([payload[base + 2], payload[base + 3]]);
            reports.push(MatchReport { rule_id, start_index });
        }

        Ok(Self { flow_seq_key, flow_offset, reports })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OFFSET_REPORTS_START + self.reports.len() * REPORT_SIZE);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&(self.reports.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.flow_seq_key.to_be_bytes());
        out.extend_from_slice(&self.flow_offset.to_be_bytes());
        for r in &self.reports {
            out.extend_from_slice(&r.rule_id.to_be_bytes());
            out.extend_from_slice(&r.start_index.to_be_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let pkt = SidebandPacket {
            flow_seq_key: 0x0000_1000,
            flow_offset: 0,
            reports: vec![MatchReport { rule_id: 42, start_index: 7 }],
        };
        let bytes = pkt.encode();
        assert!(SidebandPacket::looks_like_sideband(&bytes));
        let decoded = SidebandPacket::decode(&bytes).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = SidebandPacket { flow_seq_key: 1, flow_offset: 0, reports: vec![] }.encode();
        bytes[0] = 0;
        assert_eq!(SidebandPacket::decode(&bytes).unwrap_err(), ReportParseError::BadMagic);
    }

    #[test]
    fn rejects_truncated_report_array() {
        let mut bytes = SidebandPacket {
            flow_seq_key: 1,
            flow_offset: 0,
            reports: vec![MatchReport { rule_id: 1, start_index: 1 }],
        }
        .encode();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(SidebandPacket::decode(&bytes).unwrap_err(), ReportParseError::TruncatedReports);
    }
}
