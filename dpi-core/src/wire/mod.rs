//! Wire formats: the captured packet projection, the sideband match-report
//! UDP payload, and the IP-option-carried report variant.

pub mod ip_option;
pub mod packet;
pub mod report;

pub use ip_option::{OptionReport, OptionReports, IP_OPTION_REPORT_TYPE};
pub use packet::{FiveTuple, PacketEnvelope, Proto};
pub use report::{MatchReport, SidebandPacket, MAGIC};
