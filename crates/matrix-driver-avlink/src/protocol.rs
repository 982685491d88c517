//! AVLink wire codec.
//!
//! Protocol overview (ASCII over TCP):
//! - Commands: `MT00<OP><P1><P2>NT`, fixed 12 bytes, no trailing delimiter.
//!   `OP` is `SW` (switch) or `BZ` (buzzer); the switch payload is the input
//!   id followed by the output id, both zero-padded to two digits.
//! - Status query: constant `MT00RD0000NT`.
//! - Status reply: `LINK<rec>[;<rec>...];END`, where each record is
//!   `<output2><input2>`.
//!
//! The codec is pure and configuration-free: it knows nothing about which
//! ports exist. Filtering of unconfigured outputs happens in the ingest
//! layer.

use serde::{Deserialize, Serialize};

/// Status query command. The switch answers with a full status reply.
pub const STATUS_QUERY_FRAME: &str = "MT00RD0000NT";

/// Buzzer command with key beep audible.
pub const BUZZER_ON_FRAME: &str = "MT00BZEN00NT";

/// Buzzer command with key beep muted.
pub const BUZZER_MUTE_FRAME: &str = "MT00BZEN01NT";

/// Status reply prefix.
pub const STATUS_PREFIX: &str = "LINK";

/// Status reply terminator.
pub const STATUS_SUFFIX: &str = ";END";

/// Encode a switch command routing `input_id` to `output_id`.
///
/// The wire payload carries the input id before the output id; the firmware
/// rejects the reverse order.
pub fn encode_switch(input_id: u8, output_id: u8) -> String {
    format!("MT00SW{:02}{:02}NT", input_id, output_id)
}

/// Encode a buzzer command.
///
/// The two observed frames toggle the key beep; the firmware documents no
/// wider parameter range, so both literal forms are preserved verbatim.
pub fn encode_buzzer(enabled: bool) -> &'static str {
    if enabled {
        BUZZER_ON_FRAME
    } else {
        BUZZER_MUTE_FRAME
    }
}

/// Encode a status query.
pub fn encode_status_query() -> &'static str {
    STATUS_QUERY_FRAME
}

/// One record of a status reply: the input currently routed to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Two-digit wire id of the output port
    pub output: String,
    /// Two-digit wire id of the routed input port
    pub input: String,
}

/// A fully delimited status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    /// Decoded records in wire order
    pub records: Vec<StatusRecord>,
}

/// Result of attempting to decode a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The buffer held a complete reply.
    Complete(StatusReply),
    /// The buffer is a partial fragment; keep accumulating.
    Incomplete,
}

/// Try to decode an accumulated receive buffer as a status reply.
///
/// A reply is complete only when the buffer both starts with `LINK` and ends
/// with `;END`; anything else is a fragment to be retained and concatenated
/// with the next read. Records shorter than four characters are skipped, which
/// also absorbs the empty leading record of the `LINK;...` delimiter variant
/// some firmware revisions emit.
pub fn try_decode_status(buffer: &str) -> Decoded {
    if !buffer.starts_with(STATUS_PREFIX) || !buffer.ends_with(STATUS_SUFFIX) {
        return Decoded::Incomplete;
    }

    let body = &buffer[STATUS_PREFIX.len()..buffer.len() - STATUS_SUFFIX.len()];
    let records = body
        .split(';')
        .filter_map(|record| {
            let output = record.get(0..2)?;
            let input = record.get(2..4)?;
            Some(StatusRecord {
                output: output.to_string(),
                input: input.to_string(),
            })
        })
        .collect();

    Decoded::Complete(StatusReply { records })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(output: &str, input: &str) -> StatusRecord {
        StatusRecord {
            output: output.into(),
            input: input.into(),
        }
    }

    #[test]
    fn switch_zero_pads_single_digit_ids() {
        for id in 1..=9 {
            let frame = encode_switch(id, id);
            assert_eq!(frame.len(), 12);
            assert_eq!(&frame[6..8], format!("0{}", id));
        }
        assert_eq!(encode_switch(3, 12), "MT00SW0312NT");
    }

    #[test]
    fn switch_leaves_two_digit_ids_unpadded() {
        assert_eq!(encode_switch(12, 10), "MT00SW1210NT");
    }

    #[test]
    fn buzzer_frames_are_literal() {
        assert_eq!(encode_buzzer(true), "MT00BZEN00NT");
        assert_eq!(encode_buzzer(false), "MT00BZEN01NT");
    }

    #[test]
    fn status_query_is_constant() {
        assert_eq!(encode_status_query(), "MT00RD0000NT");
    }

    #[test]
    fn incomplete_for_partial_buffers() {
        assert_eq!(try_decode_status(""), Decoded::Incomplete);
        assert_eq!(try_decode_status("LI"), Decoded::Incomplete);
        assert_eq!(try_decode_status("LINK0102"), Decoded::Incomplete);
        assert_eq!(try_decode_status("0102;END"), Decoded::Incomplete);
    }

    #[test]
    fn decodes_single_record() {
        let Decoded::Complete(reply) = try_decode_status("LINK0102;END") else {
            panic!("expected complete reply");
        };
        assert_eq!(reply.records, vec![record("01", "02")]);
    }

    #[test]
    fn decodes_multiple_records() {
        let Decoded::Complete(reply) = try_decode_status("LINK0102;0304;END") else {
            panic!("expected complete reply");
        };
        assert_eq!(reply.records, vec![record("01", "02"), record("03", "04")]);
    }

    #[test]
    fn chunked_concatenation_matches_one_shot() {
        let mut buffer = String::from("LI");
        assert_eq!(try_decode_status(&buffer), Decoded::Incomplete);

        buffer.push_str("NK0102;END");
        assert_eq!(try_decode_status(&buffer), try_decode_status("LINK0102;END"));
    }

    #[test]
    fn short_records_are_skipped() {
        let Decoded::Complete(reply) = try_decode_status("LINK;0102;03;END") else {
            panic!("expected complete reply");
        };
        assert_eq!(reply.records, vec![record("01", "02")]);
    }

    #[test]
    fn long_records_decode_leading_four_chars() {
        let Decoded::Complete(reply) = try_decode_status("LINK010299;END") else {
            panic!("expected complete reply");
        };
        assert_eq!(reply.records, vec![record("01", "02")]);
    }

    #[test]
    fn empty_body_yields_no_records() {
        let Decoded::Complete(reply) = try_decode_status("LINK;END") else {
            panic!("expected complete reply");
        };
        assert!(reply.records.is_empty());
    }
}
