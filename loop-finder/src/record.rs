use std::num::ParseIntError;
use std::str::Utf8Error;

use loop_crab::helpers::ip::{Address, AddressFormatError};
use thiserror::Error;

/// Column layout of yarrp's text output.
pub const FIELD_COUNT: usize = 15;
const TARGET: usize = 0;
const ICMP_TYPE: usize = 3;
const SENT_TTL: usize = 5;
const ACTUAL_FROM: usize = 6;

const TIME_EXCEEDED: &str = "11";

/// A TTL exceeded response: `actual_from` answered for the probe towards
/// `target` that was sent with TTL `sent_ttl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeExceeded {
    pub target: Address,
    pub sent_ttl: i64,
    pub actual_from: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLine {
    TimeExceeded(TimeExceeded),
    /// Any other ICMP type; its remaining fields are not looked at.
    Other,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("line is not valid UTF-8")]
    Encoding(#[from] Utf8Error),

    #[error("expected {} fields, found {}", FIELD_COUNT, .0)]
    FieldCount(usize),

    #[error("invalid {field} address")]
    Address {
        field: &'static str,
        source: AddressFormatError,
    },

    #[error("invalid hop number `{value}`")]
    HopNumber {
        value: String,
        source: ParseIntError,
    },
}

/// Splits `line` (without its terminator) at `delimiter` and interprets the
/// fields. Empty fields count, so two adjacent delimiters yield an empty one.
pub fn parse(line: &str, delimiter: char) -> Result<ParsedLine, RecordError> {
    use RecordError as E;

    let mut record = [""; FIELD_COUNT];
    let mut found = 0;
    for field in line.split(delimiter) {
        if let Some(slot) = record.get_mut(found) {
            *slot = field;
        }
        found += 1;
    }
    if found != FIELD_COUNT {
        return Err(E::FieldCount(found));
    }
    if record[ICMP_TYPE] != TIME_EXCEEDED {
        return Ok(ParsedLine::Other);
    }

    let target = record[TARGET]
        .parse::<Address>()
        .map_err(|source| E::Address {
            field: "target",
            source,
        })?;
    let sent_ttl = record[SENT_TTL]
        .parse::<i64>()
        .map_err(|source| E::HopNumber {
            value: record[SENT_TTL].to_string(),
            source,
        })?;
    let actual_from = record[ACTUAL_FROM]
        .parse::<Address>()
        .map_err(|source| E::Address {
            field: "responder",
            source,
        })?;

    Ok(ParsedLine::TimeExceeded(TimeExceeded {
        target,
        sent_ttl,
        actual_from,
    }))
}

#[cfg(test)]
mod tests {
    use assertor::*;
    use loop_crab::test_utils::{addr, yarrp_line};

    use super::*;

    #[test]
    fn parses_time_exceeded() {
        // given
        let line = "100.3.71.100 1650218570 935332 11 0 252 172.99.45.250 211626 21085 40 96 245 0 24226:1 239158637";
        // when
        let parsed = parse(line, ' ');
        // then
        assert_that!(parsed).is_equal_to(Ok(ParsedLine::TimeExceeded(TimeExceeded {
            target: addr("100.3.71.100"),
            sent_ttl: 252,
            actual_from: addr("172.99.45.250"),
        })));
    }

    #[test]
    fn other_types_are_not_parsed_further() {
        // given
        let line = yarrp_line("not-an-ip", 3, 4, "neither");
        // when, then
        assert_that!(parse(&line, ' ')).is_equal_to(Ok(ParsedLine::Other));
    }

    #[test]
    fn type_is_compared_as_text() {
        // given
        let line = yarrp_line("10.0.0.1", 11, 4, "1.1.1.1").replacen(" 11 ", " 011 ", 1);
        // when, then
        assert_that!(parse(&line, ' ')).is_equal_to(Ok(ParsedLine::Other));
    }

    #[test]
    fn wrong_field_count_is_an_error_for_any_type() {
        for line in [
            "10.0.0.1 1 2 11 0 4 1.1.1.1 a b c",
            "10.0.0.1 1 2 0 0 4 1.1.1.1 a b c d e f g h i",
        ] {
            let res = parse(line, ' ');
            assert!(
                matches!(res, Err(RecordError::FieldCount(_))),
                "expected field count error for {}, got {:?}",
                line,
                res
            );
        }
    }

    #[test]
    fn empty_line_has_a_single_empty_field() {
        assert_that!(parse("", ' ')).is_equal_to(Err(RecordError::FieldCount(1)));
    }

    #[test]
    fn bad_values_on_time_exceeded_are_errors() {
        let bad_target = parse(&yarrp_line("10.0.0", 11, 4, "1.1.1.1"), ' ');
        let bad_from = parse(&yarrp_line("10.0.0.1", 11, 4, "1.1.1.x"), ' ');
        let bad_hop = parse(
            &yarrp_line("10.0.0.1", 11, 4, "1.1.1.1").replacen(" 4 ", " four ", 1),
            ' ',
        );

        assert!(matches!(
            bad_target,
            Err(RecordError::Address {
                field: "target",
                ..
            })
        ));
        assert!(matches!(
            bad_from,
            Err(RecordError::Address {
                field: "responder",
                ..
            })
        ));
        assert!(matches!(bad_hop, Err(RecordError::HopNumber { .. })));
    }

    #[test]
    fn negative_hop_numbers_parse() {
        let parsed = parse(&yarrp_line("10.0.0.1", 11, -1, "1.1.1.1"), ' ');
        assert_that!(parsed).is_ok();
    }
}
