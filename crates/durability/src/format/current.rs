//! `0.4` line grammar
//!
//! ```text
//! <filename> <checksum> <state> <millis>[,<replica> <state> <millis>]*
//! ```
//!
//! A defect in the first segment rejects the line. A defect in a replica
//! segment is recorded and parsing continues with the next segment.

use replica_admin_core::{StoreState, Timestamp, UploadState};

use super::{
    check_identity, parse_segment, split_trimmed, LineDefect, LineRecord, SegmentDefect,
    FIELD_DELIMITER, SEGMENT_SEPARATOR,
};

const HEAD_FIELDS: usize = 4;
const SEGMENT_FIELDS: usize = 3;

/// Parse one `0.4` data line
pub fn parse_line(line: &str) -> Result<LineRecord, LineDefect> {
    let segments = split_trimmed(line, SEGMENT_SEPARATOR);
    let head = match segments.first() {
        Some(head) => split_trimmed(head, FIELD_DELIMITER),
        None => return Err(LineDefect::Empty),
    };
    if head.is_empty() {
        return Err(LineDefect::Empty);
    }
    if head.len() != HEAD_FIELDS {
        return Err(LineDefect::HeadFieldCount {
            expected: HEAD_FIELDS,
            found: head.len(),
        });
    }

    let (filename, checksum) = (head[0], head[1]);
    check_identity(filename, checksum)?;
    let state = head[2]
        .parse::<UploadState>()
        .map_err(|_| LineDefect::HeadState {
            filename: filename.to_string(),
            value: head[2].to_string(),
        })?;
    let at = head[3]
        .parse::<Timestamp>()
        .map_err(|_| LineDefect::HeadTimestamp {
            filename: filename.to_string(),
            value: head[3].to_string(),
        })?;

    let mut replicas = Vec::new();
    let mut defects = Vec::new();
    for (index, segment) in segments[1..].iter().enumerate() {
        let fields = split_trimmed(segment, FIELD_DELIMITER);
        let parsed = if fields.len() == SEGMENT_FIELDS {
            parse_segment(index, fields[0], fields[1], Some(fields[2]))
        } else {
            Err(SegmentDefect::FieldCount {
                index,
                expected: SEGMENT_FIELDS,
                found: fields.len(),
            })
        };
        match parsed {
            Ok(segment) => replicas.push(segment),
            Err(defect) => defects.push(defect),
        }
    }

    Ok(LineRecord {
        filename: filename.to_string(),
        checksum: checksum.to_string(),
        head: Some(StoreState::new(state, at)),
        replicas,
        defects,
    })
}
