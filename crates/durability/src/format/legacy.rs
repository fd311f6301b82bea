//! `0.3` line grammar
//!
//! ```text
//! <filename> <checksum> [<replica> <state>]*
//! ```
//!
//! Legacy lines carry no timestamps. An unpaired trailing field is reported
//! as a segment defect at the position it would have occupied.

use super::{
    check_identity, parse_segment, split_trimmed, LineDefect, LineRecord, SegmentDefect,
    FIELD_DELIMITER,
};

/// Parse one `0.3` data line
pub fn parse_line(line: &str) -> Result<LineRecord, LineDefect> {
    let fields = split_trimmed(line, FIELD_DELIMITER);
    let (filename, checksum) = match fields.as_slice() {
        [] => return Err(LineDefect::Empty),
        [filename] => {
            return Err(LineDefect::MissingChecksum {
                filename: filename.to_string(),
            })
        }
        [filename, checksum, ..] => (*filename, *checksum),
    };
    check_identity(filename, checksum)?;

    let mut replicas = Vec::new();
    let mut defects = Vec::new();
    for (index, pair) in fields[2..].chunks(2).enumerate() {
        let parsed = match pair {
            [replica, state] => parse_segment(index, replica, state, None),
            _ => Err(SegmentDefect::FieldCount {
                index,
                expected: 2,
                found: pair.len(),
            }),
        };
        match parsed {
            Ok(segment) => replicas.push(segment),
            Err(defect) => defects.push(defect),
        }
    }

    Ok(LineRecord {
        filename: filename.to_string(),
        checksum: checksum.to_string(),
        head: None,
        replicas,
        defects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_admin_core::UploadState;

    #[test]
    fn test_parse_pairs() {
        let rec = parse_line("f.arc c1 BA1 UPLOAD_COMPLETED BA2 UPLOAD_FAILED").unwrap();
        assert_eq!(rec.filename, "f.arc");
        assert_eq!(rec.checksum, "c1");
        assert!(rec.head.is_none());
        assert_eq!(rec.replicas.len(), 2);
        assert_eq!(rec.replicas[1].state, UploadState::UploadFailed);
        assert!(rec.replicas.iter().all(|s| s.at.is_none()));
        assert!(rec.defects.is_empty());
    }

    #[test]
    fn test_no_replicas() {
        let rec = parse_line("f.arc c1").unwrap();
        assert!(rec.replicas.is_empty());
        assert!(rec.defects.is_empty());
    }

    #[test]
    fn test_filename_only() {
        assert_eq!(
            parse_line("f.arc"),
            Err(LineDefect::MissingChecksum {
                filename: "f.arc".to_string()
            })
        );
    }

    #[test]
    fn test_unpaired_field() {
        let rec = parse_line("f.arc c1 BA1 UPLOAD_COMPLETED BA2").unwrap();
        assert_eq!(rec.replicas.len(), 1);
        assert_eq!(
            rec.defects,
            vec![SegmentDefect::FieldCount {
                index: 1,
                expected: 2,
                found: 1
            }]
        );
    }

    #[test]
    fn test_unknown_state() {
        let rec = parse_line("f.arc c1 BA1 HALF_DONE").unwrap();
        assert!(rec.replicas.is_empty());
        assert_eq!(
            rec.defects,
            vec![SegmentDefect::State {
                index: 0,
                value: "HALF_DONE".to_string()
            }]
        );
    }
}
