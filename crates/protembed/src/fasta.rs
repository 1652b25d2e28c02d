use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ExtractError;

/// One FASTA record. The id is the header token up to the first whitespace,
/// the rest of the header line becomes the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub description: Option<String>,
    pub sequence: String,
}

/// Read all records from a FASTA file.
///
/// Syntax errors are fatal and carry the offending 1-based line number.
/// Sequences are uppercased; the accepted residue alphabet is ASCII letters
/// plus `*`, `-` and `.` so that stop codons and alignment gaps pass
/// through to the tokenizer, which maps anything it does not know to its
/// unknown token.
pub fn read_fasta(path: &Path) -> Result<Vec<SeqRecord>, ExtractError> {
    let file =
        File::open(path).map_err(|e| ExtractError::Io(format!("{}: {}", path.display(), e)))?;
    parse_fasta(BufReader::new(file))
}

fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<SeqRecord>, ExtractError> {
    let mut records: Vec<SeqRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current: Option<(String, Option<String>, usize)> = None;
    let mut sequence = String::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| ExtractError::Io(e.to_string()))?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('>') {
            if let Some((id, description, header_line)) = current.take() {
                if sequence.is_empty() {
                    return Err(ExtractError::Parse {
                        line: header_line,
                        message: format!("record '{}' has no sequence", id),
                    });
                }
                records.push(SeqRecord {
                    id,
                    description,
                    sequence: std::mem::take(&mut sequence),
                });
            }
            let mut parts = rest.splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or_default().to_string();
            if id.is_empty() {
                return Err(ExtractError::Parse {
                    line: line_no,
                    message: "header has no identifier".to_string(),
                });
            }
            if !seen.insert(id.clone()) {
                return Err(ExtractError::Parse {
                    line: line_no,
                    message: format!("duplicate sequence id '{}'", id),
                });
            }
            let description = parts
                .next()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
            current = Some((id, description, line_no));
        } else {
            if current.is_none() {
                return Err(ExtractError::Parse {
                    line: line_no,
                    message: "sequence data before the first '>' header".to_string(),
                });
            }
            for c in line.chars() {
                if !(c.is_ascii_alphabetic() || matches!(c, '*' | '-' | '.')) {
                    return Err(ExtractError::Parse {
                        line: line_no,
                        message: format!("invalid residue character '{}'", c),
                    });
                }
            }
            sequence.push_str(&line.to_ascii_uppercase());
        }
    }
    if let Some((id, description, header_line)) = current.take() {
        if sequence.is_empty() {
            return Err(ExtractError::Parse {
                line: header_line,
                message: format!("record '{}' has no sequence", id),
            });
        }
        records.push(SeqRecord {
            id,
            description,
            sequence,
        });
    }
    if records.is_empty() {
        return Err(ExtractError::Parse {
            line: 1,
            message: "no sequences found".to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<Vec<SeqRecord>, ExtractError> {
        parse_fasta(Cursor::new(input))
    }

    #[test]
    fn parses_multiline_records() {
        let records = parse(">p1 some protein\nMKT\nLLV\n\n>p2\nacdef\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "p1");
        assert_eq!(records[0].description.as_deref(), Some("some protein"));
        assert_eq!(records[0].sequence, "MKTLLV");
        assert_eq!(records[1].id, "p2");
        assert_eq!(records[1].description, None);
        assert_eq!(records[1].sequence, "ACDEF");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let records = parse(">p1\r\nMKT\r\n").unwrap();
        assert_eq!(records[0].sequence, "MKT");
    }

    #[test]
    fn data_before_header_is_an_error() {
        let err = parse("MKT\n>p1\nMKT\n").unwrap_err();
        match err {
            ExtractError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn duplicate_id_is_an_error() {
        let err = parse(">p1\nMKT\n>p1\nLLV\n").unwrap_err();
        match err {
            ExtractError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("duplicate"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn record_without_sequence_is_an_error() {
        let err = parse(">p1\n>p2\nMKT\n").unwrap_err();
        match err {
            ExtractError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn header_without_id_is_an_error() {
        assert!(parse(">\nMKT\n").is_err());
    }

    #[test]
    fn invalid_residue_is_an_error() {
        let err = parse(">p1\nMK5T\n").unwrap_err();
        match err {
            ExtractError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains('5'));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn stop_codons_and_gaps_are_accepted() {
        let records = parse(">p1\nMKT*\n>p2\nAC-D.E\n").unwrap();
        assert_eq!(records[0].sequence, "MKT*");
        assert_eq!(records[1].sequence, "AC-D.E");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse("").is_err());
        assert!(parse("\n\n").is_err());
    }
}
