use crate::domain::model::Port;
use crate::utils::error::{Result, SyncError};
use std::num::IntErrorKind;
use std::path::Path;

/// Parses the content of a port file.
///
/// Surrounding whitespace is ignored. Anything that is not a base-10 integer is
/// a `ParseError`; integers outside 1..=65535 (negatives included) are a
/// `RangeError`.
pub fn parse_port(content: &[u8]) -> Result<Port> {
    let text = String::from_utf8_lossy(content);
    let trimmed = text.trim();

    // `str::parse` accepts a leading '+', a port file never carries one.
    if trimmed.starts_with('+') {
        return Err(SyncError::ParseError {
            value: trimmed.to_string(),
            source: None,
        });
    }

    let value = match trimmed.parse::<i64>() {
        Ok(value) => value,
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            return Err(SyncError::RangeError {
                value: trimmed.to_string(),
            });
        }
        Err(source) => {
            return Err(SyncError::ParseError {
                value: trimmed.to_string(),
                source: Some(source),
            });
        }
    };

    u16::try_from(value)
        .ok()
        .and_then(Port::new)
        .ok_or_else(|| SyncError::RangeError {
            value: trimmed.to_string(),
        })
}

/// Reads and parses the whole port file.
pub fn read_port(path: &Path) -> Result<Port> {
    let content = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SyncError::PortFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::IoError {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_port(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_port_trims_whitespace() {
        let port = assert_ok!(parse_port(b"\t\n 1111 \n"));
        assert_eq!(port.get(), 1111);
    }

    #[test]
    fn test_parse_port_bounds() {
        assert_eq!(assert_ok!(parse_port(b"1")).get(), 1);
        assert_eq!(assert_ok!(parse_port(b"65535")).get(), 65535);
    }

    #[test]
    fn test_parse_port_out_of_range() {
        for input in ["0", "65536", "-1", "99999999999999999999999"] {
            match parse_port(input.as_bytes()) {
                Err(SyncError::RangeError { value }) => assert_eq!(value, input),
                other => panic!("expected RangeError for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_parse_port_not_a_number() {
        for input in ["abc", "", "   ", "12.5", "0x50", "+80", "-+80"] {
            assert!(
                matches!(parse_port(input.as_bytes()), Err(SyncError::ParseError { .. })),
                "expected ParseError for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_read_port_missing_file() {
        let err = assert_err!(read_port(Path::new("/some/non/existent/path")));
        assert!(matches!(err, SyncError::PortFileNotFound { .. }));
    }

    #[test]
    fn test_read_port_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forwarded_port");
        std::fs::write(&path, "51413\n").unwrap();

        assert_eq!(assert_ok!(read_port(&path)).get(), 51413);
    }
}
