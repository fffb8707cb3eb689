//! INI configuration for the TCP backend.
//!
//! Operators usually describe collectors in a small INI file rather than in
//! code. Parsing goes through the `rust-ini` crate and bytes are decoded with
//! `encoding_rs`, so files saved in legacy code pages load as well.
//!
//! ```ini
//! [tcp_backend]
//! servers = 192.168.1.145:3333, 10.0.0.1:9
//! max_servers = 4
//! retry_interval_ms = 5000
//! poll_timeout_ms = 1000
//! connect_timeout_ms = 3000
//! warn_interval_ms = 5000
//! ```

use std::{fs, io, path::Path, str::FromStr};

use encoding_rs::Encoding;
use ini::Ini;
use thiserror::Error;

use crate::{builder::TcpBackendBuilder, endpoint::Endpoint};

/// Section holding the backend settings.
pub const SECTION: &str = "tcp_backend";

/// Failures while loading an INI configuration.
#[derive(Debug, Error)]
pub enum FileConfigError {
    #[error("{path} doesn't exist")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} is an empty file")]
    Empty { path: String },
    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
    #[error("{path} is not valid {encoding}")]
    Decode {
        path: String,
        encoding: &'static str,
    },
    #[error("{path} is invalid: {message}")]
    Syntax { path: String, message: String },
    #[error("{path} has no [tcp_backend] section")]
    MissingSection { path: String },
    #[error("{path}: unknown key {key:?} in [tcp_backend]")]
    UnknownKey { path: String, key: String },
    #[error("{path}: {key} = {value:?} is not a valid {expected}")]
    InvalidValue {
        path: String,
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Read and parse `path`, decoding it as `encoding` (UTF-8 when `None`).
pub fn load_builder(
    path: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<TcpBackendBuilder, FileConfigError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let bytes = read_file_bytes(path, &name)?;
    if bytes.is_empty() {
        return Err(FileConfigError::Empty { path: name });
    }
    let text = decode_with_encoding(&name, &bytes, encoding.unwrap_or("utf-8"))?;
    parse_builder(&name, &text)
}

fn read_file_bytes(path: &Path, name: &str) -> Result<Vec<u8>, FileConfigError> {
    fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => FileConfigError::NotFound {
            path: name.to_owned(),
        },
        _ => FileConfigError::Io {
            path: name.to_owned(),
            source: err,
        },
    })
}

fn decode_with_encoding(name: &str, bytes: &[u8], label: &str) -> Result<String, FileConfigError> {
    let normalized_label = label.trim().to_ascii_lowercase();
    let encoding = Encoding::for_label(normalized_label.as_bytes())
        .ok_or_else(|| FileConfigError::UnknownEncoding(label.to_owned()))?;
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(FileConfigError::Decode {
            path: name.to_owned(),
            encoding: encoding.name(),
        });
    }
    Ok(decoded.into_owned())
}

/// Parse INI text into a builder. `name` only labels errors.
pub fn parse_builder(name: &str, text: &str) -> Result<TcpBackendBuilder, FileConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| FileConfigError::Syntax {
        path: name.to_owned(),
        message: err.to_string(),
    })?;
    let section = ini
        .section(Some(SECTION))
        .ok_or_else(|| FileConfigError::MissingSection {
            path: name.to_owned(),
        })?;

    let mut builder = TcpBackendBuilder::new();
    for (key, value) in section.iter() {
        let value = value.trim();
        builder = match key {
            "servers" => parse_servers(name, value)?
                .into_iter()
                .fold(builder, |builder, endpoint| builder.with_server(endpoint)),
            "max_servers" => builder.with_max_servers(parse_number(name, key, value)?),
            "retry_interval_ms" => builder.with_retry_interval_ms(parse_number(name, key, value)?),
            "poll_timeout_ms" => builder.with_poll_timeout_ms(parse_number(name, key, value)?),
            "connect_timeout_ms" => {
                builder.with_connect_timeout_ms(parse_number(name, key, value)?)
            }
            "warn_interval_ms" => builder.with_warn_interval_ms(parse_number(name, key, value)?),
            other => {
                return Err(FileConfigError::UnknownKey {
                    path: name.to_owned(),
                    key: other.to_owned(),
                });
            }
        };
    }
    Ok(builder)
}

fn parse_servers(name: &str, value: &str) -> Result<Vec<Endpoint>, FileConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<Endpoint>()
                .map_err(|_| FileConfigError::InvalidValue {
                    path: name.to_owned(),
                    key: "servers".to_owned(),
                    value: item.to_owned(),
                    expected: "IPv4 endpoint",
                })
        })
        .collect()
}

fn parse_number<T: FromStr>(name: &str, key: &str, value: &str) -> Result<T, FileConfigError> {
    value.parse().map_err(|_| FileConfigError::InvalidValue {
        path: name.to_owned(),
        key: key.to_owned(),
        value: value.to_owned(),
        expected: "non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    fn parses_every_key() {
        let text = "[tcp_backend]\n\
                    servers = 192.168.1.145:3333, 10.0.0.1:9\n\
                    max_servers = 4\n\
                    retry_interval_ms = 2000\n\
                    poll_timeout_ms = 500\n\
                    connect_timeout_ms = 750\n\
                    warn_interval_ms = 10000\n";
        let config = parse_builder("backend.ini", text)
            .expect("parse")
            .build_config()
            .expect("valid");
        assert_eq!(
            config.servers,
            vec![
                Endpoint::from(([192, 168, 1, 145], 3333)),
                Endpoint::from(([10, 0, 0, 1], 9)),
            ]
        );
        assert_eq!(config.max_servers, 4);
        assert_eq!(config.retry_interval, Duration::from_millis(2000));
        assert_eq!(config.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
        assert_eq!(config.warn_interval, Duration::from_secs(10));
    }

    #[rstest]
    fn missing_section_is_reported() {
        let err = parse_builder("backend.ini", "[other]\nkey = value\n").expect_err("missing");
        assert!(matches!(err, FileConfigError::MissingSection { .. }));
    }

    #[rstest]
    fn unknown_keys_are_rejected() {
        let err = parse_builder("backend.ini", "[tcp_backend]\nbackoff = 3\n").expect_err("unknown");
        assert!(matches!(err, FileConfigError::UnknownKey { key, .. } if key == "backoff"));
    }

    #[rstest]
    #[case("servers = 10.0.0.1", "servers")]
    #[case("max_servers = many", "max_servers")]
    #[case("poll_timeout_ms = -1", "poll_timeout_ms")]
    fn invalid_values_name_the_key(#[case] line: &str, #[case] expected_key: &str) {
        let text = format!("[tcp_backend]\n{line}\n");
        let err = parse_builder("backend.ini", &text).expect_err("invalid");
        assert!(
            matches!(&err, FileConfigError::InvalidValue { key, .. } if key == expected_key),
            "unexpected error {err}"
        );
    }

    #[rstest]
    fn decode_rejects_unknown_encoding() {
        let err = decode_with_encoding("backend.ini", b"data", "does-not-exist")
            .expect_err("lookup failure");
        assert!(matches!(err, FileConfigError::UnknownEncoding(label) if label == "does-not-exist"));
    }

    #[rstest]
    fn decode_handles_latin1() {
        let decoded = decode_with_encoding("backend.ini", b"caf\xE9", "latin1").expect("decode");
        assert_eq!(decoded, "caf\u{e9}");
    }

    #[rstest]
    fn decode_reports_invalid_utf8() {
        let err = decode_with_encoding("backend.ini", b"Hello\xFF", "utf-8").expect_err("invalid");
        assert!(matches!(err, FileConfigError::Decode { encoding: "UTF-8", .. }));
    }
}
