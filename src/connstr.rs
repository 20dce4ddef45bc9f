//! ADO/ODBC-style `Key=Value;` connection strings.
//!
//! Keys are case-insensitive and the usual synonyms are folded together
//! (`Server`/`Data Source`/`Host`, `UID`/`User ID`, ...). Values may be
//! wrapped in `{braces}` or quotes to carry `;` characters.

use std::collections::BTreeMap;

use crate::error::DataAccessError;

/// A parsed connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParts {
    /// Raw `Server`/`Data Source` value; see [`ConnectionParts::server_address`].
    pub server: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Every other key, lower-cased.
    pub extra: BTreeMap<String, String>,
}

/// Host, port and named instance split out of a `Server` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
}

impl ConnectionParts {
    /// Parse a `Key=Value;...` string.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` for a segment without `=`, an
    /// unterminated quote/brace, or a non-numeric `Port`.
    pub fn parse(input: &str) -> Result<Self, DataAccessError> {
        let mut parts = ConnectionParts::default();
        for (key, value) in tokenize(input)? {
            match key.as_str() {
                "server" | "data source" | "host" | "address" | "addr" | "network address" => {
                    parts.server = Some(value);
                }
                "port" => parts.port = Some(parse_port(&value)?),
                "database" | "initial catalog" | "dbname" => parts.database = Some(value),
                "uid" | "user id" | "user" | "username" => parts.user = Some(value),
                "pwd" | "password" => parts.password = Some(value),
                _ => {
                    parts.extra.insert(key, value);
                }
            }
        }
        Ok(parts)
    }

    /// Split the `Server` value into host, port and instance.
    ///
    /// Accepts `host`, `tcp:host`, `host,1433`, `host:50000` and
    /// `host\INSTANCE`. An explicit `Port` key wins over an embedded port.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` when the embedded port is not a number.
    pub fn server_address(&self) -> Result<Option<ServerAddress>, DataAccessError> {
        let Some(raw) = self.server.as_deref() else {
            return Ok(None);
        };
        let raw = raw.strip_prefix("tcp:").unwrap_or(raw);
        let (host, mut port, instance) = if let Some((host, instance)) = raw.split_once('\\') {
            (host, None, Some(instance.to_owned()))
        } else if let Some((host, port)) = raw.split_once(',') {
            (host, Some(parse_port(port)?), None)
        } else if let Some((host, port)) = raw.rsplit_once(':')
            && !host.contains(':')
        {
            (host, Some(parse_port(port)?), None)
        } else {
            (raw, None, None)
        };
        if self.port.is_some() {
            port = self.port;
        }
        Ok(Some(ServerAddress {
            host: host.trim().to_owned(),
            port,
            instance,
        }))
    }

    /// Look up a key that has no dedicated field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra
            .get(&normalize_key(key))
            .map(String::as_str)
    }

    /// Interpret an extra key as a boolean (`true/yes/1/on`, `false/no/0/off`).
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }
}

fn parse_port(value: &str) -> Result<u16, DataAccessError> {
    value
        .trim()
        .parse()
        .map_err(|e| DataAccessError::Config(format!("invalid port '{value}': {e}")))
}

fn normalize_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn tokenize(input: &str) -> Result<Vec<(String, String)>, DataAccessError> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ';') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(';') | None => {
                    return Err(DataAccessError::Config(format!(
                        "connection string segment '{}' has no '='",
                        key.trim()
                    )));
                }
                Some(c) => key.push(c),
            }
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let value = match chars.peek().copied() {
            Some(open @ ('{' | '"' | '\'')) => {
                chars.next();
                let close = if open == '{' { '}' } else { open };
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == close => {
                            if chars.peek() == Some(&close) {
                                chars.next();
                                value.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => value.push(c),
                        None => {
                            return Err(DataAccessError::Config(format!(
                                "unterminated value for '{}'",
                                key.trim()
                            )));
                        }
                    }
                }
                while chars.peek().is_some_and(|c| *c != ';') {
                    chars.next();
                }
                value
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = chars.next_if(|c| *c != ';') {
                    value.push(c);
                }
                value.trim().to_owned()
            }
        };

        pairs.push((normalize_key(&key), value));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ado_style_sql_server_string() {
        let parts = ConnectionParts::parse(
            "Data Source=sql01\\OFFICE;Initial Catalog=Offices;User ID=app;Password=s3cret;",
        )
        .unwrap();
        assert_eq!(parts.database.as_deref(), Some("Offices"));
        assert_eq!(parts.user.as_deref(), Some("app"));
        assert_eq!(parts.password.as_deref(), Some("s3cret"));
        let addr = parts.server_address().unwrap().unwrap();
        assert_eq!(addr.host, "sql01");
        assert_eq!(addr.instance.as_deref(), Some("OFFICE"));
        assert_eq!(addr.port, None);
    }

    #[test]
    fn parses_odbc_style_host_port() {
        let parts =
            ConnectionParts::parse("Server=legacy-db:50000;Database=LEGACY;UID=u;PWD={p;w}").unwrap();
        let addr = parts.server_address().unwrap().unwrap();
        assert_eq!(addr.host, "legacy-db");
        assert_eq!(addr.port, Some(50000));
        assert_eq!(parts.password.as_deref(), Some("p;w"));
    }

    #[test]
    fn explicit_port_wins_and_extras_are_kept() {
        let parts =
            ConnectionParts::parse("Server=tcp:db,1433; Port = 2000; Busy  Timeout=250").unwrap();
        assert_eq!(parts.server_address().unwrap().unwrap().port, Some(2000));
        assert_eq!(parts.get("busy timeout"), Some("250"));
        assert_eq!(parts.get("Busy Timeout"), Some("250"));
    }

    #[test]
    fn flags_parse_common_spellings() {
        let parts = ConnectionParts::parse("Foreign Keys=yes;Trust Server Certificate=False").unwrap();
        assert_eq!(parts.flag("foreign keys"), Some(true));
        assert_eq!(parts.flag("trust server certificate"), Some(false));
        assert_eq!(parts.flag("absent"), None);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(ConnectionParts::parse("Server").is_err());
        assert!(ConnectionParts::parse("Password={open").is_err());
        assert!(ConnectionParts::parse("Port=abc").is_err());
        let bad_port = ConnectionParts::parse("Server=db:xyz").unwrap();
        assert!(bad_port.server_address().is_err());
    }
}
