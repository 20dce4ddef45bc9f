use std::collections::BTreeMap;

use crate::error::DataAccessError;
use crate::types::{CommandKind, RowValues};

/// Named parameters for one statement.
///
/// Keys are case-sensitive and may carry their placeholder sigil (`@id`,
/// `:id`, `$id`) or not (`id`); iteration order is by key and carries no
/// meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, RowValues>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameters keyed by their bare name (sigil stripped).
    ///
    /// # Errors
    /// Returns `DataAccessError::Parameter` when a key is empty or two keys
    /// collapse onto the same bare name (`@id` and `id`).
    pub fn normalized(&self) -> Result<BTreeMap<&str, &RowValues>, DataAccessError> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            let bare = bare_name(key);
            if bare.is_empty() {
                return Err(DataAccessError::Parameter(format!(
                    "invalid parameter name '{key}'"
                )));
            }
            if out.insert(bare, value).is_some() {
                return Err(DataAccessError::Parameter(format!(
                    "parameter '{bare}' supplied more than once"
                )));
            }
        }
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Strip a leading placeholder sigil from a parameter name.
#[must_use]
pub fn bare_name(name: &str) -> &str {
    name.strip_prefix(['@', ':', '$']).unwrap_or(name)
}

/// One command sent to a backend: SQL text or a procedure name, plus its
/// optional parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    kind: CommandKind,
    params: Option<Params>,
}

impl Statement {
    /// A raw SQL statement.
    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            text: sql.into(),
            kind: CommandKind::Text,
            params: None,
        }
    }

    /// A stored-procedure call by name.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            params: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Option<Params>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }
}

/// An ordered, non-empty list of statements run as one unit against a
/// single backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    statements: Vec<Statement>,
}

impl Batch {
    /// Build a batch from SQL texts and an optional parallel parameter list.
    ///
    /// # Errors
    /// Returns `DataAccessError::Validation` when `queries` is empty or when
    /// `params_list` is supplied with a different length.
    pub fn new<Q: Into<String>>(
        queries: impl IntoIterator<Item = Q>,
        params_list: Option<Vec<Params>>,
    ) -> Result<Self, DataAccessError> {
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        if queries.is_empty() {
            return Err(DataAccessError::Validation(
                "a batch needs at least one statement".to_string(),
            ));
        }
        let statements = match params_list {
            None => queries.into_iter().map(Statement::text).collect(),
            Some(params_list) => {
                if params_list.len() != queries.len() {
                    return Err(DataAccessError::Validation(format!(
                        "parameter list has {} entries but the batch has {} statements",
                        params_list.len(),
                        queries.len()
                    )));
                }
                queries
                    .into_iter()
                    .zip(params_list)
                    .map(|(sql, params)| Statement::text(sql).with_params(Some(params)))
                    .collect()
            }
        };
        Ok(Self { statements })
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// `false` for any batch built through [`Batch::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rejects_empty_statement_list() {
        let err = Batch::new(Vec::<String>::new(), None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn batch_rejects_mismatched_params() {
        let err = Batch::new(["SELECT 1", "SELECT 2"], Some(vec![Params::new()])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn batch_pairs_params_in_order() {
        let batch = Batch::new(
            ["INSERT INTO t VALUES (@a)", "DELETE FROM t"],
            Some(vec![Params::new().with("@a", 1), Params::new()]),
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.statements()[0].params().and_then(|p| p.get("@a")),
            Some(&RowValues::Int(1))
        );
        assert_eq!(batch.statements()[1].sql(), "DELETE FROM t");
    }

    #[test]
    fn normalized_detects_sigil_collisions() {
        let params = Params::new().with("@id", 1).with("id", 2);
        assert!(matches!(
            params.normalized(),
            Err(DataAccessError::Parameter(_))
        ));
    }

    #[test]
    fn none_binds_as_null() {
        let params = Params::new().with("x", None::<i64>);
        assert_eq!(params.get("x"), Some(&RowValues::Null));
        assert_eq!(bare_name(":x"), "x");
        assert_eq!(bare_name("x"), "x");
    }
}
