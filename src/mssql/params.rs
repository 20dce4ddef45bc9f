use tiberius::Query;

use crate::types::RowValues;

/// Bind positional values onto a tiberius query, in `@P1..@Pn` order.
///
/// tiberius takes ownership of what it binds, so text and blobs are cloned.
pub fn bind_query_params<'a>(query: &mut Query<'a>, params: &[&RowValues]) {
    for param in params {
        match param {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.clone()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(dt) => {
                query.bind(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
            RowValues::Null => query.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes.clone()),
        }
    }
}
