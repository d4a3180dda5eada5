//! Description of one logical API call.

use http::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Everything a transport needs to perform one logical call: method, path,
/// query parameters and an optional JSON body.
///
/// Query parameters never contain null values; the builder methods drop them.
///
/// # Examples
///
/// ```
/// use neo_tariff::ApiRequest;
/// use http::Method;
///
/// let request = ApiRequest::get("/search/hts")
///     .with_query_param("query", "steel")
///     .with_optional_query_param("chapter", None::<&str>)
///     .with_query_param("limit", 10);
///
/// assert_eq!(request.method, Method::GET);
/// assert_eq!(
///     request.query,
///     vec![("query".to_string(), "steel".to_string()), ("limit".to_string(), "10".to_string())]
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// The HTTP method.
    pub method: Method,

    /// The request path, relative to the base URL.
    pub path: String,

    /// Query parameters, in the order they were added.
    pub query: Vec<(String, String)>,

    /// JSON request body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request with no parameters and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a query parameter if `value` is `Some`.
    pub fn with_optional_query_param<V: ToString>(
        self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_query_param(key, value),
            None => self,
        }
    }

    /// Adds every field of a serializable struct or map as query parameters.
    ///
    /// `null` fields are dropped, booleans become `true`/`false` and arrays
    /// repeat the key once per element.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` does not serialize to a JSON object.
    pub fn with_query<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self> {
        let value =
            serde_json::to_value(params).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(Error::SerializationFailed(
                "query parameters must serialize to an object".to_string(),
            ));
        };

        for (key, value) in fields {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items.iter().filter(|v| !v.is_null()) {
                        self.query.push((key.clone(), query_value(item)));
                    }
                }
                other => self.query.push((key, query_value(&other))),
            }
        }
        Ok(self)
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized to JSON.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let body =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct SearchParams<'a> {
        query: Option<&'a str>,
        code: Option<&'a str>,
        fuzzy: Option<bool>,
        limit: u32,
        types: Vec<&'a str>,
    }

    fn pairs(request: &ApiRequest) -> Vec<(&str, &str)> {
        request
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_with_query_strips_nulls() {
        let params = SearchParams {
            query: Some("steel"),
            code: None,
            fuzzy: Some(true),
            limit: 10,
            types: vec!["codes", "notes"],
        };
        let request = ApiRequest::get("/search/hts").with_query(&params).unwrap();
        let mut query = pairs(&request);
        query.sort();

        assert_eq!(
            query,
            vec![
                ("fuzzy", "true"),
                ("limit", "10"),
                ("query", "steel"),
                ("types", "codes"),
                ("types", "notes"),
            ]
        );
    }

    #[test]
    fn test_with_query_rejects_non_objects() {
        let result = ApiRequest::get("/x").with_query(&vec![1, 2]);
        assert!(matches!(result, Err(Error::SerializationFailed(_))));
    }

    #[test]
    fn test_optional_query_param() {
        let request = ApiRequest::get("/x")
            .with_optional_query_param("hts_year", Some(2025))
            .with_optional_query_param("hts_version", None::<u32>);
        assert_eq!(pairs(&request), vec![("hts_year", "2025")]);
    }

    #[test]
    fn test_with_json_body() {
        let request = ApiRequest::post("/rates/entry")
            .with_json(&json!({"hts_code": "7208.10.15", "qty": 1000}))
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"hts_code": "7208.10.15", "qty": 1000})));
    }
}
