//! Server parameters announced once by `(server_param ...)`.

use std::collections::HashMap;

use tracing::warn;

use crate::message::MessageNode;

/// Value of a single server parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Parsed as an integer
    Int(i64),
    /// Parsed as a float
    Float(f64),
    /// Anything else
    Text(String),
}

impl ParamValue {
    fn parse(s: &str) -> ParamValue {
        if let Ok(i) = s.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Text(s.to_string())
        }
    }

    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Text(_) => None,
        }
    }
}

/// Name to value mapping of server parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerParams {
    values: HashMap<String, ParamValue>,
}

impl ServerParams {
    /// Builds the table from the body of a `server_param` message.
    ///
    /// Entries that are not `(name value)` pairs are skipped.
    pub fn from_body(body: &[MessageNode]) -> ServerParams {
        let mut values = HashMap::new();
        for entry in body {
            match entry.as_list() {
                Some([name, value, ..]) => match (name.as_atom(), value.as_atom()) {
                    (Some(name), Some(value)) => {
                        values.insert(name.to_string(), ParamValue::parse(value));
                    }
                    _ => warn!(%entry, "ignoring server parameter"),
                },
                _ => warn!(%entry, "ignoring server parameter"),
            }
        }
        ServerParams { values }
    }

    /// Raw access to a parameter
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Numeric parameter, `None` if absent or not a number
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    /// Number of parameters received
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True before `server_param` was received
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sets a single value. Mostly useful to build tables in tests.
    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse;

    #[test]
    fn values_are_typed() {
        let msg = parse("(server_param (goal_width 14.02) (half_time 300) (team_l_start \"\") (broken))")
            .unwrap();
        let params = ServerParams::from_body(&msg.as_list().unwrap()[1..]);
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("goal_width"), Some(&ParamValue::Float(14.02)));
        assert_eq!(params.get("half_time"), Some(&ParamValue::Int(300)));
        assert_eq!(params.number("half_time"), Some(300.0));
        assert_eq!(params.number("team_l_start"), None);
    }
}
