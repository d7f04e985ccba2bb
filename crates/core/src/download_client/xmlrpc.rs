//! Minimal XML-RPC encoding for the rTorrent daemon.

use std::collections::BTreeMap;
use std::fmt::Write;

use quick_xml::escape::escape;
use serde_json::Value;
use thiserror::Error;

use crate::searcher::xml_tree;

#[derive(Debug, Error)]
pub enum XmlRpcError {
    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("Malformed XML-RPC response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcValue {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Array(Vec<XmlRpcValue>),
    Struct(BTreeMap<String, XmlRpcValue>),
}

impl XmlRpcValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            XmlRpcValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[XmlRpcValue]> {
        match self {
            XmlRpcValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            XmlRpcValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for XmlRpcValue {
    fn from(s: &str) -> Self {
        XmlRpcValue::String(s.to_string())
    }
}

impl From<String> for XmlRpcValue {
    fn from(s: String) -> Self {
        XmlRpcValue::String(s)
    }
}

/// A call bundled into `system.multicall`.
pub fn multicall_entry(method: &str, params: Vec<XmlRpcValue>) -> XmlRpcValue {
    let mut fields = BTreeMap::new();
    fields.insert("methodName".to_string(), XmlRpcValue::from(method));
    fields.insert("params".to_string(), XmlRpcValue::Array(params));
    XmlRpcValue::Struct(fields)
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[XmlRpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &XmlRpcValue) {
    out.push_str("<value>");
    match value {
        XmlRpcValue::Int(i) => {
            let _ = write!(out, "<i8>{}</i8>", i);
        }
        XmlRpcValue::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        XmlRpcValue::Double(d) => {
            let _ = write!(out, "<double>{}</double>", d);
        }
        XmlRpcValue::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s.as_str()));
        }
        XmlRpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        XmlRpcValue::Struct(fields) => {
            out.push_str("<struct>");
            for (name, field) in fields {
                let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                write_value(out, field);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Parse a `methodResponse`, turning a fault into an error.
pub fn decode_response(xml: &str) -> Result<XmlRpcValue, XmlRpcError> {
    let doc = xml_tree::parse(xml).map_err(|e| XmlRpcError::Malformed(e.to_string()))?;
    let response = doc
        .get("methodResponse")
        .ok_or_else(|| XmlRpcError::Malformed("missing methodResponse".to_string()))?;

    if let Some(fault) = response.get("fault") {
        let value = fault
            .get("value")
            .ok_or_else(|| XmlRpcError::Malformed("empty fault".to_string()))?;
        return Err(fault_error(&decode_value(value)?));
    }

    let value = xml_tree::path(response, &["params", "param", "value"])
        .ok_or_else(|| XmlRpcError::Malformed("missing params/param/value".to_string()))?;
    decode_value(value)
}

/// Build the error for a fault struct.
pub fn fault_error(value: &XmlRpcValue) -> XmlRpcError {
    match value {
        XmlRpcValue::Struct(fields) => XmlRpcError::Fault {
            code: fields.get("faultCode").and_then(XmlRpcValue::as_int).unwrap_or(0),
            message: fields
                .get("faultString")
                .and_then(XmlRpcValue::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        other => XmlRpcError::Malformed(format!("unexpected fault value {:?}", other)),
    }
}

fn decode_value(node: &Value) -> Result<XmlRpcValue, XmlRpcError> {
    let fields = match node {
        // Untyped values are strings
        Value::String(s) => return Ok(XmlRpcValue::String(s.clone())),
        Value::Object(fields) => fields,
        other => return Err(XmlRpcError::Malformed(format!("unexpected node {}", other))),
    };

    let (kind, inner) = fields
        .iter()
        .next()
        .ok_or_else(|| XmlRpcError::Malformed("empty value".to_string()))?;
    let text = || xml_tree::text(Some(inner)).unwrap_or_default();

    match kind.as_str() {
        "string" => Ok(XmlRpcValue::String(text())),
        "i4" | "i8" | "int" => text()
            .trim()
            .parse()
            .map(XmlRpcValue::Int)
            .map_err(|_| XmlRpcError::Malformed(format!("bad integer '{}'", text()))),
        "boolean" => Ok(XmlRpcValue::Bool(text().trim() == "1")),
        "double" => text()
            .trim()
            .parse()
            .map(XmlRpcValue::Double)
            .map_err(|_| XmlRpcError::Malformed(format!("bad double '{}'", text()))),
        "array" => {
            let values = match inner.get("data") {
                Some(Value::Object(data)) => xml_tree::list(data.get("value")),
                _ => Vec::new(),
            };
            values
                .into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(XmlRpcValue::Array)
        }
        "struct" => {
            let mut out = BTreeMap::new();
            for member in xml_tree::list(inner.get("member")) {
                let name = xml_tree::child_text(member, "name").unwrap_or_default();
                let value = match member.get("value") {
                    Some(value) => decode_value(value)?,
                    None => XmlRpcValue::String(String::new()),
                };
                out.insert(name, value);
            }
            Ok(XmlRpcValue::Struct(out))
        }
        other => Err(XmlRpcError::Malformed(format!("unsupported type '{}'", other))),
    }
}
