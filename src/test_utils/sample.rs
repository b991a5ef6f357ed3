//! Sample configuration schema used across the test suite.
//!
//! The messages are written the way generated prost code looks, and the
//! `ConfigMessage` impl is the generated-accessor surface for them:
//! `auth_token` is a masked top-level secret, `tls.key_data` a masked
//! nested secret.

use std::collections::HashMap;

use bytes::Bytes;

use crate::constants::REDACTED;
use crate::errors::{DiscontinuityError, SchemaError};
use crate::proto::Revision;
use crate::proto::{Violation, Violations};
use crate::schema::{ConfigMessage, FieldPath, MessageValue, Value};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SampleConfig {
    #[prost(message, optional, tag = "1")]
    pub revision: Option<Revision>,
    #[prost(bool, optional, tag = "2")]
    pub enabled: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub endpoint: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub auth_token: Option<String>,
    #[prost(message, optional, tag = "6")]
    pub limits: Option<SampleLimits>,
    #[prost(message, optional, tag = "7")]
    pub tls: Option<SampleTls>,
    #[prost(string, repeated, tag = "8")]
    pub tags: Vec<String>,
    #[prost(map = "string, string", tag = "9")]
    pub attributes: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SampleLimits {
    #[prost(int64, optional, tag = "1")]
    pub max_connections: Option<i64>,
    #[prost(int64, optional, tag = "2")]
    pub max_streams: Option<i64>,
    #[prost(int64, optional, tag = "3")]
    pub read_timeout_ms: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub write_timeout_ms: Option<i64>,
    #[prost(int64, optional, tag = "5")]
    pub burst: Option<i64>,
    #[prost(int64, optional, tag = "6")]
    pub rate: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SampleTls {
    #[prost(string, optional, tag = "1")]
    pub cert_path: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub key_data: Option<String>,
    #[prost(bool, optional, tag = "3")]
    pub insecure: Option<bool>,
    #[prost(bytes = "bytes", optional, tag = "4")]
    pub ca_bundle: Option<Bytes>,
}

const LIMIT_FIELDS: [&str; 6] = [
    "max_connections",
    "max_streams",
    "read_timeout_ms",
    "write_timeout_ms",
    "burst",
    "rate",
];

impl SampleLimits {
    fn merge_with_replace(&mut self, other: &Self) {
        if other.max_connections.is_some() {
            self.max_connections = other.max_connections;
        }
        if other.max_streams.is_some() {
            self.max_streams = other.max_streams;
        }
        if other.read_timeout_ms.is_some() {
            self.read_timeout_ms = other.read_timeout_ms;
        }
        if other.write_timeout_ms.is_some() {
            self.write_timeout_ms = other.write_timeout_ms;
        }
        if other.burst.is_some() {
            self.burst = other.burst;
        }
        if other.rate.is_some() {
            self.rate = other.rate;
        }
    }

    fn field(&self, name: &str) -> Option<i64> {
        match name {
            "max_connections" => self.max_connections,
            "max_streams" => self.max_streams,
            "read_timeout_ms" => self.read_timeout_ms,
            "write_timeout_ms" => self.write_timeout_ms,
            "burst" => self.burst,
            "rate" => self.rate,
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Option<i64>> {
        match name {
            "max_connections" => Some(&mut self.max_connections),
            "max_streams" => Some(&mut self.max_streams),
            "read_timeout_ms" => Some(&mut self.read_timeout_ms),
            "write_timeout_ms" => Some(&mut self.write_timeout_ms),
            "burst" => Some(&mut self.burst),
            "rate" => Some(&mut self.rate),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        let mut message = MessageValue::new();
        for name in LIMIT_FIELDS {
            if let Some(value) = self.field(name) {
                message.insert(name, Value::Int64(value));
            }
        }
        Value::Message(message)
    }
}

impl SampleTls {
    fn merge_with_replace(&mut self, other: &Self) {
        if other.cert_path.is_some() {
            self.cert_path = other.cert_path.clone();
        }
        if other.key_data.is_some() {
            self.key_data = other.key_data.clone();
        }
        if other.insecure.is_some() {
            self.insecure = other.insecure;
        }
        if other.ca_bundle.is_some() {
            self.ca_bundle = other.ca_bundle.clone();
        }
    }

    fn to_value(&self) -> Value {
        let mut message = MessageValue::new();
        if let Some(v) = &self.cert_path {
            message.insert("cert_path", Value::String(v.clone()));
        }
        if let Some(v) = &self.key_data {
            message.insert("key_data", Value::String(v.clone()));
        }
        if let Some(v) = self.insecure {
            message.insert("insecure", Value::Bool(v));
        }
        if let Some(v) = &self.ca_bundle {
            message.insert("ca_bundle", Value::Bytes(v.clone()));
        }
        Value::Message(message)
    }
}

fn redact_string(field: &mut Option<String>) {
    if field.is_some() {
        *field = Some(REDACTED.to_owned());
    }
}

fn unredact_string(
    field: &mut Option<String>,
    reference: Option<&String>,
    path: &str,
    missing: &mut Vec<FieldPath>,
) {
    if field.as_deref() != Some(REDACTED) {
        return;
    }
    match reference {
        Some(value) => *field = Some(value.clone()),
        None => missing.push(FieldPath::parse(path).expect("static path")),
    }
}

impl ConfigMessage for SampleConfig {
    fn type_name() -> &'static str {
        "SampleConfig"
    }

    fn masked_fields() -> &'static [&'static str] {
        &["auth_token"]
    }

    fn all_paths() -> Vec<FieldPath> {
        let mut paths = vec![
            "enabled",
            "name",
            "endpoint",
            "auth_token",
            "limits",
            "limits.max_connections",
            "limits.max_streams",
            "limits.read_timeout_ms",
            "limits.write_timeout_ms",
            "limits.burst",
            "limits.rate",
            "tls",
            "tls.cert_path",
            "tls.key_data",
            "tls.insecure",
            "tls.ca_bundle",
            "tags",
            "attributes",
        ];
        paths
            .drain(..)
            .map(|p| FieldPath::parse(p).expect("static path"))
            .collect()
    }

    fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    fn set_revision(&mut self, revision: Option<Revision>) {
        self.revision = revision;
    }

    fn merge_with_replace(&mut self, other: &Self) {
        if other.revision.is_some() {
            self.revision = other.revision.clone();
        }
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.endpoint.is_some() {
            self.endpoint = other.endpoint.clone();
        }
        if other.auth_token.is_some() {
            self.auth_token = other.auth_token.clone();
        }
        match (&mut self.limits, &other.limits) {
            (Some(mine), Some(theirs)) => mine.merge_with_replace(theirs),
            (None, Some(theirs)) => self.limits = Some(theirs.clone()),
            _ => {}
        }
        match (&mut self.tls, &other.tls) {
            (Some(mine), Some(theirs)) => mine.merge_with_replace(theirs),
            (None, Some(theirs)) => self.tls = Some(theirs.clone()),
            _ => {}
        }
        if !other.tags.is_empty() {
            self.tags = other.tags.clone();
        }
        if !other.attributes.is_empty() {
            self.attributes = other.attributes.clone();
        }
    }

    fn redact_secrets(&mut self) {
        redact_string(&mut self.auth_token);
        if let Some(tls) = &mut self.tls {
            redact_string(&mut tls.key_data);
        }
    }

    fn unredact_secrets(&mut self, base: &Self) -> Result<(), DiscontinuityError> {
        let mut missing = Vec::new();
        unredact_string(
            &mut self.auth_token,
            base.auth_token.as_ref(),
            "auth_token",
            &mut missing,
        );
        if let Some(tls) = &mut self.tls {
            unredact_string(
                &mut tls.key_data,
                base.tls.as_ref().and_then(|t| t.key_data.as_ref()),
                "tls.key_data",
                &mut missing,
            );
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DiscontinuityError { fields: missing })
        }
    }

    fn has_field(&self, path: &FieldPath) -> bool {
        matches!(self.field_value(path), Ok(Some(_)))
    }

    fn field_value(&self, path: &FieldPath) -> Result<Option<Value>, SchemaError> {
        let parts = path.parts();
        match parts.as_slice() {
            ["enabled"] => Ok(self.enabled.map(Value::Bool)),
            ["name"] => Ok(self.name.clone().map(Value::String)),
            ["endpoint"] => Ok(self.endpoint.clone().map(Value::String)),
            ["auth_token"] => Ok(self.auth_token.clone().map(Value::String)),
            ["limits"] => Ok(self.limits.as_ref().map(SampleLimits::to_value)),
            ["limits", field] if LIMIT_FIELDS.contains(field) => Ok(self
                .limits
                .as_ref()
                .and_then(|l| l.field(field))
                .map(Value::Int64)),
            ["tls"] => Ok(self.tls.as_ref().map(SampleTls::to_value)),
            ["tls", "cert_path"] => Ok(self
                .tls
                .as_ref()
                .and_then(|t| t.cert_path.clone())
                .map(Value::String)),
            ["tls", "key_data"] => Ok(self
                .tls
                .as_ref()
                .and_then(|t| t.key_data.clone())
                .map(Value::String)),
            ["tls", "insecure"] => Ok(self.tls.as_ref().and_then(|t| t.insecure).map(Value::Bool)),
            ["tls", "ca_bundle"] => Ok(self
                .tls
                .as_ref()
                .and_then(|t| t.ca_bundle.clone())
                .map(Value::Bytes)),
            ["tags"] => Ok((!self.tags.is_empty()).then(|| {
                Value::List(self.tags.iter().cloned().map(Value::String).collect())
            })),
            ["attributes"] => Ok((!self.attributes.is_empty()).then(|| {
                Value::Map(
                    self.attributes
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                )
            })),
            _ => Err(SchemaError::UnknownPath(path.dotted())),
        }
    }

    fn set_field(&mut self, path: &FieldPath, value: Value) -> Result<(), SchemaError> {
        let mismatch = |expected: &'static str| SchemaError::TypeMismatch {
            path: path.dotted(),
            expected,
        };
        let parts = path.parts();
        match parts.as_slice() {
            ["enabled"] => {
                self.enabled = Some(value.as_bool().ok_or_else(|| mismatch("bool"))?);
            }
            ["name"] => {
                self.name = Some(value.as_str().ok_or_else(|| mismatch("string"))?.to_owned());
            }
            ["endpoint"] => {
                self.endpoint =
                    Some(value.as_str().ok_or_else(|| mismatch("string"))?.to_owned());
            }
            ["auth_token"] => {
                self.auth_token =
                    Some(value.as_str().ok_or_else(|| mismatch("string"))?.to_owned());
            }
            ["limits", field] if LIMIT_FIELDS.contains(field) => {
                let parsed = value.as_i64().ok_or_else(|| mismatch("int64"))?;
                *self
                    .limits
                    .get_or_insert_with(SampleLimits::default)
                    .field_mut(field)
                    .expect("known limit field") = Some(parsed);
            }
            ["tls", "cert_path"] => {
                self.tls.get_or_insert_with(SampleTls::default).cert_path =
                    Some(value.as_str().ok_or_else(|| mismatch("string"))?.to_owned());
            }
            ["tls", "key_data"] => {
                self.tls.get_or_insert_with(SampleTls::default).key_data =
                    Some(value.as_str().ok_or_else(|| mismatch("string"))?.to_owned());
            }
            ["tls", "insecure"] => {
                self.tls.get_or_insert_with(SampleTls::default).insecure =
                    Some(value.as_bool().ok_or_else(|| mismatch("bool"))?);
            }
            ["tls", "ca_bundle"] => match value {
                Value::Bytes(bytes) => {
                    self.tls.get_or_insert_with(SampleTls::default).ca_bundle = Some(bytes);
                }
                _ => return Err(mismatch("bytes")),
            },
            ["limits"] | ["tls"] => return Err(mismatch("scalar field")),
            ["attributes"] => match value {
                Value::Map(entries) => {
                    let mut attributes = HashMap::with_capacity(entries.len());
                    for (key, entry) in entries {
                        attributes.insert(
                            key,
                            entry.as_str().ok_or_else(|| mismatch("string map"))?.to_owned(),
                        );
                    }
                    self.attributes = attributes;
                }
                _ => return Err(mismatch("string map")),
            },
            ["tags"] => match value {
                Value::List(items) => {
                    let mut tags = Vec::with_capacity(items.len());
                    for item in items {
                        tags.push(item.as_str().ok_or_else(|| mismatch("string list"))?.to_owned());
                    }
                    self.tags = tags;
                }
                _ => return Err(mismatch("string list")),
            },
            _ => return Err(SchemaError::UnknownPath(path.dotted())),
        }
        Ok(())
    }

    fn clear_field(&mut self, path: &FieldPath) -> Result<(), SchemaError> {
        let parts = path.parts();
        match parts.as_slice() {
            ["enabled"] => self.enabled = None,
            ["name"] => self.name = None,
            ["endpoint"] => self.endpoint = None,
            ["auth_token"] => self.auth_token = None,
            ["limits"] => self.limits = None,
            ["limits", field] if LIMIT_FIELDS.contains(field) => {
                if let Some(limits) = &mut self.limits {
                    *limits.field_mut(field).expect("known limit field") = None;
                }
            }
            ["tls"] => self.tls = None,
            ["tls", "cert_path"] => {
                if let Some(tls) = &mut self.tls {
                    tls.cert_path = None;
                }
            }
            ["tls", "key_data"] => {
                if let Some(tls) = &mut self.tls {
                    tls.key_data = None;
                }
            }
            ["tls", "insecure"] => {
                if let Some(tls) = &mut self.tls {
                    tls.insecure = None;
                }
            }
            ["tls", "ca_bundle"] => {
                if let Some(tls) = &mut self.tls {
                    tls.ca_bundle = None;
                }
            }
            ["tags"] => self.tags.clear(),
            ["attributes"] => self.attributes.clear(),
            _ => return Err(SchemaError::UnknownPath(path.dotted())),
        }
        Ok(())
    }

    fn validate_spec(&self) -> Violations {
        let mut violations = Vec::new();
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.contains("://") {
                violations.push(Violation {
                    field: "endpoint".to_owned(),
                    constraint: "endpoint.scheme".to_owned(),
                    message: "endpoint must include a scheme".to_owned(),
                });
            }
        }
        if let Some(limits) = &self.limits {
            for name in LIMIT_FIELDS {
                if limits.field(name).is_some_and(|v| v < 0) {
                    violations.push(Violation {
                        field: format!("limits.{name}"),
                        constraint: "limits.non_negative".to_owned(),
                        message: "limit values must not be negative".to_owned(),
                    });
                }
            }
        }
        Violations { violations }
    }
}
