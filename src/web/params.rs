//! Parameter descriptors and the arguments bound from them.

use crate::core::{AppError, AppResult, DocId};
use crate::web::session::SessionHandle;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// The ambient session; never read from the request.
    Session,
    Str,
    Id,
    Int,
    /// Nested object rebuilt from dotted or bracketed keys.
    Partial,
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub optional: bool,
    /// Known nested fields of a partial parameter, for the admin console.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<&'static str>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
            fields: Vec::new(),
        }
    }

    pub fn session() -> Self {
        Self::new("session", ParamKind::Session)
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, ParamKind::Str)
    }

    pub fn id(name: &'static str) -> Self {
        Self::new(name, ParamKind::Id)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, ParamKind::Int)
    }

    pub fn partial(name: &'static str, fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
            ..Self::new(name, ParamKind::Partial)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A bound argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Session(SessionHandle),
    Str(String),
    Id(DocId),
    Int(i64),
    Object(Map<String, Value>),
    /// An optional parameter the request did not supply.
    Absent,
}

impl Arg {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Str(_) => "string",
            Self::Id(_) => "id",
            Self::Int(_) => "integer",
            Self::Object(_) => "object",
            Self::Absent => "absent",
        }
    }
}

/// Arguments for one handler invocation, in declaration order.
///
/// Named accessors look an argument up by its declared name. Asking for the
/// wrong kind is a programming error in the route table and surfaces as an
/// internal error.
#[derive(Debug, Clone)]
pub struct BoundCall {
    names: Vec<&'static str>,
    args: Vec<Arg>,
}

impl BoundCall {
    pub(crate) fn new(names: Vec<&'static str>, args: Vec<Arg>) -> Self {
        Self { names, args }
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, name: &str) -> AppResult<&Arg> {
        self.names
            .iter()
            .position(|declared| *declared == name)
            .map(|index| &self.args[index])
            .ok_or_else(|| AppError::internal(format!("route declares no parameter '{name}'")))
    }

    fn mismatch(&self, name: &str, wanted: &str, got: &Arg) -> AppError {
        AppError::internal(format!(
            "parameter '{name}' is bound as {}, handler wants {wanted}",
            got.kind_name()
        ))
    }

    pub fn session(&self) -> AppResult<SessionHandle> {
        let found = self.args.iter().find_map(|arg| match arg {
            Arg::Session(handle) => Some(handle.clone()),
            _ => None,
        });
        found.ok_or_else(|| AppError::internal("route declares no session parameter"))
    }

    pub fn str(&self, name: &str) -> AppResult<String> {
        match self.get(name)? {
            Arg::Str(value) => Ok(value.clone()),
            other => Err(self.mismatch(name, "string", other)),
        }
    }

    pub fn opt_str(&self, name: &str) -> AppResult<Option<String>> {
        match self.get(name)? {
            Arg::Absent => Ok(None),
            Arg::Str(value) => Ok(Some(value.clone())),
            other => Err(self.mismatch(name, "string", other)),
        }
    }

    pub fn id(&self, name: &str) -> AppResult<DocId> {
        match self.get(name)? {
            Arg::Id(value) => Ok(*value),
            other => Err(self.mismatch(name, "id", other)),
        }
    }


    pub fn int(&self, name: &str) -> AppResult<i64> {
        match self.get(name)? {
            Arg::Int(value) => Ok(*value),
            other => Err(self.mismatch(name, "integer", other)),
        }
    }


    pub fn object(&self, name: &str) -> AppResult<Map<String, Value>> {
        match self.get(name)? {
            Arg::Object(value) => Ok(value.clone()),
            other => Err(self.mismatch(name, "object", other)),
        }
    }

    pub fn opt_object(&self, name: &str) -> AppResult<Option<Map<String, Value>>> {
        match self.get(name)? {
            Arg::Absent => Ok(None),
            Arg::Object(value) => Ok(Some(value.clone())),
            other => Err(self.mismatch(name, "object", other)),
        }
    }

}
