//! Elixir Term Conversion Utilities
//!
//! Converts extraction results and errors to Elixir terms.

use rustler::{Encoder, Env, NewBinary, Term};

use crate::error::Error;
use crate::extract::{Field, IndexedNode};

// Pre-defined atoms, created once at load
rustler::atoms! {
    ok,
    error,
    nil,
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

/// `{:ok, value}`
pub fn ok_tuple<'a>(env: Env<'a>, value: Term<'a>) -> Term<'a> {
    (ok(), value).encode(env)
}

/// `{:error, message}`
pub fn error_to_term<'a>(env: Env<'a>, err: &Error) -> Term<'a> {
    (error(), str_to_binary(env, &err.to_string())).encode(env)
}

/// `{name | nil, value, type}`; `value` has whitespace and case treatment applied
fn field_to_term<'a>(env: Env<'a>, field: &Field) -> Term<'a> {
    let name = match &field.name {
        Some(name) => str_to_binary(env, name),
        None => nil().encode(env),
    };
    let value = str_to_binary(env, &field.value());
    let field_type = str_to_binary(env, field.field_type().as_str());
    (name, value, field_type).encode(env)
}

/// `{rule_index, path, [field]}`
pub fn indexed_node_to_term<'a>(env: Env<'a>, node: &IndexedNode) -> Term<'a> {
    let mut fields = Term::list_new_empty(env);
    for field in node.fields.iter().rev() {
        fields = fields.list_prepend(field_to_term(env, field));
    }
    (node.rule, str_to_binary(env, &node.path), fields).encode(env)
}

/// List of nodes, in document order
pub fn indexed_nodes_to_term<'a>(env: Env<'a>, nodes: &[IndexedNode]) -> Term<'a> {
    let mut list = Term::list_new_empty(env);
    for node in nodes.iter().rev() {
        list = list.list_prepend(indexed_node_to_term(env, node));
    }
    list
}
