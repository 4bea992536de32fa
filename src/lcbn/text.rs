//! Textual encoding of callback records.
//!
//! One record per line; the exact field order is the compatibility contract
//! between the encoder and decoder, so both sides are written against the
//! same field table below and must never drift.
//!
//! Identifier fields (`name`, `context`, `cb`, `callback_info`, `registrar`,
//! `tree_parent`, dependency entries) are opaque per-run identifiers and are
//! not expected to match across processes. The decoder reconstructs only the
//! scalar fields, timestamps, flags, global ids, and the dependency
//! identifier list; tree linkage and the registrar must be rebuilt by a
//! higher layer from context.

use super::{CallbackType, Handle, Lcbn, Registry};
use crate::stamp::Stamp;
use crate::tree::NodeRef;
use std::fmt::Write as _;

/// Field tags, in wire order.
const FIELDS: [&str; 21] = [
    "name",
    "context",
    "context_type",
    "cb",
    "cb_type",
    "cb_behavior",
    "tree_number",
    "tree_level",
    "level_entry",
    "exec_id",
    "reg_id",
    "callback_info",
    "registrar",
    "tree_parent",
    "registration_time",
    "start_time",
    "end_time",
    "executing_thread",
    "active",
    "finished",
    "dependencies",
];

/// Error decoding a textual callback record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Wrong number of ` | `-separated fields.
    #[error("record truncated: expected {expected} fields, found {found}")]
    Truncated {
        /// Fields the format defines.
        expected: usize,
        /// Fields actually present.
        found: usize,
    },
    /// A field did not carry the expected tag.
    #[error("expected field <{expected}>, found {found:?}")]
    UnexpectedTag {
        /// Tag the format defines at this position.
        expected: &'static str,
        /// What the input carried instead.
        found: String,
    },
    /// A field value failed to parse.
    #[error("malformed <{field}> value {value:?}")]
    Malformed {
        /// The field being parsed.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// A classification token does not belong to the closed token set.
    #[error("unknown token {token:?} in <{field}>")]
    UnknownToken {
        /// The field being parsed.
        field: &'static str,
        /// The offending token.
        token: String,
    },
    /// A classification token disagrees with the record's callback type.
    #[error("<{field}> token {token:?} inconsistent with callback type {cb_type}")]
    Inconsistent {
        /// The field being parsed.
        field: &'static str,
        /// The token the input carried.
        token: String,
        /// The callback type the record declared.
        cb_type: CallbackType,
    },
}

fn opt_ref(r: Option<NodeRef>) -> NodeRef {
    r.unwrap_or(NodeRef::NONE)
}

fn opt_id(id: Option<u64>) -> i64 {
    match id {
        Some(id) => i64::try_from(id).expect("global id exceeds i64"),
        None => -1,
    }
}

fn opt_stamp(s: Option<Stamp>) -> Stamp {
    s.unwrap_or(Stamp::ZERO)
}

impl Registry {
    /// Encodes one node as a single-line textual record.
    ///
    /// The inverse of [`decode`] for every field the encoding covers. Tree
    /// depth and sibling index are read live from the forest; `tree_number`
    /// is reserved and always encodes as `0`.
    ///
    /// # Panics
    ///
    /// Panics if the ref is stale.
    #[must_use]
    pub fn encode(&self, node: NodeRef) -> String {
        let lcbn = self.node(node);
        let mut deps = String::new();
        for (i, dep) in lcbn.dependencies.iter().enumerate() {
            if i > 0 {
                deps.push(' ');
            }
            let _ = write!(deps, "{dep}");
        }

        format!(
            "<name> <{name}> | <context> <{context}> | <context_type> <{context_type}> | \
             <cb> <{cb}> | <cb_type> <{cb_type}> | <cb_behavior> <{cb_behavior}> | \
             <tree_number> <0> | <tree_level> <{tree_level}> | <level_entry> <{level_entry}> | \
             <exec_id> <{exec_id}> | <reg_id> <{reg_id}> | <callback_info> <{info}> | \
             <registrar> <{registrar}> | <tree_parent> <{tree_parent}> | \
             <registration_time> <{registration_time}> | <start_time> <{start_time}> | \
             <end_time> <{end_time}> | <executing_thread> <{executing_thread}> | \
             <active> <{active}> | <finished> <{finished}> | <dependencies> <{deps}>",
            name = node,
            context = lcbn.context,
            context_type = lcbn.cb_type.context_kind(),
            cb = lcbn.cb,
            cb_type = lcbn.cb_type,
            cb_behavior = lcbn.cb_type.behavior(),
            tree_level = self.depth(node),
            level_entry = self.child_index(node),
            exec_id = opt_id(lcbn.global_exec_id),
            reg_id = opt_id(lcbn.global_reg_id),
            info = lcbn.info.map_or_else(|| "0x0".to_string(), |h| h.to_string()),
            registrar = opt_ref(lcbn.registrar),
            tree_parent = opt_ref(self.parent(node)),
            registration_time = lcbn.registration_time,
            start_time = opt_stamp(lcbn.start_time),
            end_time = opt_stamp(lcbn.end_time),
            executing_thread = opt_id(lcbn.executing_thread),
            active = u8::from(lcbn.active),
            finished = u8::from(lcbn.finished),
            deps = deps,
        )
    }
}

fn split_field<'a>(part: &'a str, expected: &'static str) -> Result<&'a str, ParseError> {
    let bad_tag = || ParseError::UnexpectedTag {
        expected,
        found: part.to_string(),
    };
    let (tag, value) = part.split_once("> <").ok_or_else(bad_tag)?;
    let tag = tag.strip_prefix('<').ok_or_else(bad_tag)?;
    if tag != expected {
        return Err(bad_tag());
    }
    value.strip_suffix('>').ok_or_else(bad_tag)
}

fn parse_hex(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value
        .strip_prefix("0x")
        .and_then(|v| u64::from_str_radix(v, 16).ok())
        .ok_or_else(|| ParseError::Malformed {
            field,
            value: value.to_string(),
        })
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value.parse().map_err(|_| ParseError::Malformed {
        field,
        value: value.to_string(),
    })
}

fn parse_opt_id(field: &'static str, value: &str) -> Result<Option<u64>, ParseError> {
    match parse_int(field, value)? {
        -1 => Ok(None),
        id if id >= 0 => Ok(Some(id as u64)),
        _ => Err(ParseError::Malformed {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_stamp(field: &'static str, value: &str) -> Result<Stamp, ParseError> {
    value.parse().map_err(|_| ParseError::Malformed {
        field,
        value: value.to_string(),
    })
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ParseError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ParseError::Malformed {
            field,
            value: value.to_string(),
        }),
    }
}

/// Decodes one textual callback record.
///
/// The returned node is detached: it belongs to no registry, its tree
/// linkage and registrar are unset, and its dependency refs are the raw
/// identifiers of the emitting run. The classification tokens must agree
/// with the record's callback type.
pub fn decode(line: &str) -> Result<Lcbn, ParseError> {
    let parts: Vec<&str> = line.trim_end_matches('\n').split(" | ").collect();
    if parts.len() != FIELDS.len() {
        return Err(ParseError::Truncated {
            expected: FIELDS.len(),
            found: parts.len(),
        });
    }
    let mut values = [""; 21];
    for (i, (part, tag)) in parts.iter().zip(FIELDS).enumerate() {
        values[i] = split_field(part, tag)?;
    }

    let cb_type: CallbackType =
        values[4].parse().map_err(|()| ParseError::UnknownToken {
            field: "cb_type",
            token: values[4].to_string(),
        })?;
    let context_kind = values[2]
        .parse::<super::ContextKind>()
        .map_err(|()| ParseError::UnknownToken {
            field: "context_type",
            token: values[2].to_string(),
        })?;
    if context_kind != cb_type.context_kind() {
        return Err(ParseError::Inconsistent {
            field: "context_type",
            token: values[2].to_string(),
            cb_type,
        });
    }
    let behavior = values[5]
        .parse::<super::CallbackBehavior>()
        .map_err(|()| ParseError::UnknownToken {
            field: "cb_behavior",
            token: values[5].to_string(),
        })?;
    if behavior != cb_type.behavior() {
        return Err(ParseError::Inconsistent {
            field: "cb_behavior",
            token: values[5].to_string(),
            cb_type,
        });
    }

    // tree_number / tree_level / level_entry are derived fields; validate
    // their shape but do not reconstruct them.
    parse_int("tree_number", values[6])?;
    parse_int("tree_level", values[7])?;
    parse_int("level_entry", values[8])?;
    parse_hex("name", values[0])?;
    parse_hex("registrar", values[12])?;
    parse_hex("tree_parent", values[13])?;

    let info = match parse_hex("callback_info", values[11])? {
        0 => None,
        raw => Some(Handle(raw)),
    };
    // The encoder writes unset start/end stamps as the zero stamp, the same
    // convention as the original zeroed timespecs.
    let start = parse_stamp("start_time", values[15])?;
    let start_time = (start != Stamp::ZERO).then_some(start);
    let end = parse_stamp("end_time", values[16])?;
    let end_time = (end != Stamp::ZERO).then_some(end);

    let dependencies = if values[20].is_empty() {
        Vec::new()
    } else {
        values[20]
            .split(' ')
            .map(|token| parse_hex("dependencies", token).map(NodeRef::from_raw))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Lcbn {
        context: Handle(parse_hex("context", values[1])?),
        cb: Handle(parse_hex("cb", values[3])?),
        cb_type,
        global_exec_id: parse_opt_id("exec_id", values[9])?,
        global_reg_id: parse_opt_id("reg_id", values[10])?,
        info,
        registrar: None,
        registration_time: parse_stamp("registration_time", values[14])?,
        start_time,
        end_time,
        executing_thread: parse_opt_id("executing_thread", values[17])?,
        active: parse_flag("active", values[18])?,
        finished: parse_flag("finished", values[19])?,
        dependencies,
    })
}
