//! Serialized table layout, as produced by the offline generator.

use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct RawHeader {
    pub(crate) abi_version: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLanguage {
    #[allow(dead_code)]
    pub(crate) abi_version: u32,
    pub(crate) name: String,
    pub(crate) symbols: Vec<RawSymbol>,
    #[serde(default)]
    pub(crate) fields: Vec<String>,
    pub(crate) productions: Vec<RawProduction>,
    pub(crate) states: Vec<RawState>,
    pub(crate) lex_states: Vec<Vec<u32>>,
    #[serde(default)]
    pub(crate) external_lex_states: Vec<Vec<u32>>,
    #[serde(default)]
    pub(crate) extras: Vec<u32>,
    #[serde(default)]
    pub(crate) recovery_boundaries: Vec<u32>,
    #[serde(default)]
    pub(crate) external_scanner: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawSymbol {
    pub(crate) name: String,
    pub(crate) kind: RawSymbolKind,
    #[serde(default = "default_named")]
    pub(crate) named: bool,
    #[serde(default)]
    pub(crate) pattern: Option<RawPattern>,
    #[serde(default)]
    pub(crate) precedence: Option<i32>,
    #[serde(default)]
    pub(crate) associativity: Option<RawAssociativity>,
}

fn default_named() -> bool {
    true
}

#[derive(Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RawSymbolKind {
    Terminal,
    NonTerminal,
    External,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RawPattern {
    String(String),
    Regex(String),
}

#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RawAssociativity {
    Left,
    Right,
    None,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawProduction {
    pub(crate) lhs: u32,
    pub(crate) child_count: u16,
    #[serde(default)]
    pub(crate) precedence: Option<i32>,
    #[serde(default)]
    pub(crate) associativity: Option<RawAssociativity>,
    #[serde(default)]
    pub(crate) dynamic_precedence: i32,
    #[serde(default)]
    pub(crate) fields: Vec<RawFieldEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFieldEntry {
    pub(crate) field: u32,
    pub(crate) child_index: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawState {
    pub(crate) lex_state: u32,
    #[serde(default)]
    pub(crate) external_lex_state: u32,
    #[serde(default)]
    pub(crate) actions: Vec<RawActionEntry>,
    #[serde(default)]
    pub(crate) gotos: Vec<RawGoto>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawActionEntry {
    pub(crate) symbol: u32,
    pub(crate) actions: Vec<RawAction>,
}

#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RawAction {
    Shift(u32),
    Reduce(u32),
    Accept,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawGoto {
    pub(crate) symbol: u32,
    pub(crate) state: u32,
}
