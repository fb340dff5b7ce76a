//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::error::{ReelError, ReelResult};
use crate::utils::time::TimeParser;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Source recording
    #[arg(short, long)]
    pub input: PathBuf,

    /// Draft title (default: the file name)
    #[arg(short, long, default_value = "")]
    pub title: String,

    /// Only create the draft; skip proxy, sprite and waveform generation
    #[arg(long)]
    pub no_pipeline: bool,
}

/// Arguments for commands addressing one stored draft
#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Draft id
    #[arg(short, long)]
    pub draft: String,
}

/// Arguments for the show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Draft id
    #[arg(short, long)]
    pub draft: String,

    /// Print the whole draft as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the edit command
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Draft id
    #[arg(short, long)]
    pub draft: String,

    /// Stop at the first rejected operation and exit with an error
    #[arg(long)]
    pub strict: bool,

    /// Operations applied in order: in=T out=T seek=T add split merge delete
    /// speed marker select=N move=N rename=LABEL zoom=Z ripple=on|off undo redo
    #[arg(required = true, value_parser = parse_edit_op)]
    pub ops: Vec<EditOp>,
}

/// One editing step given on the command line
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    In(f64),
    Out(f64),
    Seek(f64),
    Add,
    Split,
    Merge,
    Delete,
    Speed,
    Marker,
    Select(usize),
    Move(usize),
    Rename(String),
    Zoom(f64),
    Ripple(bool),
    Undo,
    Redo,
}

impl EditOp {
    /// Parse `name` or `name=value`. Times accept every format of [`TimeParser`].
    pub fn parse(op: &str) -> ReelResult<Self> {
        let unknown = || ReelError::UnknownOperation { op: op.to_string() };
        let time = |value: &str| TimeParser::new().parse_time(value);
        let index = |value: &str| value.trim().parse::<usize>().map_err(|_| unknown());

        let (name, value) = match op.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value)),
            None => (op.trim(), None),
        };

        let parsed = match (name, value) {
            ("in", Some(v)) => EditOp::In(time(v)?),
            ("out", Some(v)) => EditOp::Out(time(v)?),
            ("seek", Some(v)) => EditOp::Seek(time(v)?),
            ("select", Some(v)) => EditOp::Select(index(v)?),
            ("move", Some(v)) => EditOp::Move(index(v)?),
            ("rename", Some(v)) => EditOp::Rename(v.to_string()),
            ("zoom", Some(v)) => EditOp::Zoom(v.trim().parse().map_err(|_| unknown())?),
            ("ripple", Some(v)) => match v.trim() {
                "on" | "true" => EditOp::Ripple(true),
                "off" | "false" => EditOp::Ripple(false),
                _ => return Err(unknown()),
            },
            ("add", None) => EditOp::Add,
            ("split", None) => EditOp::Split,
            ("merge", None) => EditOp::Merge,
            ("delete", None) => EditOp::Delete,
            ("speed", None) => EditOp::Speed,
            ("marker", None) => EditOp::Marker,
            ("undo", None) => EditOp::Undo,
            ("redo", None) => EditOp::Redo,
            _ => return Err(unknown()),
        };
        Ok(parsed)
    }
}

fn parse_edit_op(op: &str) -> Result<EditOp, String> {
    EditOp::parse(op).map_err(|e| e.to_string())
}
