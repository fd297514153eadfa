use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::ast::{BinaryOperator, RelationOperator};
use crate::result::Result;

/// A compilation unit: a main procedure named `name` with its nested
/// declarations and body. Every name in the unit is resolved by the loader,
/// so a unit has exactly the structure a parser would produce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(flatten)]
    pub block: Block,
}

/// The declarations and body of a procedure or function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub consts: Vec<ConstDecl>,
    #[serde(default)]
    pub vars: Vec<VarDecl>,
    #[serde(default)]
    pub arrays: Vec<ArrayDecl>,
    #[serde(default)]
    pub routines: Vec<RoutineDecl>,
    #[serde(default)]
    pub body: Vec<SourceStatement>,
}

/// A nested procedure, or a function if `returns` names its type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutineDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<VarDecl>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(flatten)]
    pub block: Block,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub value: Literal,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Real(f64),
}

/// A variable or a parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub size: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatement {
    Assign {
        target: SourceExpr,
        value: SourceExpr,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<SourceExpr>,
    },
    While {
        cond: SourceExpr,
        #[serde(default)]
        body: Vec<SourceStatement>,
    },
    If {
        cond: SourceExpr,
        #[serde(default)]
        body: Vec<SourceStatement>,
        #[serde(default)]
        elsif: Vec<SourceElsif>,
        #[serde(default)]
        otherwise: Option<Vec<SourceStatement>>,
    },
    Return {
        #[serde(default)]
        value: Option<SourceExpr>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceElsif {
    pub cond: SourceExpr,
    #[serde(default)]
    pub body: Vec<SourceStatement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceExpr {
    Int(i64),
    Real(f64),
    Name(String),
    Index {
        array: String,
        index: Box<SourceExpr>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<SourceExpr>,
    },
    Neg(Box<SourceExpr>),
    Not(Box<SourceExpr>),
    Binary {
        op: BinaryOperator,
        left: Box<SourceExpr>,
        right: Box<SourceExpr>,
    },
    Relation {
        op: RelationOperator,
        left: Box<SourceExpr>,
        right: Box<SourceExpr>,
    },
}

impl Unit {
    /// Read a unit from YAML. JSON documents are valid YAML, so this reads
    /// both.
    pub fn read<R: std::io::Read>(src: R) -> std::result::Result<Unit, serde_yaml::Error> {
        serde_yaml::from_reader(src)
    }

    pub fn write<W: std::io::Write>(&self, dst: W) -> std::result::Result<(), serde_yaml::Error> {
        serde_yaml::to_writer(dst, self)
    }

    pub fn write_json<W: std::io::Write>(
        &self,
        dst: W,
    ) -> std::result::Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(dst, self)
    }
}

/// Read the unit stored in the file at `path`. Files with a `.json`
/// extension are read as JSON, every other file as YAML.
pub fn read_unit(path: &Path) -> Result<Unit> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Could not open {}: {}", path.display(), e))?;
    let reader = std::io::BufReader::new(file);

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_reader(reader).map_err(|e| format!("{}: {}", path.display(), e))
    } else {
        Unit::read(reader).map_err(|e| format!("{}: {}", path.display(), e))
    }
}
