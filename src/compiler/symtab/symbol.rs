use serde::Serialize;

use crate::compiler::{stringpool::PoolIndex, Position};

/// Index of a [`Symbol`] in the [`SymbolTable`](super::SymbolTable).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize)]
pub struct SymId(usize);

impl SymId {
    pub(super) fn new(id: usize) -> SymId {
        SymId(id)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SymId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// The value bound to a constant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ConstValue {
    Integer(i64),
    Real(f64),
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Integer(i) => f.write_fmt(format_args!("{}", i)),
            ConstValue::Real(r) => f.write_fmt(format_args!("{:?}", r)),
        }
    }
}

/// Data which is common to procedures and functions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Routine {
    /// Bytes of the activation record taken by locals and temporaries.
    pub ar_size: i64,

    /// Number of the assembly label of the routine's entry point.
    pub label_nr: i64,

    /// Parameters form a list linked from the last declared back to the
    /// first.
    pub last_parameter: Option<SymId>,
}

impl Routine {
    pub fn new(label_nr: i64) -> Routine {
        Routine {
            ar_size: 0,
            label_nr,
            last_parameter: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum SymbolKind {
    /// Installed but not yet filled in by one of the `enter_*` operations.
    Undefined,
    NameType,
    Constant(ConstValue),
    Variable,
    Array {
        cardinality: i64,
        index_type: SymId,
    },
    Parameter {
        size: i64,
        preceding: Option<SymId>,
    },
    Procedure(Routine),
    Function(Routine),
}

/// The discriminant of a [`SymbolKind`], for reporting and dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SymTag {
    Undefined,
    NameType,
    Constant,
    Variable,
    Array,
    Parameter,
    Procedure,
    Function,
}

impl std::fmt::Display for SymTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SymTag::Undefined => "SYM_UNDEF",
            SymTag::NameType => "SYM_NAMETYPE",
            SymTag::Constant => "SYM_CONST",
            SymTag::Variable => "SYM_VAR",
            SymTag::Array => "SYM_ARRAY",
            SymTag::Parameter => "SYM_PARAM",
            SymTag::Procedure => "SYM_PROC",
            SymTag::Function => "SYM_FUNC",
        })
    }
}

/// A named entity declared in a compilation unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Symbol {
    #[serde(rename = "pool_index")]
    pub name: PoolIndex,

    /// A `NameType` symbol. Primitive name types are their own type.
    pub ty: SymId,

    /// Nesting depth of the scope the symbol was declared in. The implicit
    /// global environment is level 0.
    pub level: usize,

    /// For variables and arrays, the byte offset within the owning
    /// activation record. For parameters, the total size of the parameters
    /// declared after this one.
    pub offset: i64,

    /// The symbol which was at the head of this symbol's hash bucket when it
    /// was installed.
    pub hash_link: Option<SymId>,

    /// The hash bucket this symbol was installed into.
    pub back_link: usize,

    pub pos: Option<Position>,

    pub kind: SymbolKind,
}

impl Symbol {
    pub fn tag(&self) -> SymTag {
        match self.kind {
            SymbolKind::Undefined => SymTag::Undefined,
            SymbolKind::NameType => SymTag::NameType,
            SymbolKind::Constant(_) => SymTag::Constant,
            SymbolKind::Variable => SymTag::Variable,
            SymbolKind::Array { .. } => SymTag::Array,
            SymbolKind::Parameter { .. } => SymTag::Parameter,
            SymbolKind::Procedure(_) => SymTag::Procedure,
            SymbolKind::Function(_) => SymTag::Function,
        }
    }

    /// The routine data of a procedure or function.
    pub fn routine(&self) -> Option<&Routine> {
        match &self.kind {
            SymbolKind::Procedure(r) | SymbolKind::Function(r) => Some(r),
            _ => None,
        }
    }

    pub fn routine_mut(&mut self) -> Option<&mut Routine> {
        match &mut self.kind {
            SymbolKind::Procedure(r) | SymbolKind::Function(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.routine().is_some()
    }
}
