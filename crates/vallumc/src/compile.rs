use std::fmt::Display;

use crate::diagnostics::Diagnostic;
use crate::ir::IrExpr;
use crate::program::Program;
use crate::types::Type;
use vallum_purposes::ScriptPurpose;

/// Source position handed over by the front end: module name plus a JSON
/// pointer into that module's AST document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Site {
    pub module: String,
    pub ptr: String,
}

impl Site {
    pub fn new(module: &str, ptr: impl Into<String>) -> Self {
        Self {
            module: module.to_string(),
            ptr: ptr.into(),
        }
    }

    /// Site of a child node, `key` being an object key or an array index.
    pub fn child(&self, key: impl Display) -> Self {
        Self {
            module: self.module.clone(),
            ptr: format!("{}/{key}", self.ptr),
        }
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ptr.is_empty() {
            write!(f, "{}", self.module)
        } else {
            write!(f, "{}:{}", self.module, self.ptr)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    /// Malformed or ill-formed source: duplicates, bad entry signatures, import cycles.
    Syntax,
    /// Names that do not resolve.
    Reference,
    /// Type mismatches and failed inference.
    Type,
    /// Compiler bugs, e.g. an IR reference nothing defines.
    Internal,
    /// A configured limit was exceeded.
    Budget,
}

impl CompileErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompileErrorKind::Syntax => "syntax error",
            CompileErrorKind::Reference => "reference error",
            CompileErrorKind::Type => "type error",
            CompileErrorKind::Internal => "internal error",
            CompileErrorKind::Budget => "budget exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub site: Option<Site>,
}

impl CompilerError {
    pub fn new(kind: CompileErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            site: None,
        }
    }

    pub fn at(kind: CompileErrorKind, site: &Site, message: String) -> Self {
        Self {
            kind,
            message,
            site: Some(site.clone()),
        }
    }

    pub fn syntax(site: &Site, message: String) -> Self {
        Self::at(CompileErrorKind::Syntax, site, message)
    }

    pub fn reference(site: &Site, message: String) -> Self {
        Self::at(CompileErrorKind::Reference, site, message)
    }

    pub fn type_error(site: &Site, message: String) -> Self {
        Self::at(CompileErrorKind::Type, site, message)
    }

    pub fn internal(message: String) -> Self {
        Self::new(CompileErrorKind::Internal, message)
    }

    pub fn budget(message: String) -> Self {
        Self::new(CompileErrorKind::Budget, message)
    }

    /// Attaches a site unless the error already carries a more precise one.
    pub fn or_at(mut self, site: &Site) -> Self {
        if self.site.is_none() && self.kind != CompileErrorKind::Internal {
            self.site = Some(site.clone());
        }
        self
    }
}

impl Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.site {
            Some(site) => write!(f, "{}: {} (at {site})", self.kind.as_str(), self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for CompilerError {}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Top-level constants of the main module to leave as `__PARAM_<i>` holes.
    pub parametric: Vec<String>,
    /// Value of the `*Hash::CURRENT` members available after `main`.
    pub current_script_hash: Option<Vec<u8>>,
    /// Overrides `limits::max_eval_steps()` for constant evaluation.
    pub max_eval_steps: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub purpose: ScriptPurpose,
    pub name: String,
    pub ir: IrExpr,
    /// Hole order of a parametric compile; empty otherwise.
    pub parameters: Vec<(String, Type)>,
    pub warnings: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn ir_text(&self) -> String {
        self.ir.to_string()
    }
}

/// Reads the given AST documents, type checks them and lowers the main module
/// into a closed IR expression.
pub fn compile_program(
    main: &[u8],
    modules: &[Vec<u8>],
    options: &CompileOptions,
) -> Result<CompileOutput, CompilerError> {
    let mut program = Program::from_json(main, modules)?;
    if let Some(steps) = options.max_eval_steps {
        program.set_max_eval_steps(steps);
    }
    if let Some(hash) = &options.current_script_hash {
        program.set_current_script_hash(hash.clone());
    }

    let (ir, parameters) = if options.parametric.is_empty() {
        (program.to_ir()?, Vec::new())
    } else {
        let parametric = program.compile_parametric(&options.parametric)?;
        (parametric.ir, parametric.parameters)
    };

    Ok(CompileOutput {
        purpose: program.purpose(),
        name: program.name().to_string(),
        ir,
        parameters,
        warnings: program.warnings().to_vec(),
    })
}
