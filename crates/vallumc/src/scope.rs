//! Name scopes used while checking statements.

use std::collections::BTreeMap;

use crate::compile::{CompilerError, Site};
use crate::instance::Instance;
use crate::types::Type;
use crate::validate::is_discard_name;

/// A module-level declaration as seen by name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Type(Type),
    Func {
        inst: Instance,
        path: String,
    },
    Const {
        /// Known once the annotation or the value has been checked.
        ty: Option<Type>,
        path: String,
        /// False until the declaration itself has been checked.
        ready: bool,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    symbol: Symbol,
    site: Site,
    /// Declared in this module rather than imported.
    own: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleScope {
    module: String,
    symbols: BTreeMap<String, Entry>,
}

impl ModuleScope {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str, symbol: Symbol, site: &Site) -> Result<(), CompilerError> {
        self.insert(name, symbol, site, true)
    }

    pub fn import(&mut self, name: &str, symbol: Symbol, site: &Site) -> Result<(), CompilerError> {
        self.insert(name, symbol, site, false)
    }

    fn insert(&mut self, name: &str, symbol: Symbol, site: &Site, own: bool) -> Result<(), CompilerError> {
        if let Some(prev) = self.symbols.get(name) {
            return Err(CompilerError::syntax(
                site,
                format!(
                    "{name} is already declared in module {} (at {})",
                    self.module, prev.site
                ),
            ));
        }
        self.symbols.insert(
            name.to_string(),
            Entry {
                symbol,
                site: site.clone(),
                own,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name).map(|e| &e.symbol)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name).map(|e| &mut e.symbol)
    }

    /// Declarations other modules may import.
    pub fn exported(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name).filter(|e| e.own).map(|e| &e.symbol)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct Local {
    name: String,
    inst: Instance,
    site: Site,
    used: bool,
}

/// Lexical frames of local bindings inside one declaration.
#[derive(Debug, Default)]
pub struct LocalScope {
    frames: Vec<Vec<Local>>,
}

impl LocalScope {
    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn declare(&mut self, name: &str, inst: Instance, site: &Site) -> Result<(), CompilerError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(CompilerError::internal(format!(
                "local {name} declared outside of any frame"
            )));
        };
        if !is_discard_name(name) && frame.iter().any(|l| l.name == name) {
            return Err(CompilerError::syntax(
                site,
                format!("duplicate binding {name}"),
            ));
        }
        frame.push(Local {
            name: name.to_string(),
            inst,
            site: site.clone(),
            used: false,
        });
        Ok(())
    }

    /// Innermost binding of `name`, marked as used.
    pub fn lookup(&mut self, name: &str) -> Option<Instance> {
        if name == "_" {
            return None;
        }
        for frame in self.frames.iter_mut().rev() {
            if let Some(local) = frame.iter_mut().rev().find(|l| l.name == name) {
                local.used = true;
                return Some(local.inst.clone());
            }
        }
        None
    }

    /// Drops the innermost frame; an unused binding is an error.
    pub fn pop_frame(&mut self) -> Result<(), CompilerError> {
        let frame = self.frames.pop().unwrap_or_default();
        match frame
            .iter()
            .find(|l| !l.used && !is_discard_name(&l.name) && l.name != "self")
        {
            Some(l) => Err(CompilerError::reference(
                &l.site,
                format!("unused variable {}; prefix it with _ to ignore it", l.name),
            )),
            None => Ok(()),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.frames
            .iter()
            .flat_map(|f| f.iter().map(|l| l.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompileErrorKind;

    fn site() -> Site {
        Site::new("m", "/statements/0")
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let mut s = LocalScope::default();
        s.push_frame();
        s.declare("x", Instance::Data(Type::int()), &site()).expect("declare");
        s.push_frame();
        s.declare("x", Instance::Data(Type::bool()), &site()).expect("shadow");
        assert_eq!(s.lookup("x"), Some(Instance::Data(Type::bool())));
        s.pop_frame().expect("inner used");
        let err = s.pop_frame().expect_err("outer x never read");
        assert_eq!(err.kind, CompileErrorKind::Reference);
        assert!(err.message.contains("unused variable x"), "{}", err.message);
    }

    #[test]
    fn discards_and_duplicates() {
        let mut s = LocalScope::default();
        s.push_frame();
        s.declare("_", Instance::Data(Type::data()), &site()).expect("discard");
        s.declare("_", Instance::Data(Type::data()), &site()).expect("second discard");
        s.declare("_unused", Instance::Data(Type::int()), &site()).expect("prefixed");
        s.declare("a", Instance::Data(Type::int()), &site()).expect("a");
        let err = s
            .declare("a", Instance::Data(Type::int()), &site())
            .expect_err("duplicate");
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert!(s.lookup("_").is_none());
        assert!(s.lookup("a").is_some());
        s.pop_frame().expect("all used or discarded");
    }

    #[test]
    fn imports_are_not_reexported() {
        let mut m = ModuleScope::new("lib");
        m.declare(
            "f",
            Symbol::Func {
                inst: Instance::Data(Type::int()),
                path: "__module__lib__f".to_string(),
            },
            &site(),
        )
        .expect("declare");
        m.import("Other", Symbol::Type(Type::int()), &site()).expect("import");
        assert!(m.exported("f").is_some());
        assert!(m.exported("Other").is_none());
        assert!(m.get("Other").is_some());
        assert!(m.declare("f", Symbol::Type(Type::bool()), &site()).is_err());
    }
}
