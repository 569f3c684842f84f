use crate::engine::EngineError;
use object::{BinaryFormat, Object, ObjectKind, ObjectSymbol, SymbolKind};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Demangled name without a hash suffix.
    pub name: String,
    pub kind: SymbolKind,
    /// Link time (not relocated) address.
    pub addr: u64,
    pub size: u64,
}

/// ELF symbol table of a debugged program.
#[derive(Debug)]
pub struct SymbolTable {
    pie: bool,
    entry: u64,
    /// Sorted by address.
    functions: Vec<Symbol>,
    by_name: HashMap<String, usize>,
    data: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EngineError::TargetNotFound(path.to_path_buf()),
            _ => EngineError::IO(e),
        })?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let object = object::File::parse(&*mmap)?;

        if object.format() != BinaryFormat::Elf {
            return Err(EngineError::InvalidTarget(
                path.to_path_buf(),
                "not an ELF file".to_string(),
            ));
        }
        if !matches!(object.kind(), ObjectKind::Executable | ObjectKind::Dynamic) {
            return Err(EngineError::InvalidTarget(
                path.to_path_buf(),
                "not an executable".to_string(),
            ));
        }

        let mut functions = vec![];
        let mut data = HashMap::new();
        for symbol in object.symbols().chain(object.dynamic_symbols()) {
            if !symbol.is_definition() || symbol.address() == 0 {
                continue;
            }
            let Ok(raw_name) = symbol.name() else {
                continue;
            };
            let name = format!("{:#}", rustc_demangle::demangle(raw_name));
            let symbol = Symbol {
                name,
                kind: symbol.kind(),
                addr: symbol.address(),
                size: symbol.size(),
            };

            match symbol.kind {
                SymbolKind::Text => functions.push(symbol),
                SymbolKind::Data => {
                    data.insert(symbol.name.clone(), symbol);
                }
                _ => {}
            }
        }

        functions.sort_by_key(|s| s.addr);
        functions.dedup_by(|a, b| a.addr == b.addr && a.name == b.name);
        let by_name = functions
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.name.clone(), idx))
            .collect();

        log::debug!(
            target: "engine",
            "{} functions and {} data symbols loaded from {path:?}",
            functions.len(),
            data.len()
        );

        Ok(Self {
            pie: object.kind() == ObjectKind::Dynamic,
            entry: object.entry(),
            functions,
            by_name,
            data,
        })
    }

    /// True if a program is position independent and must be relocated.
    pub fn is_pie(&self) -> bool {
        self.pie
    }

    pub fn entry(&self) -> u64 {
        self.entry
    }

    pub fn find_function(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|idx| &self.functions[*idx])
    }

    pub fn find_data(&self, name: &str) -> Option<&Symbol> {
        self.data.get(name)
    }

    /// Return a function that contains a link time address.
    pub fn function_at(&self, addr: u64) -> Option<&Symbol> {
        let idx = self.functions.partition_point(|s| s.addr <= addr);
        let candidate = self.functions.get(idx.checked_sub(1)?)?;
        (addr < candidate.addr + candidate.size.max(1)).then_some(candidate)
    }
}
