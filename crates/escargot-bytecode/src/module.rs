//! Compiled module format.
//!
//! A `ByteCodeBlock` is the output of compiling one function (including the
//! top-level program, itself treated as a zero-parameter function body).
//! A `Module` bundles every `ByteCodeBlock` a compilation unit produced plus
//! its class table and metadata. Encoding reuses `serde_json`, wrapped in a
//! small fixed header (magic, version, flags, CRC32 checksum) so tooling
//! built around that on-disk framing keeps working across versions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::literal_pool::{GlobalSlotTable, NumeralPool, StringPool, TaggedTemplateTable};
use crate::opcode::Instr;
use crate::pause::PauseSiteTable;

/// Magic number for Escargot bytecode files.
pub const MAGIC: [u8; 4] = *b"ESBC";

/// Current bytecode format version.
pub const VERSION: u32 = 1;

/// Module encoding/decoding errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("invalid magic number: expected {MAGIC:?}, got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported bytecode version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    #[error("checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("truncated module header")]
    TruncatedHeader,

    #[error("malformed module payload: {0}")]
    MalformedPayload(String),
}

/// Module-level flags.
pub mod flags {
    pub const HAS_DEBUG_INFO: u32 = 1 << 0;
    pub const HAS_TAIL_CALLS: u32 = 1 << 1;
}

/// Compiled output of one function body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByteCodeBlock {
    pub name: String,
    pub param_count: u32,
    pub code: Vec<Instr>,
    pub strings: StringPool,
    pub numerals: NumeralPool,
    pub tagged_templates: TaggedTemplateTable,
    pub global_slots: GlobalSlotTable,
    pub pause_sites: PauseSiteTable,
    /// Size of the register file this block needs, in register-sized
    /// slots, covering the scratch, variable and numeral-cache ranges the
    /// codegen actually used.
    pub required_register_file_size_in_value_size: u32,
    /// True if this block contains any `await`/`yield` and therefore needs
    /// the interpreter's extended (suspendable) execution state rather than
    /// a plain call frame.
    pub needs_extended_execution_state: bool,
    /// True if control can leave this block via an abrupt completion that
    /// must pop a partially-built expression stack before propagating
    /// (try/finally interaction).
    pub should_clear_stack: bool,
    /// Debug line-table: (code position, source index) pairs, populated
    /// only when `CodegenOptions::emit_debug_line_info` is set.
    pub code_positions: Vec<(u32, u32)>,
}

impl ByteCodeBlock {
    pub fn new(name: String, param_count: u32) -> Self {
        Self {
            name,
            param_count,
            code: Vec::new(),
            strings: StringPool::new(),
            numerals: NumeralPool::new(),
            tagged_templates: TaggedTemplateTable::new(),
            global_slots: GlobalSlotTable::new(),
            pause_sites: PauseSiteTable::new(),
            required_register_file_size_in_value_size: 0,
            needs_extended_execution_state: false,
            should_clear_stack: false,
            code_positions: Vec::new(),
        }
    }

    /// Maximum pause-statement tail-data length any `await`/`yield` in this
    /// block needs reserved ([`crate::pause::PauseSiteTable`]).
    pub fn max_pause_statement_extra_data_length(&self) -> u32 {
        self.pause_sites.max_tail_data_length()
    }
}

/// One method entry in a [`ClassDef`]'s method table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub function_id: u32,
    pub is_static: bool,
    pub is_getter: bool,
    pub is_setter: bool,
}

/// A compiled class: its constructor's function id plus its
/// method table. Field initializers themselves live inside the
/// constructor's `ByteCodeBlock` as `SetFieldData`/`SetStaticFieldData`
/// instructions, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: Option<String>,
    pub constructor_function_id: u32,
    pub field_count: u32,
    pub static_field_count: u32,
    pub methods: Vec<Method>,
}

/// Module-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub source_file: Option<String>,
}

/// A fully compiled unit: every function's bytecode plus the class and
/// metadata tables referencing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub magic: [u8; 4],
    pub version: u32,
    pub flags: u32,
    pub functions: Vec<ByteCodeBlock>,
    pub classes: Vec<ClassDef>,
    pub metadata: Metadata,
}

impl Module {
    pub fn new(name: String) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            functions: Vec::new(),
            classes: Vec::new(),
            metadata: Metadata { name, source_file: None },
        }
    }

    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.magic != MAGIC {
            return Err(ModuleError::InvalidMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(ModuleError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    /// Serializes the module to its on-disk representation: a fixed
    /// 16-byte header (magic, version, flags, CRC32 of the payload)
    /// followed by a `serde_json` payload.
    pub fn encode(&self) -> Vec<u8> {
        let payload = serde_json::to_vec(&PayloadRef {
            functions: &self.functions,
            classes: &self.classes,
            metadata: &self.metadata,
        })
        .expect("ByteCodeBlock/ClassDef/Metadata are always JSON-serializable");

        let checksum = crc32fast::hash(&payload);

        let mut out = Vec::with_capacity(16 + payload.len());
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        if data.len() < 16 {
            return Err(ModuleError::TruncatedHeader);
        }

        let magic: [u8; 4] = data[0..4].try_into().unwrap();
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let flags = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let stored_checksum = u32::from_le_bytes(data[12..16].try_into().unwrap());

        let payload = &data[16..];
        let actual_checksum = crc32fast::hash(payload);
        if stored_checksum != actual_checksum {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_checksum,
                actual: actual_checksum,
            });
        }

        let decoded: PayloadOwned = serde_json::from_slice(payload)
            .map_err(|e| ModuleError::MalformedPayload(e.to_string()))?;

        Ok(Self {
            magic,
            version,
            flags,
            functions: decoded.functions,
            classes: decoded.classes,
            metadata: decoded.metadata,
        })
    }

    /// A deterministic content hash of the module's encoded form, so
    /// identical source compiles to a byte-identical, identically-hashed
    /// module and callers can use it as a cache
    /// key without re-comparing the full byte stream.
    pub fn content_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.encode());
        hasher.finalize().into()
    }
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    functions: &'a [ByteCodeBlock],
    classes: &'a [ClassDef],
    metadata: &'a Metadata,
}

#[derive(Deserialize)]
struct PayloadOwned {
    functions: Vec<ByteCodeBlock>,
    classes: Vec<ClassDef>,
    metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{Instr, Scalar};
    use crate::register::NO_REGISTER;

    #[test]
    fn new_module_validates() {
        let module = Module::new("test".to_string());
        assert!(module.validate().is_ok());
    }

    #[test]
    fn empty_module_round_trips() {
        let module = Module::new("test_module".to_string());
        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded.magic, MAGIC);
        assert_eq!(decoded.metadata.name, "test_module");
        assert!(decoded.functions.is_empty());
        assert!(decoded.classes.is_empty());
    }

    #[test]
    fn module_with_function_round_trips() {
        let mut module = Module::new("test".to_string());
        let mut block = ByteCodeBlock::new("main".to_string(), 0);
        block.code.push(Instr::LoadLiteral { dst: 0, value: Scalar::I32(42) });
        block.code.push(Instr::End { src: 0 });
        module.functions.push(block);

        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();

        assert_eq!(decoded.functions.len(), 1);
        assert_eq!(decoded.functions[0].name, "main");
        assert_eq!(decoded.functions[0].code.len(), 2);
    }

    #[test]
    fn module_with_strings_round_trips() {
        let mut module = Module::new("test".to_string());
        let mut block = ByteCodeBlock::new("main".to_string(), 0);
        let id = block.strings.intern("hello");
        block.code.push(Instr::LoadStringLiteral { dst: 0, value: id });
        module.functions.push(block);

        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded.functions[0].strings.get(id), Some("hello"));
    }

    #[test]
    fn module_with_class_round_trips() {
        let mut module = Module::new("test".to_string());
        module.classes.push(ClassDef {
            name: Some("MyClass".to_string()),
            constructor_function_id: 0,
            field_count: 3,
            static_field_count: 0,
            methods: vec![Method {
                name: "doSomething".to_string(),
                function_id: 1,
                is_static: false,
                is_getter: false,
                is_setter: false,
            }],
        });

        let bytes = module.encode();
        let decoded = Module::decode(&bytes).unwrap();
        assert_eq!(decoded.classes.len(), 1);
        assert_eq!(decoded.classes[0].name.as_deref(), Some("MyClass"));
        assert_eq!(decoded.classes[0].methods.len(), 1);
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let module = Module::new("test".to_string());
        let mut bytes = module.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(Module::decode(&bytes), Err(ModuleError::ChecksumMismatch { .. })));
    }

    #[test]
    fn invalid_magic_is_rejected() {
        let mut bytes = vec![b'X', b'X', b'X', b'X'];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(Module::decode(&bytes), Err(ModuleError::InvalidMagic(_))));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&999u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(Module::decode(&bytes), Err(ModuleError::UnsupportedVersion(999))));
    }

    #[test]
    fn content_hash_is_deterministic() {
        let module = Module::new("test".to_string());
        assert_eq!(module.content_hash(), module.content_hash());
    }

    #[test]
    fn content_hash_differs_for_different_modules() {
        let a = Module::new("a".to_string());
        let b = Module::new("b".to_string());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn max_pause_statement_extra_data_length_reflects_pause_sites() {
        use crate::opcode::PauseKind;
        let mut block = ByteCodeBlock::new("gen".to_string(), 0);
        assert_eq!(block.max_pause_statement_extra_data_length(), 0);
        block.pause_sites.record(0, PauseKind::Await, 16);
        assert_eq!(block.max_pause_statement_extra_data_length(), 16);
    }

    #[test]
    fn unused_register_produces_no_register_sentinel() {
        assert_eq!(NO_REGISTER, crate::register::REGISTER_LIMIT);
    }
}
