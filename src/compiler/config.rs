use std::io::Read;

use serde::{Deserialize, Serialize};

/// Settings which control a compilation. Every field has a default, so a
/// configuration file only needs to list the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub limits: TableLimits,

    /// When set, the code generator writes `#` comment lines tracing the
    /// prologue, every quad, and the epilogue of each callable.
    pub assembler_trace: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            limits: TableLimits::default(),
            assembler_trace: false,
        }
    }
}

impl CompilerConfig {
    /// Read a configuration from a YAML document.
    pub fn read<R: Read>(src: R) -> Result<CompilerConfig, serde_yaml::Error> {
        serde_yaml::from_reader(src)
    }

    /// Write this configuration as a YAML document.
    pub fn write<W: std::io::Write>(&self, dst: W) -> Result<(), serde_yaml::Error> {
        serde_yaml::to_writer(dst, self)
    }
}

/// Capacities of the symbol table and its string pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLimits {
    /// Deepest nesting of procedures and functions.
    pub max_block: usize,

    /// Number of buckets in the identifier hash table.
    pub max_hash: usize,

    /// Initial capacity, in bytes, of the string pool.
    pub base_pool_size: usize,

    /// The string pool doubles when full, but never past this many bytes.
    pub max_pool_size: usize,

    pub max_symbols: usize,
    pub max_temp_vars: usize,
}

impl Default for TableLimits {
    fn default() -> Self {
        TableLimits {
            max_block: 8,
            max_hash: 512,
            base_pool_size: 1024,
            max_pool_size: 1 << 20,
            max_symbols: 1024,
            max_temp_vars: 999_999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let text = "
assembler_trace: true
limits:
  max_symbols: 4096
";
        let config = CompilerConfig::read(text.as_bytes()).unwrap();
        assert!(config.assembler_trace);
        assert_eq!(config.limits.max_symbols, 4096);
        assert_eq!(config.limits.max_hash, 512);
        assert_eq!(config.limits.max_block, 8);
    }

    #[test]
    fn test_write_then_read() {
        let mut config = CompilerConfig::default();
        config.limits.max_block = 3;

        let mut buf = vec![];
        config.write(&mut buf).unwrap();
        let read = CompilerConfig::read(buf.as_slice()).unwrap();
        assert_eq!(read, config);
    }
}
