//! Resource-accounting granularity and the two orthogonal properties that
//! follow from it: the bit domain of a resmap, and whether a CPU-count
//! vector accompanies it.

use std::fmt;

/// The unit at which resources are accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Granularity {
    Node,
    Socket,
    Core,
    Cpu,
}

impl Granularity {
    /// Node/CPU granularities use one bit per node; Socket/Core use one bit
    /// per socket across all nodes.
    pub fn bit_domain_is_per_node(self) -> bool {
        matches!(self, Granularity::Node | Granularity::Cpu)
    }

    /// Core/CPU granularities carry a per-bit CPU-count vector; Node/Socket
    /// do not.
    pub fn carries_cpu_vector(self) -> bool {
        matches!(self, Granularity::Core | Granularity::Cpu)
    }

    /// Parses a configuration value, accepting the "memory-paired" spellings
    /// (`CoreMemory`, `SocketMemory`, `CpuMemory`) as aliases of their plain
    /// counterparts, matching how the collaborator's node-selection plugin
    /// maps `CR_CORE_MEMORY` etc. to the same granularity as `CR_CORE`.
    pub fn from_config_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        match normalized.as_str() {
            "node" | "nodememory" => Some(Granularity::Node),
            "socket" | "socketmemory" => Some(Granularity::Socket),
            "core" | "corememory" => Some(Granularity::Core),
            "cpu" | "cpumemory" => Some(Granularity::Cpu),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Node => "node",
            Granularity::Socket => "socket",
            Granularity::Core => "core",
            Granularity::Cpu => "cpu",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_paired_forms_select_same_granularity() {
        assert_eq!(Granularity::from_config_str("Core_Memory"), Some(Granularity::Core));
        assert_eq!(Granularity::from_config_str("CPU_Memory"), Some(Granularity::Cpu));
        assert_eq!(Granularity::from_config_str("socket-memory"), Some(Granularity::Socket));
        assert_eq!(Granularity::from_config_str("bogus"), None);
    }

    #[test]
    fn bit_domain_and_cpu_vector_properties() {
        assert!(Granularity::Node.bit_domain_is_per_node());
        assert!(Granularity::Cpu.bit_domain_is_per_node());
        assert!(!Granularity::Socket.bit_domain_is_per_node());
        assert!(!Granularity::Core.bit_domain_is_per_node());

        assert!(Granularity::Core.carries_cpu_vector());
        assert!(Granularity::Cpu.carries_cpu_vector());
        assert!(!Granularity::Node.carries_cpu_vector());
        assert!(!Granularity::Socket.carries_cpu_vector());
    }
}
