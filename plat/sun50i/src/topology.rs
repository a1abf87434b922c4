// =============================================================================
// APRK SFW - Core Topology
// =============================================================================
// MPIDR decomposition for the sun50i core/cluster layout.
// =============================================================================

use crate::config;

/// Affinity level of an individual core.
pub const AFFLVL_CORE: u32 = 0;

/// Affinity level of a cluster of cores.
pub const AFFLVL_CLUSTER: u32 = 1;

const MPIDR_AFF0_SHIFT: u64 = 0;
const MPIDR_AFF1_SHIFT: u64 = 8;
const MPIDR_AFF_MASK: u64 = 0xff;

/// Split a core identifier into (cluster index, core index).
///
/// Masking only. Indices beyond the real topology are a caller contract
/// violation; they are caught upstream, not here.
pub fn split(mpidr: u64) -> (u32, u32) {
    let cluster = ((mpidr >> MPIDR_AFF1_SHIFT) & MPIDR_AFF_MASK) as u32;
    let core = ((mpidr >> MPIDR_AFF0_SHIFT) & MPIDR_AFF_MASK) as u32;
    (cluster, core)
}

/// Flat core index, used to pick per-core lock slots.
pub fn linear_index(mpidr: u64) -> usize {
    let (cluster, core) = split(mpidr);
    cluster as usize * config::PLATFORM_MAX_CPUS_PER_CLUSTER + core as usize
}

/// Whether this is the primary core, the one that restores shared
/// peripherals after a system-wide suspend.
pub fn is_primary(mpidr: u64) -> bool {
    split(mpidr) == (0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_extracts_cluster_and_core() {
        assert_eq!(split(0x0), (0, 0));
        assert_eq!(split(0x3), (0, 3));
        assert_eq!(split(0x101), (1, 1));
    }

    #[test]
    fn split_ignores_higher_affinity_fields() {
        assert_eq!(split(0x0001_0102), (1, 2));
    }

    #[test]
    fn linear_index_walks_clusters_then_cores() {
        assert_eq!(linear_index(0x0), 0);
        assert_eq!(linear_index(0x3), 3);
        assert_eq!(linear_index(0x101), 5);
    }

    #[test]
    fn only_cluster_zero_core_zero_is_primary() {
        assert!(is_primary(0x0));
        assert!(!is_primary(0x1));
        assert!(!is_primary(0x100));
    }
}
