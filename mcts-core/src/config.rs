/// Transposition-sharing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranspositionMode {
    #[default]
    None,
    /// A lazily-materialized child borrows its transposition root's child
    /// descriptors on its second visit.
    SingleNodeDeferredCopy,
    /// Full cluster arbitration including master-swap.
    SharedSubtree,
}

/// Tunables for a [`crate::selector::ParallelLeafSelector`].
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    pub transposition_mode: TranspositionMode,

    pub select_parallel_enabled: bool,
    /// Minimum sub-target visit count that triggers dispatch to the worker pool.
    pub select_parallel_threshold: u32,

    /// Extra leaf-list capacity reserved up front when preloading is
    /// enabled (`root_preload_depth > 0`), capped at
    /// `max_preload_nodes_per_batch`. Neither field affects selection
    /// behavior; both are consumed only by `leaf_list_capacity`.
    pub root_preload_depth: u32,
    pub max_preload_nodes_per_batch: u32,

    pub padded_batch_sizing: bool,
    pub padded_extra_nodes_base: u32,
    pub padded_extra_nodes_multiplier: f32,

    /// Passed straight through to the PUCT scorer as its exploration-term
    /// multiplier.
    pub cpuct_multiplier: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            transposition_mode: TranspositionMode::None,
            select_parallel_enabled: false,
            select_parallel_threshold: 4,
            root_preload_depth: 0,
            max_preload_nodes_per_batch: 0,
            padded_batch_sizing: false,
            padded_extra_nodes_base: 0,
            padded_extra_nodes_multiplier: 1.0,
            cpuct_multiplier: 1.0,
        }
    }
}

impl SelectorConfig {
    /// Capacity to reserve for the output leaf list, driven by the
    /// `padded_batch_sizing`/`padded_extra_nodes_base`/`_multiplier` knobs
    /// and by preloading (`root_preload_depth`/`max_preload_nodes_per_batch`).
    pub fn leaf_list_capacity(&self, target_visits: u32) -> usize {
        let preload_extra = if self.root_preload_depth > 0 { self.max_preload_nodes_per_batch as usize } else { 0 };

        if !self.padded_batch_sizing {
            return target_visits as usize + preload_extra;
        }
        let extra = self.padded_extra_nodes_base as f32 + target_visits as f32 * self.padded_extra_nodes_multiplier;
        target_visits as usize + extra.max(0.0) as usize + preload_extra
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn preload_capacity_is_zero_unless_preload_depth_is_set() {
        let config = SelectorConfig { max_preload_nodes_per_batch: 64, ..SelectorConfig::default() };
        assert_eq!(config.leaf_list_capacity(10), 10);
    }

    #[test]
    fn preload_capacity_adds_the_per_batch_cap_once_depth_is_set() {
        let config =
            SelectorConfig { root_preload_depth: 2, max_preload_nodes_per_batch: 64, ..SelectorConfig::default() };
        assert_eq!(config.leaf_list_capacity(10), 74);
    }

    #[test]
    fn preload_and_padding_combine() {
        let config = SelectorConfig {
            root_preload_depth: 1,
            max_preload_nodes_per_batch: 8,
            padded_batch_sizing: true,
            padded_extra_nodes_base: 2,
            padded_extra_nodes_multiplier: 0.5,
            ..SelectorConfig::default()
        };
        // 10 + (2 + 10*0.5) + 8 == 10 + 7 + 8
        assert_eq!(config.leaf_list_capacity(10), 25);
    }
}
