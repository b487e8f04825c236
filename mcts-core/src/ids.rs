/// Index into the node arena.
pub type NodeIndex = u32;

pub const ROOT: NodeIndex = 0;

/// Which of at most two concurrent descent streams a reservation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorId(usize);

impl SelectorId {
    pub const A: SelectorId = SelectorId(0);
    pub const B: SelectorId = SelectorId(1);

    pub fn new(id: usize) -> Self {
        assert!(id < 2, "only two concurrent selector ids are supported, got {id}");
        SelectorId(id)
    }

    pub fn index(self) -> usize {
        self.0
    }
}
