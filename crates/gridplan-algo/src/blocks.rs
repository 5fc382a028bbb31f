//! Named column blocks
//!
//! Decision vectors are partitioned into named blocks (`line`, `flow_pos`,
//! ...). The layout is computed once by the formulation that owns the columns
//! and travels with the model and with the dual bundle, so the relaxation
//! builder addresses columns by block name and offset instead of recomputing
//! offsets on its own.

use crate::error::{PlanError, PlanResult};

/// A contiguous range of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub offset: usize,
    pub len: usize,
}

impl Block {
    /// Column index of element `i` of the block
    #[inline]
    pub fn at(&self, i: usize) -> usize {
        debug_assert!(i < self.len, "index {i} outside block {}", self.name);
        self.offset + i
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn contains(&self, column: usize) -> bool {
        self.range().contains(&column)
    }
}

/// Ordered registry of blocks; block `k + 1` starts where block `k` ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLayout {
    blocks: Vec<Block>,
}

impl BlockLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block of `len` columns and return it
    pub fn push(&mut self, name: impl Into<String>, len: usize) -> Block {
        let block = Block {
            name: name.into(),
            offset: self.total(),
            len,
        };
        self.blocks.push(block.clone());
        block
    }

    /// Total number of columns covered
    pub fn total(&self) -> usize {
        self.blocks.last().map(|b| b.offset + b.len).unwrap_or(0)
    }

    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Look up a block or fail with a dimension error
    pub fn require(&self, name: &str) -> PlanResult<&Block> {
        self.get(name)
            .ok_or_else(|| PlanError::DimensionMismatch(format!("no block named '{name}'")))
    }

    /// Block owning a column, with the position inside the block
    pub fn locate(&self, column: usize) -> Option<(&Block, usize)> {
        self.blocks
            .iter()
            .find(|b| b.contains(column))
            .map(|b| (b, column - b.offset))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_contiguous() {
        let mut layout = BlockLayout::new();
        let line = layout.push("line", 4);
        let pos = layout.push("flow_pos", 4);
        let sub = layout.push("substation", 2);

        assert_eq!(line.range(), 0..4);
        assert_eq!(pos.at(1), 5);
        assert_eq!(sub.offset, 8);
        assert_eq!(layout.total(), 10);
        assert_eq!(layout.len(), 3);
    }

    #[test]
    fn test_lookup_and_locate() {
        let mut layout = BlockLayout::new();
        layout.push("line", 3);
        layout.push("generator", 2);

        assert_eq!(layout.require("generator").unwrap().offset, 3);
        assert!(layout.require("voltage").is_err());

        let (block, pos) = layout.locate(4).unwrap();
        assert_eq!(block.name, "generator");
        assert_eq!(pos, 1);
        assert!(layout.locate(5).is_none());
    }

    #[test]
    fn test_empty_blocks_take_no_columns() {
        let mut layout = BlockLayout::new();
        layout.push("substation", 0);
        let gen = layout.push("generator", 2);
        assert_eq!(gen.offset, 0);
        // Empty blocks never own a column
        assert_eq!(layout.locate(0).unwrap().0.name, "generator");
    }
}
