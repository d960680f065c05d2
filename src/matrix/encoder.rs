use std::sync::Arc;

use super::geometry::Block;
use crate::datatype::{CommittedType, Datatype, DatatypeCache, TypeRegistry, VectorType};

/// Element offset of `sub` inside the region of the pe owning `tile`.
/// `sub` must lie within `tile`.
pub(crate) fn target_disp(tile: &Block, sub: &Block, ld: usize) -> usize {
    debug_assert!(tile.contains(sub));
    (sub.row_start - tile.row_start) * ld + (sub.col_start - tile.col_start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodingKind {
    NoStride,
    SharedStride,
    SourceVector,
    Vector,
}

/// The source and destination datatypes chosen for one transfer
#[derive(Debug)]
pub(crate) enum Encoding<'a> {
    /// dense source, cached destination type
    NoStride { src: &'a Datatype, dst: &'a Datatype },
    /// source and destination share the cached strided type
    SharedStride(&'a Datatype),
    /// one-off source type, cached destination type
    SourceVector { src: CommittedType, dst: &'a Datatype },
    /// one-off source and destination types
    Vector { src: CommittedType, dst: CommittedType },
}

impl Encoding<'_> {
    pub(crate) fn kind(&self) -> EncodingKind {
        match self {
            Encoding::NoStride { .. } => EncodingKind::NoStride,
            Encoding::SharedStride(_) => EncodingKind::SharedStride,
            Encoding::SourceVector { .. } => EncodingKind::SourceVector,
            Encoding::Vector { .. } => EncodingKind::Vector,
        }
    }

    pub(crate) fn src_type(&self) -> &Datatype {
        match self {
            Encoding::NoStride { src, .. } => *src,
            Encoding::SharedStride(dt) => *dt,
            Encoding::SourceVector { src, .. } => &**src,
            Encoding::Vector { src, .. } => &**src,
        }
    }

    pub(crate) fn dst_type(&self) -> &Datatype {
        match self {
            Encoding::NoStride { dst, .. } => *dst,
            Encoding::SharedStride(dt) => *dt,
            Encoding::SourceVector { dst, .. } => *dst,
            Encoding::Vector { dst, .. } => &**dst,
        }
    }
}

/// Picks the cheapest datatypes describing a rows x cols block for a transfer
/// from a source with row stride `src_ld` into a region with row stride `ld`.
#[derive(Debug)]
pub(crate) struct TransferEncoder {
    cache: Arc<DatatypeCache>,
    registry: Arc<TypeRegistry>,
    ld: usize,
}

impl TransferEncoder {
    pub(crate) fn new(cache: Arc<DatatypeCache>, ld: usize) -> TransferEncoder {
        TransferEncoder {
            cache,
            registry: TypeRegistry::new(),
            ld,
        }
    }

    pub(crate) fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn encode(&self, rows: usize, cols: usize, src_ld: usize) -> Encoding<'_> {
        if self.cache.covers(rows, cols) {
            let dst = self.cache.stride(rows, cols);
            if cols == src_ld {
                Encoding::NoStride {
                    src: self.cache.nostride(rows, cols),
                    dst,
                }
            } else if src_ld == self.ld {
                Encoding::SharedStride(dst)
            } else {
                Encoding::SourceVector {
                    src: CommittedType::commit(VectorType::new(rows, cols, src_ld), &self.registry),
                    dst,
                }
            }
        } else {
            Encoding::Vector {
                src: CommittedType::commit(VectorType::new(rows, cols, src_ld), &self.registry),
                dst: CommittedType::commit(VectorType::new(rows, cols, self.ld), &self.registry),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{ContiguousType, DatatypeOps};

    fn encoder(dim_max: usize, ld: usize) -> TransferEncoder {
        TransferEncoder::new(Arc::new(DatatypeCache::new(dim_max, ld)), ld)
    }

    #[test]
    fn disp_within_tile() {
        let tile = Block::new(4, 3, 10, 5);
        let ld = 6;
        assert_eq!(target_disp(&tile, &tile, ld), 0);
        assert_eq!(target_disp(&tile, &Block::new(5, 2, 12, 3), ld), 8);
        let last = Block::new(6, 1, 14, 1);
        let disp = target_disp(&tile, &last, ld);
        assert_eq!(disp, 2 * 6 + 4);
        assert!(disp < ld * tile.row_num);
    }

    #[test]
    fn small_dense_source_uses_nostride() {
        let enc = encoder(4, 8);
        let e = enc.encode(2, 3, 3);
        assert_eq!(e.kind(), EncodingKind::NoStride);
        assert_eq!(*e.src_type(), Datatype::from(ContiguousType::new(6)));
        assert_eq!(*e.dst_type(), Datatype::from(VectorType::new(2, 3, 8)));
        assert_eq!(enc.registry().committed(), 0);
    }

    #[test]
    fn small_matching_stride_shares_type() {
        let enc = encoder(4, 8);
        let e = enc.encode(4, 2, 8);
        assert_eq!(e.kind(), EncodingKind::SharedStride);
        assert_eq!(e.src_type(), e.dst_type());
        assert_eq!(enc.registry().committed(), 0);
    }

    #[test]
    fn small_other_stride_commits_source() {
        let enc = encoder(4, 8);
        {
            let e = enc.encode(3, 3, 5);
            assert_eq!(e.kind(), EncodingKind::SourceVector);
            assert_eq!(e.src_type().extent(), 13);
            assert_eq!(enc.registry().live(), 1);
        }
        assert_eq!(enc.registry().live(), 0);
        assert_eq!(enc.registry().committed(), 1);
    }

    #[test]
    fn large_block_commits_both() {
        let enc = encoder(4, 8);
        {
            let e = enc.encode(5, 2, 2);
            assert_eq!(e.kind(), EncodingKind::Vector);
            assert_eq!(*e.dst_type(), Datatype::from(VectorType::new(5, 2, 8)));
            assert_eq!(enc.registry().live(), 2);
        }
        assert_eq!(enc.registry().live(), 0);
        assert_eq!(enc.registry().committed(), 2);
    }

    #[test]
    fn zero_dim_cache_always_commits() {
        let enc = encoder(0, 3);
        assert_eq!(enc.encode(1, 1, 1).kind(), EncodingKind::Vector);
    }
}
