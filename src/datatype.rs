//! Descriptors for the (possibly strided) element layouts moved by the one-sided primitive.
//!
//! A [Datatype] describes which elements of a buffer take part in a transfer, measured in
//! elements from the start of the buffer. Two shapes exist: a dense run ([ContiguousType])
//! and `count` runs of `blocklen` elements placed `stride` elements apart ([VectorType]),
//! which is exactly what a row major 2-D sub-block of a wider buffer looks like.
//!
//! Building a datatype is cheap here, but registering it with the transport is not, so
//! the matrix keeps a [DatatypeCache] of every small block shape and only registers
//! one-off [CommittedType]s for shapes outside of it.
use enum_dispatch::enum_dispatch;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[enum_dispatch]
pub(crate) trait DatatypeOps {
    /// number of elements moved
    fn size(&self) -> usize;
    /// distance in elements from the first to one past the last element touched
    fn extent(&self) -> usize;
    fn num_runs(&self) -> usize;
    /// (offset, len) of the i-th dense run
    fn run(&self, i: usize) -> (usize, usize);
}

#[enum_dispatch(DatatypeOps)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Datatype {
    Contiguous(ContiguousType),
    Vector(VectorType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContiguousType {
    len: usize,
}

impl ContiguousType {
    pub(crate) fn new(len: usize) -> ContiguousType {
        ContiguousType { len }
    }
}

impl DatatypeOps for ContiguousType {
    fn size(&self) -> usize {
        self.len
    }
    fn extent(&self) -> usize {
        self.len
    }
    fn num_runs(&self) -> usize {
        if self.len > 0 {
            1
        } else {
            0
        }
    }
    fn run(&self, i: usize) -> (usize, usize) {
        debug_assert_eq!(i, 0);
        (0, self.len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VectorType {
    count: usize,
    blocklen: usize,
    stride: usize,
}

impl VectorType {
    pub(crate) fn new(count: usize, blocklen: usize, stride: usize) -> VectorType {
        VectorType {
            count,
            blocklen,
            stride,
        }
    }
}

impl DatatypeOps for VectorType {
    fn size(&self) -> usize {
        self.count * self.blocklen
    }
    fn extent(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            (self.count - 1) * self.stride + self.blocklen
        }
    }
    fn num_runs(&self) -> usize {
        if self.blocklen > 0 {
            self.count
        } else {
            0
        }
    }
    fn run(&self, i: usize) -> (usize, usize) {
        debug_assert!(i < self.count);
        (i * self.stride, self.blocklen)
    }
}

impl Datatype {
    pub(crate) fn runs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_runs()).map(move |i| self.run(i))
    }
}

/// Tracks datatypes registered with the transport outside of the small block cache
#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    live: AtomicUsize,
    committed: AtomicUsize,
}

impl TypeRegistry {
    pub(crate) fn new() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::default())
    }
    /// datatypes currently registered
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
    /// datatypes registered since creation
    pub(crate) fn committed(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }
}

/// A one-off datatype, registered on construction and released when dropped
#[derive(Debug)]
pub(crate) struct CommittedType {
    datatype: Datatype,
    registry: Arc<TypeRegistry>,
}

impl CommittedType {
    pub(crate) fn commit(datatype: impl Into<Datatype>, registry: &Arc<TypeRegistry>) -> Self {
        registry.live.fetch_add(1, Ordering::SeqCst);
        registry.committed.fetch_add(1, Ordering::SeqCst);
        CommittedType {
            datatype: datatype.into(),
            registry: registry.clone(),
        }
    }
}

impl std::ops::Deref for CommittedType {
    type Target = Datatype;
    fn deref(&self) -> &Self::Target {
        &self.datatype
    }
}

impl Drop for CommittedType {
    fn drop(&mut self) {
        self.registry.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Precomputed datatypes for every block shape up to `dim_max` x `dim_max`,
/// indexed by `(rows - 1, cols - 1)`. Built once when the matrix is created.
#[derive(Debug)]
pub(crate) struct DatatypeCache {
    dim_max: usize,
    stride: Vec<Datatype>,
    nostride: Vec<Datatype>,
}

impl DatatypeCache {
    /// `ld` is the row stride of the destination regions
    pub(crate) fn new(dim_max: usize, ld: usize) -> DatatypeCache {
        let mut stride = Vec::with_capacity(dim_max * dim_max);
        let mut nostride = Vec::with_capacity(dim_max * dim_max);
        for rows in 1..=dim_max {
            for cols in 1..=dim_max {
                stride.push(VectorType::new(rows, cols, ld).into());
                nostride.push(ContiguousType::new(rows * cols).into());
            }
        }
        DatatypeCache {
            dim_max,
            stride,
            nostride,
        }
    }

    pub(crate) fn dim_max(&self) -> usize {
        self.dim_max
    }

    pub(crate) fn covers(&self, rows: usize, cols: usize) -> bool {
        rows > 0 && cols > 0 && rows <= self.dim_max && cols <= self.dim_max
    }

    fn index(&self, rows: usize, cols: usize) -> usize {
        debug_assert!(self.covers(rows, cols));
        (rows - 1) * self.dim_max + (cols - 1)
    }

    /// the destination shaped (strided) datatype for a rows x cols block
    pub(crate) fn stride(&self, rows: usize, cols: usize) -> &Datatype {
        &self.stride[self.index(rows, cols)]
    }

    /// the datatype for a rows x cols block stored densely
    pub(crate) fn nostride(&self, rows: usize, cols: usize) -> &Datatype {
        &self.nostride[self.index(rows, cols)]
    }
}
