use crate::datatype::Datatype;

use super::error::RdmaResult;

/// Types that can be stored in a distributed matrix and moved by the one-sided primitive
pub trait Element:
    Copy + Default + PartialEq + std::fmt::Debug + std::ops::Add<Output = Self> + Send + Sync + 'static
{
}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(impl Element for $t {})*
    };
}

impl_element!(f32, f64, i32, i64, u32, u64, usize);

/// How an update combines with the data already in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    /// overwrite the destination (put)
    Replace,
    /// add to the destination (accumulate)
    Sum,
}

impl UpdateOp {
    #[inline(always)]
    pub(crate) fn apply<T: Element>(&self, dst: &mut [T], src: &[T]) {
        debug_assert_eq!(dst.len(), src.len());
        match self {
            UpdateOp::Replace => dst.copy_from_slice(src),
            UpdateOp::Sum => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = *d + *s;
                }
            }
        }
    }
}

pub(crate) trait CommRdma<T: Element> {
    /// combine the elements of `src` selected by `src_type` into the region of `pe`,
    /// starting at element `disp` and laid out according to `dst_type`
    fn accumulate(
        &self,
        op: UpdateOp,
        src: &[T],
        src_type: &Datatype,
        pe: usize,
        disp: usize,
        dst_type: &Datatype,
    ) -> RdmaResult;
    /// copy `dst.len()` elements of the region of `pe` starting at `disp`
    fn read(&self, pe: usize, disp: usize, dst: &mut [T]) -> RdmaResult;
    /// run `f` on the region owned by the calling pe
    fn with_local_region<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R;
}
