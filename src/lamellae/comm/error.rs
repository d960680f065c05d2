/// A failure reported by the one-sided transfer primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdmaError {
    /// the pe does not exist in the window
    InvalidPe(usize),
    /// an operation was issued to a pe without an open epoch
    NoEpoch(usize),
    /// an epoch on the pe is already held by this origin
    EpochHeld(usize),
    /// source and destination datatypes describe a different number of elements
    TypeMismatch { src: usize, dst: usize },
    /// the source datatype reaches past the end of the source buffer
    SourceOutOfRange { extent: usize, len: usize },
    /// the destination datatype reaches past the end of the destination region
    TargetOutOfRange {
        pe: usize,
        disp: usize,
        extent: usize,
        len: usize,
    },
}

impl std::fmt::Display for RdmaError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RdmaError::InvalidPe(pe) => {
                write!(f, "pe {} is not part of the window", pe)
            }
            RdmaError::NoEpoch(pe) => {
                write!(f, "no epoch is open on pe {}", pe)
            }
            RdmaError::EpochHeld(pe) => {
                write!(f, "an epoch is already open on pe {}", pe)
            }
            RdmaError::TypeMismatch { src, dst } => {
                write!(
                    f,
                    "source datatype moves {} elements but destination datatype moves {}",
                    src, dst
                )
            }
            RdmaError::SourceOutOfRange { extent, len } => {
                write!(
                    f,
                    "source datatype spans {} elements but the buffer holds {}",
                    extent, len
                )
            }
            RdmaError::TargetOutOfRange {
                pe,
                disp,
                extent,
                len,
            } => {
                write!(
                    f,
                    "target range {}..{} exceeds the {} element region of pe {}",
                    disp,
                    disp + extent,
                    len,
                    pe
                )
            }
        }
    }
}

impl std::error::Error for RdmaError {}

pub(crate) type RdmaResult = Result<(), RdmaError>;
