//! Wire vocabulary shared by both sides of a storage clone: the fixed-width
//! [`Locator`] handle, the per-chunk [`Descriptor`] header, and the ordered
//! [`Stage`] progression a clone moves through.

mod descriptor;
mod locator;
mod stage;

pub use descriptor::{
    Descriptor, DescriptorError, HeaderKind, Offset, FLAG_REDO_LOG, MAX_DESCRIPTOR_LEN, MAX_PATH,
    META_COMMON, META_TRANSACTIONAL,
};
pub use locator::{Locator, CURRENT_VERSION, LOCATOR_LEN};
pub use stage::{Stage, ALL_STAGES, STAGE_COUNT};
