//! Type universe and kind classification.
//!
//! This crate owns the first half of the resolution pipeline:
//! - `descriptor` - the immutable `TypeDescriptor` universe and its builder
//! - `kind` - the `KindFlags` bit-set
//! - `suppression` - the Definer/SuperDefiner materialization levels
//! - `classifier` - ancestry-ordered flag propagation
//! - `validator` - whole-universe combination validation

pub mod classifier;
pub mod descriptor;
pub mod kind;
pub mod suppression;
pub mod validator;

pub use classifier::{Classification, classify};
pub use descriptor::{
    Constructor, Param, Registration, TypeDef, TypeDescriptor, TypeForm, TypeUniverse,
    UniverseBuilder, UniverseError,
};
pub use kind::{KindFlags, role_flags};
pub use suppression::{SuppressionLevel, SuppressionMap};
pub use validator::validate_combinations;
