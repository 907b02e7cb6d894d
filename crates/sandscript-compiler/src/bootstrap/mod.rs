//! Dynamic-dispatch bootstrap.
//!
//! Every operation whose receiver is statically `def` is emitted as a call
//! through one static entry point on the script class. The argument list is a
//! fixed ABI shared by compiled scripts and the runtime dispatcher:
//!
//! | # | name            | meaning                                         |
//! |---|-----------------|-------------------------------------------------|
//! | 0 | `catalog`       | the catalog handle (`$DEFINITION`)              |
//! | 1 | `symbols`       | the per-script symbol table (`$FUNCTIONS`)      |
//! | 2 | `lookup`        | caller lookup context (the script class name)   |
//! | 3 | `name`          | method name or synthetic operator name          |
//! | 4 | `initial_depth` | guard depth already consumed at this site       |
//! | 5 | `flavor`        | [`DispatchFlavor`] tag                          |
//! | 6 | `args`          | runtime arguments, receiver first               |
//!
//! Arguments 2 to 5 are constant per call site and fixed when the site is
//! linked; 0, 1 and 6 are supplied per invocation. Changing this list requires
//! bumping [`BOOTSTRAP_ABI_VERSION`] on both sides.

mod cache;
mod site;

pub use cache::InlineCache;
pub use site::{CallSite, Operation, Target};

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const BOOTSTRAP_ABI_VERSION: u32 = 1;

/// Name of the static bootstrap entry point injected into every script class.
pub const BOOTSTRAP_METHOD: &str = "$bootstrapDef";

/// Parameter names of the bootstrap entry point, in ABI order.
pub const BOOTSTRAP_PARAMETERS: [&str; 7] = [
    "catalog",
    "symbols",
    "lookup",
    "name",
    "initial_depth",
    "flavor",
    "args",
];

/// What a dynamic call site does. Encoded as a `u8` in the bootstrap ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DispatchFlavor {
    /// `receiver.name(args...)`
    MethodCall = 0,
    /// `receiver.name`, through a getter or a field
    Load = 1,
    /// `receiver.name = value`, through a setter or a field
    Store = 2,
    /// `receiver[index]`
    IndexLoad = 3,
    /// `receiver[index] = value`
    IndexStore = 4,
    /// `for (x : receiver)`
    Iterate = 5,
    UnaryOperator = 6,
    BinaryOperator = 7,
    ShiftOperator = 8,
    Compare = 9,
}

impl DispatchFlavor {
    /// Whether the operation is resolved against the receiver's members.
    pub fn is_member(self) -> bool {
        !matches!(
            self,
            DispatchFlavor::UnaryOperator
                | DispatchFlavor::BinaryOperator
                | DispatchFlavor::ShiftOperator
                | DispatchFlavor::Compare
        )
    }
}
