// For now it's easiest to just export absolutely everything to downstream passes and back-ends, we
// can refine the public API when it's closer to finished.

pub mod block;
pub use block::*;
pub mod cfg;
pub use cfg::*;
pub mod context;
pub use context::*;
pub mod error;
pub use error::*;
pub mod expression;
pub use expression::*;
pub mod flag_analysis;
pub use flag_analysis::*;
pub mod instruction;
pub use instruction::*;
pub mod printer;
pub use printer::*;
pub mod symbol_table;
pub use symbol_table::*;
pub mod verify;
pub use verify::*;

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FxIndexSet<K> = indexmap::IndexSet<K, BuildHasherDefault<FxHasher>>;
