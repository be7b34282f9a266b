/* 📖 # What does randio provide?

randio gives binary-format parsers one random-access interface over bytes
that may live in a file, in a slice of a file, in memory or behind a pool
slot:

- `handle`: the `IoHandle` operations and the `Handle` variants
- `pool`: `HandlePool`, which keeps many handles usable while only a bounded
  number hold open descriptors
- `path`: `PathResolver`, which makes raw paths absolute and canonical
- `config`: TOML settings for the pool limit and path style

None of these types lock internally. Callers sharing a pool or handle across
threads serialize access themselves, e.g. behind one mutex for the whole pool.
*/

pub mod config;
pub mod handle;
pub mod path;
pub mod pool;
mod pool_tests;

pub use config::{Config, load_config};
pub use handle::{
    Access, Backing, FileHandle, FileRangeHandle, Handle, HandleKind, HandleState, IoHandle,
    MemoryRangeHandle, OpenMode, PoolEntryHandle, SharedBuffer, SharedHandle, SharedPool,
    shared_buffer,
};
pub use path::{CanonicalPath, PathResolver, PathStyle};
pub use pool::HandlePool;
