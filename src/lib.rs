pub mod densemap;
pub mod graph;
pub mod input_file;
pub mod logger;
pub mod manifest;
pub mod ordered_set;
pub mod process;
pub mod recompile;
mod run;
pub mod scanner;
pub mod session;
mod signal;
pub mod terminal;
pub mod tool;
pub mod trace;
pub mod work;

pub use run::run;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
