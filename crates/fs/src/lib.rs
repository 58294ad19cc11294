//! Classifies source files, discovers tables under a data directory, and
//! turns each table into a stream of descriptor-tagged chunks ready to
//! hand to a transport.

mod file_class;
mod reader;
mod sender;
mod table;
mod walk;

pub use file_class::FileClass;
pub use reader::{BlockAddressedReader, FileReader, SequentialReader, DEFAULT_BLOCK_SIZE};
pub use sender::{send_file, ChunkSink};
pub use table::{Partition, Table};
pub use walk::{discover_tables, split_wire_name};
