// Licensed under the Apache-2.0 license

pub mod flash_partition;
pub mod hil;
pub mod stream;

pub use flash_partition::FlashPartition;
pub use hil::{FlashDrvError, FlashOp, FlashStorage};
pub use stream::FlashStreamWriter;
