//! Record types and byte codec for the INFO / IDX / DAT extended-data files.
//!
//! Nothing here touches the filesystem; see `extstore-io` for readers and
//! writers built on [`FixedRecord`].

pub mod codec;
pub mod field;
pub mod layout;
pub mod offsets;
pub mod record;
pub mod text;

pub use codec::FixedRecord;
pub use field::{FieldLayout, FieldValue, ScalarKind};
pub use layout::{
    DAT_RECORD_SIZE, IDX_RECORD_SIZE, INFO_GENERATION_DATE_OFFSET, INFO_PERIOD_START_OFFSET,
    INFO_RECORD_SIZE, RecordLayout, check_layouts,
};
pub use offsets::{OffsetEntry, OffsetIndex, build_offsets};
pub use record::{
    DatRecord, IdxRecord, InfoRecord, decode_dat, decode_idx, decode_info, encode_dat,
    encode_idx, encode_info, latest_generation_date, market_name,
};
