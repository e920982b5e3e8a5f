//! Buffer layout arithmetic.
//!
//! Pure computation shared by the orchestrator and the transfer path: how
//! large a device buffer must be for a batch of conditions, how workspace
//! members pack into one scratch buffer, and the rectangle geometry that
//! moves a sub-range of conditions between a host array and a device buffer.
//!
//! Two physical orders exist for a multi-field batch array:
//!
//! ```text
//! RowMajor    ("C"):  [condition][field]   - a condition's fields are adjacent
//! ColumnMajor ("F"):  [field][condition]   - a field's conditions are adjacent
//! ```
//!
//! Device buffers hold only the active chunk, packed tight with the chunk
//! size as leading dimension; the kernel receives the chunk size and indexes
//! with it, so no extra stride argument crosses the ABI.

use std::fmt;
use std::str::FromStr;

use kinflux_backends::{CopyRegion, RectOrigin, RectPitch};
use serde::{Deserialize, Serialize};

/// Bytes per array element; batch arrays in this system are all f64.
pub const ELEM_SIZE: usize = std::mem::size_of::<f64>();

/// Workspace members are aligned to this within the shared scratch buffer.
const SCRATCH_ALIGN: usize = 8;

/// Storage order of a multi-field, multi-condition array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataOrder {
    /// Condition-major (`[condition][field]`), the generator's "C" order.
    #[serde(rename = "C")]
    RowMajor,
    /// Field-major (`[field][condition]`), the generator's "F" order.
    #[serde(rename = "F")]
    ColumnMajor,
}

impl fmt::Display for DataOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrder::RowMajor => write!(f, "C"),
            DataOrder::ColumnMajor => write!(f, "F"),
        }
    }
}

impl FromStr for DataOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(DataOrder::RowMajor),
            "F" | "f" => Ok(DataOrder::ColumnMajor),
            other => Err(format!("unknown data order '{other}' (expected C or F)")),
        }
    }
}

/// Transfer geometry for one array and one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferGeometry {
    pub host_origin: RectOrigin,
    pub host_pitch: RectPitch,
    pub device_pitch: RectPitch,
    pub region: CopyRegion,
}

/// Layout calculator for a configured order and vector width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    order: DataOrder,
    vec_width: usize,
}

impl BufferLayout {
    /// A `vec_width` of 0 or 1 means the backend does not vectorize.
    pub fn new(order: DataOrder, vec_width: usize) -> Self {
        Self {
            order,
            vec_width: vec_width.max(1),
        }
    }

    pub fn order(&self) -> DataOrder {
        self.order
    }

    pub fn vec_width(&self) -> usize {
        self.vec_width
    }

    /// Condition count rounded up to a vector-width multiple. Used for
    /// buffer sizing only; transfers always move the logical count.
    pub fn padded(&self, conditions: usize) -> usize {
        conditions.div_ceil(self.vec_width) * self.vec_width
    }

    /// Condition count rounded down to a vector-width multiple.
    pub fn floor_to_width(&self, conditions: usize) -> usize {
        conditions / self.vec_width * self.vec_width
    }

    /// Bytes one device buffer needs to hold `conditions` conditions of an
    /// array with `per_item` elements per condition.
    pub fn array_bytes(&self, per_item: usize, conditions: usize) -> usize {
        self.padded(conditions) * per_item * ELEM_SIZE
    }

    /// Byte offsets of workspace members packed contiguously into one shared
    /// scratch buffer, plus the total size. Members are given as
    /// elements-per-condition; each starts aligned to [`SCRATCH_ALIGN`].
    pub fn pack_offsets(&self, members_per_item: &[usize], conditions: usize) -> (Vec<usize>, usize) {
        let padded = self.padded(conditions);
        let mut offsets = Vec::with_capacity(members_per_item.len());
        let mut cursor = 0usize;
        for per_item in members_per_item {
            cursor = cursor.div_ceil(SCRATCH_ALIGN) * SCRATCH_ALIGN;
            offsets.push(cursor);
            cursor += padded * per_item * ELEM_SIZE;
        }
        (offsets, cursor)
    }

    /// Rectangle moving conditions `[offset, offset + this_run)` of a host
    /// array (sized for `host_conditions` conditions) to or from a device
    /// buffer holding exactly the chunk.
    pub fn transfer_geometry(
        &self,
        per_item: usize,
        host_conditions: usize,
        offset: usize,
        this_run: usize,
    ) -> TransferGeometry {
        match self.order {
            // a condition's fields are adjacent: the sub-range is contiguous
            DataOrder::RowMajor => {
                let region = CopyRegion::contiguous(this_run * per_item * ELEM_SIZE);
                TransferGeometry {
                    host_origin: RectOrigin::at_byte(offset * per_item * ELEM_SIZE),
                    host_pitch: RectPitch::packed(&region),
                    device_pitch: RectPitch::packed(&region),
                    region,
                }
            }
            // one row per field, strided by the respective leading dimension
            DataOrder::ColumnMajor => {
                let region = CopyRegion {
                    bytes_per_row: this_run * ELEM_SIZE,
                    rows: per_item,
                    slices: 1,
                };
                TransferGeometry {
                    host_origin: RectOrigin::at_byte(offset * ELEM_SIZE),
                    host_pitch: RectPitch {
                        row: host_conditions * ELEM_SIZE,
                        slice: host_conditions * per_item * ELEM_SIZE,
                    },
                    device_pitch: RectPitch {
                        row: this_run * ELEM_SIZE,
                        slice: this_run * per_item * ELEM_SIZE,
                    },
                    region,
                }
            }
        }
    }
}

/// Element index of `(condition, field)` in a device buffer whose leading
/// dimension is `this_run`. Kernels use the same arithmetic.
pub fn device_index(order: DataOrder, this_run: usize, per_item: usize, cond: usize, field: usize) -> usize {
    match order {
        DataOrder::RowMajor => cond * per_item + field,
        DataOrder::ColumnMajor => field * this_run + cond,
    }
}
