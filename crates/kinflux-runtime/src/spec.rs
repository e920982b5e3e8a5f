//! Kernel interface description.
//!
//! The code generator fixes the kernel's argument list: chunk size first,
//! then one pointer per named array in generation order, then the shared
//! workspace scratch buffer when the kernel uses one. [`KernelSpec`] is the
//! runtime's record of that contract; it never changes after construction.

use kinflux_backends::ProgramSource;

use crate::layout::ELEM_SIZE;

/// Transfer direction of a named array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayDir {
    /// Host-to-device before each chunk (e.g. `phi`, `P_arr`).
    Input,
    /// Device-to-host after each chunk (e.g. `dphi`, `jac`).
    Output,
}

/// One named array in the kernel's argument list. All batch arrays are f64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDef {
    pub name: String,
    /// Elements per condition.
    pub per_item: usize,
    pub dir: ArrayDir,
}

impl ArrayDef {
    pub fn input(name: impl Into<String>, per_item: usize) -> Self {
        Self {
            name: name.into(),
            per_item,
            dir: ArrayDir::Input,
        }
    }

    pub fn output(name: impl Into<String>, per_item: usize) -> Self {
        Self {
            name: name.into(),
            per_item,
            dir: ArrayDir::Output,
        }
    }
}

/// One member of the packed workspace scratch buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDef {
    pub name: String,
    /// Elements per condition.
    pub per_item: usize,
}

impl WorkspaceDef {
    pub fn new(name: impl Into<String>, per_item: usize) -> Self {
        Self {
            name: name.into(),
            per_item,
        }
    }
}

/// Everything the runtime knows about the generated kernel.
#[derive(Debug, Clone)]
pub struct KernelSpec {
    pub name: String,
    pub source: ProgramSource,
    /// Named input/output arrays, in the generation-determined order.
    pub arrays: Vec<ArrayDef>,
    /// Workspace members packed into one scratch buffer (may be empty).
    pub workspace: Vec<WorkspaceDef>,
}

impl KernelSpec {
    pub fn new(name: impl Into<String>, source: ProgramSource) -> Self {
        Self {
            name: name.into(),
            source,
            arrays: Vec::new(),
            workspace: Vec::new(),
        }
    }

    pub fn with_array(mut self, array: ArrayDef) -> Self {
        self.arrays.push(array);
        self
    }

    pub fn with_workspace(mut self, member: WorkspaceDef) -> Self {
        self.workspace.push(member);
        self
    }

    /// Input arrays with their positions in the array table.
    pub fn inputs(&self) -> impl Iterator<Item = (usize, &ArrayDef)> {
        self.arrays
            .iter()
            .enumerate()
            .filter(|(_, a)| a.dir == ArrayDir::Input)
    }

    /// Output arrays with their positions in the array table.
    pub fn outputs(&self) -> impl Iterator<Item = (usize, &ArrayDef)> {
        self.arrays
            .iter()
            .enumerate()
            .filter(|(_, a)| a.dir == ArrayDir::Output)
    }

    pub fn input_count(&self) -> usize {
        self.inputs().count()
    }

    pub fn output_count(&self) -> usize {
        self.outputs().count()
    }

    /// Per-condition elements of every workspace member.
    pub fn workspace_per_item(&self) -> Vec<usize> {
        self.workspace.iter().map(|w| w.per_item).collect()
    }

    /// Fixed memory footprint of one condition across all arrays and
    /// workspace, in bytes. This is what bounds MaxPerRun.
    pub fn per_condition_bytes(&self) -> usize {
        let array_elems: usize = self.arrays.iter().map(|a| a.per_item).sum();
        let scratch_elems: usize = self.workspace.iter().map(|w| w.per_item).sum();
        (array_elems + scratch_elems) * ELEM_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KernelSpec {
        KernelSpec::new("sample", ProgramSource::Registered("sample".into()))
            .with_array(ArrayDef::input("phi", 5))
            .with_array(ArrayDef::input("P_arr", 1))
            .with_array(ArrayDef::output("dphi", 5))
            .with_workspace(WorkspaceDef::new("rop", 3))
    }

    #[test]
    fn inputs_and_outputs_keep_table_positions() {
        let spec = sample();
        let inputs: Vec<usize> = spec.inputs().map(|(i, _)| i).collect();
        let outputs: Vec<usize> = spec.outputs().map(|(i, _)| i).collect();
        assert_eq!(inputs, vec![0, 1]);
        assert_eq!(outputs, vec![2]);
        assert_eq!(spec.input_count(), 2);
        assert_eq!(spec.output_count(), 1);
    }

    #[test]
    fn per_condition_footprint_counts_everything() {
        // (5 + 1 + 5 + 3) f64 elements
        assert_eq!(sample().per_condition_bytes(), 14 * 8);
    }
}
