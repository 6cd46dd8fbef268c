//! Per-pass snapshot of which provider ids Machines own or are claiming.

use crds::Machine;
use std::collections::HashSet;

/// The parts of a Machine the garbage collector cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MachineRecord {
    pub name: String,
    /// `status.providerID`, absent while the launch is still resolving
    pub provider_id: Option<String>,
    /// Value of the linked annotation, set while claiming an existing instance
    pub linked: Option<String>,
}

impl From<&Machine> for MachineRecord {
    fn from(machine: &Machine) -> Self {
        Self {
            name: machine.metadata.name.clone().unwrap_or_default(),
            provider_id: machine.provider_id().map(str::to_string),
            linked: machine.linked_provider_id().map(str::to_string),
        }
    }
}

/// Lookup sets built once per pass from a single Machine listing
#[derive(Debug, Clone, Default)]
pub struct MachineIndex {
    owned: HashSet<String>,
    linked: HashSet<String>,
    machines: usize,
}

impl MachineIndex {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MachineRecord>,
    {
        let mut index = Self::default();
        for record in records {
            index.machines += 1;
            if let Some(pid) = record.provider_id {
                index.owned.insert(pid);
            }
            if let Some(pid) = record.linked {
                index.linked.insert(pid);
            }
        }
        index
    }

    /// A Machine's `status.providerID` equals `provider_id`
    pub fn is_owned(&self, provider_id: &str) -> bool {
        self.owned.contains(provider_id)
    }

    /// A Machine carries the linked annotation for `provider_id`
    pub fn is_linked(&self, provider_id: &str) -> bool {
        self.linked.contains(provider_id)
    }

    /// Number of Machines the index was built from
    pub fn len(&self) -> usize {
        self.machines
    }

    pub fn is_empty(&self) -> bool {
        self.machines == 0
    }
}
