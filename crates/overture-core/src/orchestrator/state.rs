use overture_types::ServiceDescriptor;

use crate::process_manager::ProcId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Ready,
    Failed,
    Terminated,
}

/// A launched service, tracked until the run ends.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    pub descriptor: ServiceDescriptor,
    pub id: ProcId,
    pub pid: Option<u32>,
    pub state: ProcessState,
}

/// Launched processes in launch order, keyed by service name.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<ManagedProcess>,
}

impl Registry {
    /// Adds a freshly launched process.
    ///
    /// Returns `false` if the service was already launched in this run.
    pub fn insert(&mut self, process: ManagedProcess) -> bool {
        if self.get(&process.descriptor.name).is_some() {
            return false;
        }
        self.entries.push(process);
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ManagedProcess> {
        self.entries.iter().find(|p| p.descriptor.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedProcess> {
        self.entries.iter_mut().find(|p| p.descriptor.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ManagedProcess> {
        self.entries.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(name: &str, id: u64) -> ManagedProcess {
        ManagedProcess {
            descriptor: ServiceDescriptor::new(name, vec!["serve".to_owned()], 5000),
            id: ProcId(id),
            pid: None,
            state: ProcessState::Starting,
        }
    }

    #[test]
    fn test_registry_keeps_launch_order_and_unique_names() {
        let mut registry = Registry::default();
        assert!(registry.insert(process("b", 0)));
        assert!(registry.insert(process("a", 1)));
        assert!(!registry.insert(process("b", 2)));

        let names: Vec<_> = registry.iter().map(|p| p.descriptor.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.get("b").unwrap().id, ProcId(0));
        assert_eq!(registry.len(), 2);
    }
}
