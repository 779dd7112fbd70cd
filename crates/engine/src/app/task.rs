/// Identifier handed out by a host when it schedules a callback (a frame
/// request or a repeating timer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Slot holding at most one outstanding host callback. Whoever owns the slot
/// must hand the taken id back to the host for cancellation on teardown.
#[derive(Debug, Default)]
pub struct PendingTask {
    id: Option<TaskId>,
}

impl PendingTask {
    pub fn arm(&mut self, id: TaskId) -> Option<TaskId> {
        self.id.replace(id)
    }

    pub fn take(&mut self) -> Option<TaskId> {
        self.id.take()
    }

    pub fn is_armed(&self) -> bool {
        self.id.is_some()
    }

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }
}
