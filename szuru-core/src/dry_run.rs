/// Run-scoped dry-run gate.
///
/// Side-effecting operations take this by value and short-circuit to a
/// representative success result when it is active. It is a plain value
/// rather than process state so concurrent or repeated runs in one process
/// (including tests) cannot observe each other's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DryRun(bool);

impl DryRun {
    pub const ACTIVE: DryRun = DryRun(true);
    pub const INACTIVE: DryRun = DryRun(false);

    pub fn new(active: bool) -> Self {
        Self(active)
    }

    pub fn is_active(self) -> bool {
        self.0
    }
}
